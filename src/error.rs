use serde::Serialize;
use derive_more::From;
use serde_with::{serde_as, DisplayFromStr};

pub type Result<T> = core::result::Result<T, Error>;

#[serde_as]
#[derive(Debug, Serialize, From, strum_macros::AsRefStr)]
#[serde(tag = "type", content = "data")]
pub enum Error {
	Error { message: String },

	// -- Settings errors.

	MalformatedSettingsFile,
	InvalidSettings(String),

	// -- Scan errors.

	UnableToAccessInputFolder(String),
	NoInputImages(String),

	// -- Model errors.

	ModelNotFound(String),
	ModelDownloadFailed(String),
	ModelUnexpectedOutputShape(String),

	// -- Assembly errors.

	EmptySequence,
	FrameSizeMismatch { index: usize, expected: (u32, u32), got: (u32, u32) },

	WorkerPanic(String),

	// -- Externals

	#[from]
	Io(#[serde_as(as = "DisplayFromStr")] std::io::Error),

	#[from]
	Serde(#[serde_as(as = "DisplayFromStr")] serde_json::Error),

	#[from]
	ORT(#[serde_as(as = "DisplayFromStr")] ort::Error),

	#[from]
	Image(#[serde_as(as = "DisplayFromStr")] image::ImageError),

	#[from]
	Exif(#[serde_as(as = "DisplayFromStr")] exif::Error),

	#[from]
	Shape(#[serde_as(as = "DisplayFromStr")] ndarray::ShapeError),

	#[from]
	Request(#[serde_as(as = "DisplayFromStr")] reqwest::Error),
}

// region:    --- Error Boilerplate
impl core::fmt::Display for Error {
	fn fmt(
		&self,
		fmt: &mut core::fmt::Formatter,
	) -> core::result::Result<(), core::fmt::Error> {
		write!(fmt, "{self:?}")
	}
}

impl std::error::Error for Error {}
// endregion: --- Error Boilerplate
