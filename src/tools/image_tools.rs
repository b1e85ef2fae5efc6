use std::io::{BufRead, Cursor, Seek};

use chrono::NaiveDateTime;
use exif::{In, Tag};
use image::{DynamicImage, ImageDecoder, ImageReader, RgbImage};
use serde::Serialize;
use serde_with::{serde_as, DisplayFromStr};
use webp::WebPEncodingError;
use derive_more::From;

pub type ImageResult<T> = core::result::Result<T, ImageError>;

#[serde_as]
#[derive(Debug, Serialize, strum_macros::AsRefStr, From)]
pub enum ImageError {

    UnableToEncodeWebp(String),

	#[from]
	Io(#[serde_as(as = "DisplayFromStr")] std::io::Error),

	#[from]
	Decode(#[serde_as(as = "DisplayFromStr")] image::ImageError),

}

impl From<WebPEncodingError> for ImageError {
    fn from(error: WebPEncodingError) -> Self {
        ImageError::UnableToEncodeWebp(format!("{error:?}"))
    }
}

// region:    --- Error Boilerplate

impl core::fmt::Display for ImageError {
	fn fmt(
		&self,
		fmt: &mut core::fmt::Formatter,
	) -> core::result::Result<(), core::fmt::Error> {
		write!(fmt, "{self:?}")
	}
}

impl std::error::Error for ImageError {}

// endregion: --- Error Boilerplate

/// Decodes an image from raw bytes, applying the EXIF orientation so all
/// downstream coordinates are in display space.
pub fn decode_image(data: &[u8]) -> ImageResult<DynamicImage> {
    let mut decoder = ImageReader::new(Cursor::new(data)).with_guessed_format()?.into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut image = DynamicImage::from_decoder(decoder)?;
    image.apply_orientation(orientation);
    Ok(image)
}

/// Capture datetime from the EXIF container, in epoch milliseconds.
/// `DateTimeOriginal` wins over `DateTime`. Unreadable or absent metadata
/// is `None`, never an error.
pub fn capture_datetime_millis<R>(reader: &mut R) -> Option<i64>
where
    R: BufRead + Seek,
{
    let exifreader = exif::Reader::new();
    let exif = exifreader.read_from_container(reader).ok()?;
    for tag in [Tag::DateTimeOriginal, Tag::DateTime] {
        if let Some(field) = exif.get_field(tag, In::PRIMARY) {
            if let exif::Value::Ascii(_) = field.value {
                let string_value = format!("{}", field.value.display_as(field.tag));
                if let Ok(taken) = NaiveDateTime::parse_from_str(string_value.as_str(), "%F %T") {
                    return Some(taken.and_utc().timestamp_millis());
                }
            }
        }
    }
    None
}

/// Lossless WebP for the frame cache. Lossless so a cached frame decodes
/// back to the exact pixels that were computed, which keeps re-runs
/// byte-identical.
pub fn frame_to_webp(image: &RgbImage) -> ImageResult<Vec<u8>> {
    let encoder = webp::Encoder::from_rgb(image.as_raw(), image.width(), image.height());
    let webp_data = encoder.encode_simple(true, 100.0)?;
    Ok(webp_data.to_vec())
}

pub fn webp_to_frame(data: &[u8]) -> ImageResult<RgbImage> {
    Ok(decode_image(data)?.into_rgb8())
}

#[cfg(test)]
mod tests {
    use std::io::BufReader;

    use image::ImageFormat;

    use crate::tools::test_data;

    use super::*;

    #[test]
    fn test_capture_datetime() {
        // Metadata-only JPEG: SOI + Exif APP1 + EOI.
        let mut bytes: Vec<u8> = vec![0xFF, 0xD8];
        bytes.extend_from_slice(&test_data::exif_segment("2020:05:10 12:30:00"));
        bytes.extend_from_slice(&[0xFF, 0xD9]);
        let mut reader = BufReader::new(Cursor::new(bytes));
        assert_eq!(capture_datetime_millis(&mut reader), Some(1589113800000));
    }

    #[test]
    fn test_capture_datetime_from_encoded_jpeg() {
        let portrait = test_data::gradient_portrait(8, 8, 5);
        let bytes = test_data::jpeg_with_datetime(&portrait, "2020:05:10 12:30:00");
        let mut reader = BufReader::new(Cursor::new(bytes));
        assert_eq!(capture_datetime_millis(&mut reader), Some(1589113800000));
    }

    #[test]
    fn test_capture_datetime_missing() {
        let mut png = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(2, 2))
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        let mut reader = BufReader::new(Cursor::new(png));
        assert_eq!(capture_datetime_millis(&mut reader), None);
    }

    #[test]
    fn test_decode_roundtrip() {
        let mut image = RgbImage::new(3, 2);
        for (x, y, pixel) in image.enumerate_pixels_mut() {
            *pixel = image::Rgb([(x * 80) as u8, (y * 100) as u8, 7]);
        }
        let mut png = Vec::new();
        DynamicImage::ImageRgb8(image.clone())
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        let decoded = decode_image(&png).unwrap().into_rgb8();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_webp_cache_is_lossless() {
        let mut image = RgbImage::new(17, 11);
        for (x, y, pixel) in image.enumerate_pixels_mut() {
            *pixel = image::Rgb([(x * 13 + y) as u8, (y * 19) as u8, ((x + y) * 7) as u8]);
        }
        let bytes = frame_to_webp(&image).unwrap();
        let back = webp_to_frame(&bytes).unwrap();
        assert_eq!(back, image);
    }
}
