use std::{
    fs::{self, File},
    io::BufWriter,
    path::Path,
};

use image::{
    codecs::gif::{GifEncoder, Repeat},
    Delay, DynamicImage, Frame, RgbImage,
};

use crate::{
    error::{Error, Result},
    settings::Settings,
    tools::file_tools::temp_sibling,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssembleOptions {
    pub fps: u16,
    /// GIF repeat count, 0 meaning loop forever.
    pub loop_count: u16,
}

impl AssembleOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self { fps: settings.fps, loop_count: settings.loop_count }
    }
}

/// Encodes the ordered frames into an animated GIF at `output` and returns
/// its size in bytes. The sequence is validated up front and the encoder
/// writes into a temporary sibling that is renamed over the target, so a
/// failed run never leaves a partial file at the output path.
pub fn assemble_gif(frames: Vec<RgbImage>, options: &AssembleOptions, output: &Path) -> Result<u64> {
    let Some(first) = frames.first() else {
        return Err(Error::EmptySequence);
    };
    let expected = first.dimensions();
    for (index, frame) in frames.iter().enumerate() {
        if frame.dimensions() != expected {
            return Err(Error::FrameSizeMismatch { index, expected, got: frame.dimensions() });
        }
    }

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let temp_path = temp_sibling(output);
    if let Err(error) = write_gif(frames, options, &temp_path) {
        let _ = fs::remove_file(&temp_path);
        return Err(error);
    }
    let size = match fs::metadata(&temp_path) {
        Ok(metadata) => metadata.len(),
        Err(error) => {
            let _ = fs::remove_file(&temp_path);
            return Err(error.into());
        }
    };
    if let Err(error) = fs::rename(&temp_path, output) {
        let _ = fs::remove_file(&temp_path);
        return Err(error.into());
    }
    Ok(size)
}

fn write_gif(frames: Vec<RgbImage>, options: &AssembleOptions, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut encoder = GifEncoder::new_with_speed(BufWriter::new(file), 10);
    encoder.set_repeat(match options.loop_count {
        0 => Repeat::Infinite,
        count => Repeat::Finite(count),
    })?;
    let delay = Delay::from_numer_denom_ms(1000, options.fps as u32);
    for frame in frames {
        let buffer = DynamicImage::ImageRgb8(frame).into_rgba8();
        encoder.encode_frame(Frame::from_parts(buffer, 0, 0, delay))?;
    }
    Ok(())
}
