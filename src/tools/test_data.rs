use std::{io::Cursor, path::Path};

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

/// Deterministic multi-tone raster, distinct per seed, for pipeline tests.
pub fn gradient_portrait(width: u32, height: u32, seed: u8) -> RgbImage {
    let mut image = RgbImage::new(width, height);
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let r = ((x * 255) / width.max(1)) as u8;
        let g = ((y * 255) / height.max(1)) as u8;
        *pixel = Rgb([r ^ seed, g, seed.wrapping_mul(31) ^ (x + y) as u8]);
    }
    image
}

pub fn write_png(path: &Path, width: u32, height: u32, seed: u8) {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(gradient_portrait(width, height, seed))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    std::fs::write(path, bytes).unwrap();
}

/// Single-color photo, for tests that follow one frame by its hue.
pub fn write_solid_png(path: &Path, width: u32, height: u32, color: Rgb<u8>) {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, color))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    std::fs::write(path, bytes).unwrap();
}

/// APP1 Exif segment (marker included) holding a single IFD0 DateTime
/// field, for splicing into JPEG streams. `datetime` uses the Exif form
/// `YYYY:MM:DD HH:MM:SS`.
pub fn exif_segment(datetime: &str) -> Vec<u8> {
    let ascii = format!("{}\0", datetime);
    let mut tiff: Vec<u8> = Vec::new();
    tiff.extend_from_slice(b"II");
    tiff.extend_from_slice(&42u16.to_le_bytes());
    tiff.extend_from_slice(&8u32.to_le_bytes());
    // IFD0: one entry, the 0x0132 DateTime tag, ASCII, value after the IFD.
    tiff.extend_from_slice(&1u16.to_le_bytes());
    tiff.extend_from_slice(&0x0132u16.to_le_bytes());
    tiff.extend_from_slice(&2u16.to_le_bytes());
    tiff.extend_from_slice(&(ascii.len() as u32).to_le_bytes());
    tiff.extend_from_slice(&26u32.to_le_bytes());
    tiff.extend_from_slice(&0u32.to_le_bytes());
    tiff.extend_from_slice(ascii.as_bytes());

    let mut payload: Vec<u8> = Vec::new();
    payload.extend_from_slice(b"Exif\0\0");
    payload.extend_from_slice(&tiff);

    let mut segment: Vec<u8> = vec![0xFF, 0xE1];
    segment.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    segment.extend_from_slice(&payload);
    segment
}

/// A decodable JPEG carrying the given capture datetime: the image is
/// encoded normally and the Exif segment spliced in right after SOI.
pub fn jpeg_with_datetime(image: &RgbImage, datetime: &str) -> Vec<u8> {
    let mut jpeg = Vec::new();
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
        .unwrap();
    let segment = exif_segment(datetime);
    let mut out = Vec::with_capacity(jpeg.len() + segment.len());
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&segment);
    out.extend_from_slice(&jpeg[2..]);
    out
}
