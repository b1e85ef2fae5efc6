use image::{Rgb, RgbImage};

/// Contrast-limited equalization parameters. The defaults match the usual
/// photographic settings: an 8x8 tile grid with a relative clip of 2.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClaheParams {
    pub clip_limit: f32,
    pub tile_grid: u32,
}

impl Default for ClaheParams {
    fn default() -> Self {
        Self { clip_limit: 2.0, tile_grid: 8 }
    }
}

/// Evens out exposure differences across frames: the luma plane of a
/// BT.601 YCbCr separation goes through tile-based contrast-limited
/// histogram equalization while both chroma planes pass through untouched,
/// so colors keep their hue. Pure: same frame in, same frame out, same
/// dimensions always.
pub fn normalize_frame(image: &RgbImage, params: &ClaheParams) -> RgbImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let pixel_count = (width * height) as usize;
    let mut luma = vec![0u8; pixel_count];
    let mut chroma_blue = vec![0f32; pixel_count];
    let mut chroma_red = vec![0f32; pixel_count];
    for (i, pixel) in image.pixels().enumerate() {
        let [r, g, b] = pixel.0;
        let (y, cb, cr) = rgb_to_ycbcr(r, g, b);
        luma[i] = y.round().clamp(0.0, 255.0) as u8;
        chroma_blue[i] = cb;
        chroma_red[i] = cr;
    }

    let equalized = equalize_plane(&luma, width as usize, height as usize, params);

    let mut out = RgbImage::new(width, height);
    for (i, pixel) in out.pixels_mut().enumerate() {
        *pixel = Rgb(ycbcr_to_rgb(equalized[i] as f32, chroma_blue[i], chroma_red[i]));
    }
    out
}

fn rgb_to_ycbcr(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let r = r as f32;
    let g = g as f32;
    let b = b as f32;
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let cb = 128.0 - 0.168736 * r - 0.331264 * g + 0.5 * b;
    let cr = 128.0 + 0.5 * r - 0.418688 * g - 0.081312 * b;
    (y, cb, cr)
}

fn ycbcr_to_rgb(y: f32, cb: f32, cr: f32) -> [u8; 3] {
    let r = y + 1.402 * (cr - 128.0);
    let g = y - 0.344136 * (cb - 128.0) - 0.714136 * (cr - 128.0);
    let b = y + 1.772 * (cb - 128.0);
    [clamp_u8(r), clamp_u8(g), clamp_u8(b)]
}

fn clamp_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Contrast-limited adaptive equalization of one 8-bit plane: per-tile
/// clipped histograms turned into lookup tables, blended bilinearly
/// between the four tiles around each pixel.
pub fn equalize_plane(plane: &[u8], width: usize, height: usize, params: &ClaheParams) -> Vec<u8> {
    let tiles_x = (params.tile_grid as usize).clamp(1, width.max(1));
    let tiles_y = (params.tile_grid as usize).clamp(1, height.max(1));

    // Integer tile bounds: near-equal sizes covering every pixel exactly.
    let bounds_x: Vec<(usize, usize)> = (0..tiles_x)
        .map(|t| (t * width / tiles_x, (t + 1) * width / tiles_x))
        .collect();
    let bounds_y: Vec<(usize, usize)> = (0..tiles_y)
        .map(|t| (t * height / tiles_y, (t + 1) * height / tiles_y))
        .collect();

    let mut luts: Vec<Vec<[u8; 256]>> = Vec::with_capacity(tiles_y);
    for &(y0, y1) in &bounds_y {
        let mut row = Vec::with_capacity(tiles_x);
        for &(x0, x1) in &bounds_x {
            row.push(tile_lut(plane, width, (x0, x1), (y0, y1), params.clip_limit));
        }
        luts.push(row);
    }

    let centers_x: Vec<f32> = bounds_x.iter().map(|&(a, b)| (a + b) as f32 / 2.0).collect();
    let centers_y: Vec<f32> = bounds_y.iter().map(|&(a, b)| (a + b) as f32 / 2.0).collect();
    let blend_x: Vec<(usize, usize, f32)> =
        (0..width).map(|x| surrounding(&centers_x, x as f32 + 0.5)).collect();
    let blend_y: Vec<(usize, usize, f32)> =
        (0..height).map(|y| surrounding(&centers_y, y as f32 + 0.5)).collect();

    let mut out = vec![0u8; plane.len()];
    for y in 0..height {
        let (ty0, ty1, wy) = blend_y[y];
        for x in 0..width {
            let (tx0, tx1, wx) = blend_x[x];
            let value = plane[y * width + x] as usize;
            let top = (1.0 - wx) * luts[ty0][tx0][value] as f32 + wx * luts[ty0][tx1][value] as f32;
            let bottom =
                (1.0 - wx) * luts[ty1][tx0][value] as f32 + wx * luts[ty1][tx1][value] as f32;
            out[y * width + x] = clamp_u8((1.0 - wy) * top + wy * bottom);
        }
    }
    out
}

/// Clipped cumulative histogram of one tile, scaled to 0..255. The clip is
/// relative to the tile area and the clipped excess is spread uniformly
/// over all bins, leftovers going to the lowest bins.
fn tile_lut(
    plane: &[u8],
    width: usize,
    (x0, x1): (usize, usize),
    (y0, y1): (usize, usize),
    clip_limit: f32,
) -> [u8; 256] {
    let area = ((x1 - x0) * (y1 - y0)) as u64;
    let mut lut = [0u8; 256];
    if area == 0 {
        for (value, entry) in lut.iter_mut().enumerate() {
            *entry = value as u8;
        }
        return lut;
    }

    let mut histogram = [0u64; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            histogram[plane[y * width + x] as usize] += 1;
        }
    }

    let clip = ((clip_limit as f64 * area as f64) / 256.0).max(1.0) as u64;
    let mut excess: u64 = 0;
    for count in histogram.iter_mut() {
        if *count > clip {
            excess += *count - clip;
            *count = clip;
        }
    }
    let bonus = excess / 256;
    let residual = (excess % 256) as usize;
    for (bin, count) in histogram.iter_mut().enumerate() {
        *count += bonus;
        if bin < residual {
            *count += 1;
        }
    }

    let scale = 255.0 / area as f64;
    let mut cumulative: u64 = 0;
    for (value, entry) in lut.iter_mut().enumerate() {
        cumulative += histogram[value];
        *entry = (cumulative as f64 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Bracketing tile indexes and the blend weight toward the second one.
/// Positions outside the first and last centers clamp to weight zero.
fn surrounding(centers: &[f32], position: f32) -> (usize, usize, f32) {
    let last = centers.len() - 1;
    if position <= centers[0] {
        return (0, 0, 0.0);
    }
    if position >= centers[last] {
        return (last, last, 0.0);
    }
    let mut index = 0;
    while index < last && centers[index + 1] < position {
        index += 1;
    }
    let span = centers[index + 1] - centers[index];
    let weight = if span > 0.0 { (position - centers[index]) / span } else { 0.0 };
    (index, index + 1, weight)
}
