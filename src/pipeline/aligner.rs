use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};

use crate::{domain::face::{FaceLandmarks, Point}, settings::Settings};

/// Eye geometry of the canonical frame, derived from the configured size
/// and ratios once per run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetGeometry {
    pub width: u32,
    pub height: u32,
    pub left_eye: Point,
    pub right_eye: Point,
}

impl TargetGeometry {
    pub fn from_settings(settings: &Settings) -> Self {
        let eye_y = settings.height as f32 * settings.eye_y_ratio;
        Self {
            width: settings.width,
            height: settings.height,
            left_eye: Point::new(settings.width as f32 * settings.eye_x_ratio_left, eye_y),
            right_eye: Point::new(settings.width as f32 * settings.eye_x_ratio_right, eye_y),
        }
    }
}

/// Eye lines closer than this are treated as degenerate.
const MIN_EYE_DISTANCE: f64 = 1e-3;

/// Rotation, uniform scale and translation as the 2x3 matrix
/// [[a, b, tx], [-b, a, ty]], kept in f64 so eye placement holds to well
/// under a thousandth of a pixel.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityTransform {
    a: f64,
    b: f64,
    tx: f64,
    ty: f64,
}

impl SimilarityTransform {
    /// Transform rotating the source eye line level, scaling the inter-eye
    /// distance to the target's, and translating the eye midpoint onto the
    /// target midpoint. Both eyes land exactly on their targets, whatever
    /// the tilt of the source eye line.
    pub fn between_eyes(landmarks: &FaceLandmarks, target: &TargetGeometry) -> Option<Self> {
        let dx = (landmarks.right_eye.x - landmarks.left_eye.x) as f64;
        let dy = (landmarks.right_eye.y - landmarks.left_eye.y) as f64;
        let source_distance = (dx * dx + dy * dy).sqrt();
        if source_distance < MIN_EYE_DISTANCE {
            return None;
        }
        let target_distance = (target.right_eye.x - target.left_eye.x) as f64;
        let scale = target_distance / source_distance;
        let a = scale * dx / source_distance;
        let b = scale * dy / source_distance;

        let source_mid = landmarks.eye_midpoint();
        let target_mid = target.left_eye.midpoint(&target.right_eye);
        let source_mid_x = source_mid.x as f64;
        let source_mid_y = source_mid.y as f64;
        let tx = target_mid.x as f64 - (a * source_mid_x + b * source_mid_y);
        let ty = target_mid.y as f64 - (-b * source_mid_x + a * source_mid_y);
        Some(Self { a, b, tx, ty })
    }

    pub fn apply(&self, point: &Point) -> (f64, f64) {
        let x = point.x as f64;
        let y = point.y as f64;
        (
            self.a * x + self.b * y + self.tx,
            -self.b * x + self.a * y + self.ty,
        )
    }

    pub fn scale(&self) -> f64 {
        (self.a * self.a + self.b * self.b).sqrt()
    }

    fn to_projection(&self) -> Option<Projection> {
        Projection::from_matrix([
            self.a as f32,
            self.b as f32,
            self.tx as f32,
            -self.b as f32,
            self.a as f32,
            self.ty as f32,
            0.0,
            0.0,
            1.0,
        ])
    }
}

/// Resamples the source into a canonical-size frame with the eyes on their
/// configured targets. Pixels with no source coverage stay black, the same
/// fill for every frame. `None` when the landmarks cannot support a
/// transform.
pub fn align_face(
    image: &RgbImage,
    landmarks: &FaceLandmarks,
    target: &TargetGeometry,
) -> Option<RgbImage> {
    let transform = SimilarityTransform::between_eyes(landmarks, target)?;
    let projection = transform.to_projection()?;
    let mut canonical = RgbImage::new(target.width, target.height);
    warp_into(
        image,
        &projection,
        Interpolation::Bilinear,
        Rgb([0, 0, 0]),
        &mut canonical,
    );
    Some(canonical)
}
