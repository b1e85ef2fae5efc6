use std::path::Path;

use ort::{inputs, GraphOptimizationLevel, Session, SessionOutputs, ValueType};
use ndarray::Array4;
use image::{imageops::{self, FilterType}, RgbImage};

use crate::{domain::face::{DetectedFace, FaceBox, FaceLandmarks, Point}, error::{Error, Result}};

/// Faces below this confidence are unusable for alignment.
pub const MIN_FACE_CONFIDENCE: f32 = 0.5;
/// Raw detections below this floor are discarded before suppression.
const RAW_SCORE_FLOOR: f32 = 0.1;
const NMS_IOU_THRESHOLD: f32 = 0.45;
/// x1, y1, x2, y2, score, then five landmark pairs.
const DETECTION_ROW_LEN: usize = 15;

/// Landmark oracle boundary. Implementations report every candidate face
/// with its confidence; callers decide which one (if any) to use.
pub trait FaceDetector: Send + Sync {
    fn detect_faces(&self, image: &RgbImage) -> Result<Vec<DetectedFace>>;
}

/// Largest bounding box wins; equal areas keep detector output order.
pub fn select_primary_face(faces: &[DetectedFace]) -> Option<&DetectedFace> {
    let mut best: Option<&DetectedFace> = None;
    for face in faces {
        match best {
            Some(current) if face.bbox.area() <= current.bbox.area() => {}
            _ => best = Some(face),
        }
    }
    best
}

/// Greedy suppression: keep by descending confidence, drop anything
/// overlapping a kept box beyond the threshold.
pub fn non_maximum_suppression(mut faces: Vec<DetectedFace>, iou_threshold: f32) -> Vec<DetectedFace> {
    faces.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut kept: Vec<DetectedFace> = Vec::new();
    for face in faces {
        if kept
            .iter()
            .all(|k| k.bbox.intersection_over_union(&face.bbox) <= iou_threshold)
        {
            kept.push(face);
        }
    }
    kept
}

/// Aspect-preserving resize onto the model canvas, padding right and bottom
/// with black. Detector coordinates divide by the returned scale to get
/// back to source space.
fn letterbox(image: &RgbImage, target_width: u32, target_height: u32) -> (RgbImage, f32) {
    let (width, height) = image.dimensions();
    let scale = (target_width as f32 / width as f32).min(target_height as f32 / height as f32);
    let scaled_width = ((width as f32 * scale).round() as u32).clamp(1, target_width);
    let scaled_height = ((height as f32 * scale).round() as u32).clamp(1, target_height);
    let resized = imageops::resize(image, scaled_width, scaled_height, FilterType::Triangle);
    let mut canvas = RgbImage::new(target_width, target_height);
    imageops::replace(&mut canvas, &resized, 0, 0);
    (canvas, scale)
}

/// One output row, in model-canvas pixels, mapped back to source space.
fn parse_detection_row(row: &[f32], scale: f32) -> DetectedFace {
    let point = |ix: usize| Point::new(row[ix] / scale, row[ix + 1] / scale);
    DetectedFace {
        bbox: FaceBox {
            x1: row[0] / scale,
            y1: row[1] / scale,
            x2: row[2] / scale,
            y2: row[3] / scale,
        },
        confidence: row[4],
        landmarks: FaceLandmarks {
            left_eye: point(5),
            right_eye: point(7),
            nose: Some(point(9)),
            mouth_left: Some(point(11)),
            mouth_right: Some(point(13)),
        },
    }
}

pub struct OnnxFaceDetector {
    session: Session,
    input_name: String,
    output_name: String,
    input_width: u32,
    input_height: u32,
}

impl OnnxFaceDetector {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ModelNotFound(path.to_string_lossy().to_string()));
        }
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(path)?;

        let input_info = session
            .inputs
            .first()
            .ok_or(Error::Error { message: "landmark model has no inputs".to_string() })?;
        let (input_name, input_height, input_width) = match &input_info.input_type {
            ValueType::Tensor { ty: _, dimensions } => {
                // NCHW; dynamic axes fall back to the common detector canvas.
                let height = dimensions.get(2).copied().filter(|d| *d > 0).unwrap_or(640) as u32;
                let width = dimensions.get(3).copied().filter(|d| *d > 0).unwrap_or(640) as u32;
                (input_info.name.clone(), height, width)
            }
            _ => {
                return Err(Error::Error { message: "landmark model input is not a tensor".to_string() })
            }
        };
        let output_name = session
            .outputs
            .first()
            .ok_or(Error::Error { message: "landmark model has no outputs".to_string() })?
            .name
            .clone();

        Ok(Self {
            session,
            input_name,
            output_name,
            input_width,
            input_height,
        })
    }
}

impl FaceDetector for OnnxFaceDetector {
    fn detect_faces(&self, image: &RgbImage) -> Result<Vec<DetectedFace>> {
        let (canvas, scale) = letterbox(image, self.input_width, self.input_height);

        let mut input =
            Array4::<f32>::zeros((1, 3, self.input_height as usize, self.input_width as usize));
        for (x, y, pixel) in canvas.enumerate_pixels() {
            let [r, g, b] = pixel.0;
            input[[0, 0, y as usize, x as usize]] = r as f32 / 255.0;
            input[[0, 1, y as usize, x as usize]] = g as f32 / 255.0;
            input[[0, 2, y as usize, x as usize]] = b as f32 / 255.0;
        }

        let outputs: SessionOutputs = self
            .session
            .run(inputs![self.input_name.clone() => input.view()]?)?;
        let binding = outputs[self.output_name.clone()].try_extract_tensor::<f32>()?;
        let output = binding.view();
        let raw = output
            .as_slice()
            .ok_or_else(|| Error::ModelUnexpectedOutputShape(format!("{:?}", output.shape())))?;
        if raw.len() % DETECTION_ROW_LEN != 0 {
            return Err(Error::ModelUnexpectedOutputShape(format!("{:?}", output.shape())));
        }

        let mut faces = Vec::new();
        for row in raw.chunks_exact(DETECTION_ROW_LEN) {
            if row[4] >= RAW_SCORE_FLOOR {
                faces.push(parse_detection_row(row, scale));
            }
        }
        Ok(non_maximum_suppression(faces, NMS_IOU_THRESHOLD))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> DetectedFace {
        DetectedFace {
            bbox: FaceBox { x1, y1, x2, y2 },
            confidence,
            landmarks: FaceLandmarks::from_eyes(Point::new(x1, y1), Point::new(x2, y1)),
        }
    }

    #[test]
    fn test_letterbox_wide_source() {
        let image = RgbImage::new(1000, 500);
        let (canvas, scale) = letterbox(&image, 640, 640);
        assert_eq!(canvas.dimensions(), (640, 640));
        assert!((scale - 0.64).abs() < 1e-6);
        // Padded area stays black.
        assert_eq!(canvas.get_pixel(0, 639).0, [0, 0, 0]);
    }

    #[test]
    fn test_parse_row_maps_back_to_source() {
        let row = [
            64.0, 32.0, 192.0, 160.0, 0.9, 96.0, 64.0, 160.0, 64.0, 128.0, 96.0, 104.0, 128.0,
            152.0, 128.0,
        ];
        let detected = parse_detection_row(&row, 0.5);
        assert_eq!(detected.bbox, FaceBox { x1: 128.0, y1: 64.0, x2: 384.0, y2: 320.0 });
        assert_eq!(detected.landmarks.left_eye, Point::new(192.0, 128.0));
        assert_eq!(detected.landmarks.right_eye, Point::new(320.0, 128.0));
        assert_eq!(detected.landmarks.nose, Some(Point::new(256.0, 192.0)));
        assert_eq!(detected.confidence, 0.9);
    }

    #[test]
    fn test_nms_drops_overlapping_lower_confidence() {
        let strong = face(0.0, 0.0, 100.0, 100.0, 0.95);
        let duplicate = face(5.0, 5.0, 105.0, 105.0, 0.80);
        let elsewhere = face(300.0, 300.0, 380.0, 380.0, 0.70);
        let kept = non_maximum_suppression(vec![duplicate, strong.clone(), elsewhere.clone()], 0.45);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0], strong);
        assert_eq!(kept[1], elsewhere);
    }

    #[test]
    fn test_primary_face_is_largest() {
        let small = face(0.0, 0.0, 50.0, 50.0, 0.99);
        let large = face(100.0, 100.0, 300.0, 300.0, 0.60);
        let faces = vec![small, large.clone()];
        assert_eq!(select_primary_face(&faces), Some(&large));
    }

    #[test]
    fn test_primary_face_tie_keeps_first() {
        let first = face(0.0, 0.0, 100.0, 100.0, 0.6);
        let second = face(200.0, 0.0, 300.0, 100.0, 0.9);
        let faces = vec![first.clone(), second];
        assert_eq!(select_primary_face(&faces), Some(&first));
        assert_eq!(select_primary_face(&[]), None);
    }
}
