use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    pub fn distance(&self, other: &Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FaceBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl FaceBox {
    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn intersection_over_union(&self, other: &FaceBox) -> f32 {
        let inter_x1 = self.x1.max(other.x1);
        let inter_y1 = self.y1.max(other.y1);
        let inter_x2 = self.x2.min(other.x2);
        let inter_y2 = self.y2.min(other.y2);
        let intersection = (inter_x2 - inter_x1).max(0.0) * (inter_y2 - inter_y1).max(0.0);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

/// Named landmarks in source raster coordinates. Both eye centers are
/// required for alignment; the remaining points are carried when the
/// detector provides them.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FaceLandmarks {
    pub left_eye: Point,
    pub right_eye: Point,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nose: Option<Point>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mouth_left: Option<Point>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mouth_right: Option<Point>,
}

impl FaceLandmarks {
    pub fn from_eyes(left_eye: Point, right_eye: Point) -> Self {
        Self {
            left_eye,
            right_eye,
            nose: None,
            mouth_left: None,
            mouth_right: None,
        }
    }

    pub fn eye_midpoint(&self) -> Point {
        self.left_eye.midpoint(&self.right_eye)
    }

    pub fn eye_distance(&self) -> f32 {
        self.left_eye.distance(&self.right_eye)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DetectedFace {
    pub bbox: FaceBox,
    pub confidence: f32,
    pub landmarks: FaceLandmarks,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_geometry() {
        let b = FaceBox { x1: 10.0, y1: 20.0, x2: 30.0, y2: 60.0 };
        assert_eq!(b.width(), 20.0);
        assert_eq!(b.height(), 40.0);
        assert_eq!(b.area(), 800.0);
    }

    #[test]
    fn test_iou_disjoint_and_identical() {
        let a = FaceBox { x1: 0.0, y1: 0.0, x2: 10.0, y2: 10.0 };
        let b = FaceBox { x1: 20.0, y1: 20.0, x2: 30.0, y2: 30.0 };
        assert_eq!(a.intersection_over_union(&b), 0.0);
        assert!((a.intersection_over_union(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_half_overlap() {
        let a = FaceBox { x1: 0.0, y1: 0.0, x2: 10.0, y2: 10.0 };
        let b = FaceBox { x1: 5.0, y1: 0.0, x2: 15.0, y2: 10.0 };
        // intersection 50, union 150
        assert!((a.intersection_over_union(&b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_eye_helpers() {
        let landmarks = FaceLandmarks::from_eyes(Point::new(10.0, 20.0), Point::new(30.0, 20.0));
        assert_eq!(landmarks.eye_midpoint(), Point::new(20.0, 20.0));
        assert_eq!(landmarks.eye_distance(), 20.0);
    }
}
