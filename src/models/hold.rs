use serde::{Deserialize, Serialize};

use super::keypoint::Point;

/// Hold bounding box, every edge normalized to [0, 1]; `top < bottom` since rows grow downward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl BoundingBox {
    pub fn new(left: f64, right: f64, top: f64, bottom: f64) -> Self {
        Self {
            left,
            right,
            top,
            bottom,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.left + self.right) / 2.0,
            (self.top + self.bottom) / 2.0,
        )
    }

    /// Vertical coordinate used for ordering and for the start/finish thresholds.
    pub fn center_row(&self) -> f64 {
        (self.top + self.bottom) / 2.0
    }

    /// Reason the box cannot be used, if any.
    pub fn defect(&self) -> Option<&'static str> {
        let edges = [self.left, self.right, self.top, self.bottom];
        if edges.iter().any(|edge| !edge.is_finite()) {
            return Some("non-finite edge");
        }
        if edges.iter().any(|edge| !(0.0..=1.0).contains(edge)) {
            return Some("edge outside [0, 1]");
        }
        if self.left >= self.right {
            return Some("left edge is not left of right edge");
        }
        if self.top >= self.bottom {
            return Some("top edge is not above bottom edge");
        }
        None
    }
}

/// A hold in the session geometry. `index` is its rank top-to-bottom, `id` is the
/// identifier supplied by the detection collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hold {
    pub id: u32,
    pub index: u32,
    pub bounding_box: BoundingBox,
}

impl Hold {
    pub fn center(&self) -> Point {
        self.bounding_box.center()
    }

    pub fn row(&self) -> f64 {
        self.bounding_box.center_row()
    }
}

/// Raw hold detector output before confidence filtering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoldDetection {
    pub id: u32,
    pub bounding_box: BoundingBox,
    pub confidence: f64,
    #[serde(default)]
    pub class: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_is_box_midpoint() {
        let bbox = BoundingBox::new(0.2, 0.4, 0.1, 0.3);
        let center = bbox.center();
        assert!((center.x - 0.3).abs() < 1e-12);
        assert!((center.y - 0.2).abs() < 1e-12);
    }

    #[test]
    fn detects_malformed_boxes() {
        assert_eq!(BoundingBox::new(0.1, 0.2, 0.1, 0.2).defect(), None);
        assert!(BoundingBox::new(0.3, 0.2, 0.1, 0.2).defect().is_some());
        assert!(BoundingBox::new(0.1, 0.2, 0.4, 0.2).defect().is_some());
        assert!(BoundingBox::new(-0.1, 0.2, 0.1, 0.2).defect().is_some());
        assert!(BoundingBox::new(0.1, f64::NAN, 0.1, 0.2).defect().is_some());
    }
}
