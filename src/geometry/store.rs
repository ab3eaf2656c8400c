use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::models::{BoundingBox, Hold, HoldDetection};

/// Detections below this confidence are not treated as holds.
pub const DEFAULT_MIN_DETECTION_CONFIDENCE: f64 = 0.30;

/// Hold layout for the session, ordered top-to-bottom by bounding-box centre row.
///
/// Index 0 is the highest hold on the wall (the finish threshold) and the last index the
/// lowest one (the start threshold). Ties on the row are broken left-to-right.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeometryStore {
    holds: Vec<Hold>,
}

impl GeometryStore {
    /// Load from the collaborator's `(id, box)` list.
    pub fn from_boxes(
        boxes: impl IntoIterator<Item = (u32, BoundingBox)>,
    ) -> Result<Self, ConfigurationError> {
        let mut holds = Vec::new();
        for (id, bounding_box) in boxes {
            if let Some(reason) = bounding_box.defect() {
                return Err(ConfigurationError::MalformedHold { id, reason });
            }
            holds.push(Hold {
                id,
                index: 0,
                bounding_box,
            });
        }

        if holds.is_empty() {
            return Err(ConfigurationError::MissingHoldGeometry);
        }

        holds.sort_by(|a, b| {
            a.row()
                .partial_cmp(&b.row())
                .unwrap_or(Ordering::Equal)
                .then_with(|| {
                    a.center()
                        .x
                        .partial_cmp(&b.center().x)
                        .unwrap_or(Ordering::Equal)
                })
        });
        for (rank, hold) in holds.iter_mut().enumerate() {
            hold.index = rank as u32;
        }

        Ok(Self { holds })
    }

    /// Load from raw detector output, keeping detections at or above `min_confidence`.
    pub fn from_detections(
        detections: &[HoldDetection],
        min_confidence: f64,
    ) -> Result<Self, ConfigurationError> {
        let confident: Vec<(u32, BoundingBox)> = detections
            .iter()
            .filter(|detection| detection.confidence >= min_confidence)
            .map(|detection| (detection.id, detection.bounding_box))
            .collect();

        if confident.is_empty() {
            return Err(ConfigurationError::NoConfidentHolds(min_confidence));
        }

        Self::from_boxes(confident)
    }

    pub fn holds(&self) -> &[Hold] {
        &self.holds
    }

    pub fn len(&self) -> usize {
        self.holds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holds.is_empty()
    }

    pub fn highest(&self) -> Option<&Hold> {
        self.holds.first()
    }

    pub fn lowest(&self) -> Option<&Hold> {
        self.holds.last()
    }

    pub fn by_id(&self, id: u32) -> Option<&Hold> {
        self.holds.iter().find(|hold| hold.id == id)
    }
}
