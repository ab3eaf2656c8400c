use serde::{Deserialize, Serialize};

/// One poll of the force collaborator on the session clock: a raw reading per hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForceTick {
    pub timestamp_ms: i64,
    pub readings: Vec<f64>,
}

/// A force row inside an attempt, timestamped relative to the attempt start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForceSample {
    pub timestamp_ms: i64,
    pub forces: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForceLog {
    hold_count: usize,
    samples: Vec<ForceSample>,
}

impl ForceLog {
    pub fn new(hold_count: usize) -> Self {
        Self {
            hold_count,
            samples: Vec::new(),
        }
    }

    pub fn from_samples(hold_count: usize, samples: Vec<ForceSample>) -> Self {
        Self {
            hold_count,
            samples,
        }
    }

    pub fn hold_count(&self) -> usize {
        self.hold_count
    }

    pub fn push(&mut self, sample: ForceSample) {
        self.samples.push(sample);
    }

    pub fn samples(&self) -> &[ForceSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// The force trace of one hold over time. Rows missing the column read as 0.
    pub fn channel(&self, hold: usize) -> Vec<f64> {
        self.samples
            .iter()
            .map(|sample| sample.forces.get(hold).copied().unwrap_or(0.0))
            .collect()
    }

    pub fn channels(&self) -> Vec<Vec<f64>> {
        (0..self.hold_count).map(|hold| self.channel(hold)).collect()
    }
}
