use uuid::Uuid;

use crate::climb::ClimbEvent;
use crate::error::ClimbError;
use crate::models::{ForceLog, ForceSample, ForceTick};

// Force ticks arrive at sensor rate; keep this quiet unless debugging the link
const ENABLE_LOGS: bool = false;

use crate::{log_debug, log_info, log_warn};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Recording {
    attempt_id: Uuid,
    start_time_ms: i64,
}

/// Accumulates force samples for the live attempt, following the lifecycle events.
///
/// Recording starts on `ClimbBegun(true)` on the same clock origin as the frame log, is
/// thrown away on `ClimbBegun(false)` and stops on `ClimbFinished`. While the sensor link
/// is down ticks are dropped; the attempt itself carries on.
#[derive(Debug)]
pub struct ForceRecorder {
    log: ForceLog,
    recording: Option<Recording>,
    connected: bool,
}

impl ForceRecorder {
    pub fn new(hold_count: usize) -> Self {
        Self {
            log: ForceLog::new(hold_count),
            recording: None,
            connected: true,
        }
    }

    pub fn hold_count(&self) -> usize {
        self.log.hold_count()
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    pub fn log(&self) -> &ForceLog {
        &self.log
    }

    pub fn on_event(&mut self, event: &ClimbEvent) {
        match event {
            ClimbEvent::ClimbBegun {
                attempt_id,
                begun: true,
                start_time_ms,
            } => {
                self.log.clear();
                self.recording = Some(Recording {
                    attempt_id: *attempt_id,
                    start_time_ms: *start_time_ms,
                });
                log_debug!("force recording started for attempt {attempt_id}");
            }
            ClimbEvent::ClimbBegun { begun: false, .. } => {
                self.discard();
            }
            ClimbEvent::ClimbFinished { attempt_id, .. } => {
                if self.recording.take().is_some() {
                    log_debug!(
                        "force recording stopped for attempt {attempt_id} ({} samples)",
                        self.log.len()
                    );
                }
            }
            _ => {}
        }
    }

    /// Append a tick to the live attempt. Returns whether it was kept.
    pub fn record(&mut self, tick: &ForceTick) -> Result<bool, ClimbError> {
        if tick.readings.len() != self.log.hold_count() {
            return Err(ClimbError::MalformedForceTick {
                expected: self.log.hold_count(),
                actual: tick.readings.len(),
            });
        }

        let Some(recording) = self.recording else {
            return Ok(false);
        };

        if !self.connected {
            return Ok(false);
        }

        if tick.timestamp_ms < recording.start_time_ms {
            log_debug!(
                "dropping force tick at {}ms from before attempt {} began",
                tick.timestamp_ms,
                recording.attempt_id
            );
            return Ok(false);
        }

        self.log.push(ForceSample {
            timestamp_ms: tick.timestamp_ms - recording.start_time_ms,
            forces: tick.readings.clone(),
        });
        Ok(true)
    }

    /// Update the sensor link state; returns the event to publish when it changed.
    pub fn set_link(&mut self, connected: bool) -> Option<ClimbEvent> {
        if self.connected == connected {
            return None;
        }
        self.connected = connected;

        if connected {
            log_info!("force sensor link restored");
        } else if let Some(recording) = self.recording {
            log_warn!(
                "force sensor link lost during attempt {}; recording paused",
                recording.attempt_id
            );
        } else {
            log_warn!("force sensor link lost");
        }

        Some(ClimbEvent::ForceLinkChanged { connected })
    }

    /// Move the accumulated log out, leaving an empty one behind.
    pub fn take_log(&mut self) -> ForceLog {
        let hold_count = self.log.hold_count();
        std::mem::replace(&mut self.log, ForceLog::new(hold_count))
    }

    pub fn discard(&mut self) {
        self.recording = None;
        self.log.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(timestamp_ms: i64, readings: &[f64]) -> ForceTick {
        ForceTick {
            timestamp_ms,
            readings: readings.to_vec(),
        }
    }

    fn begun(attempt_id: Uuid, begun: bool, start_time_ms: i64) -> ClimbEvent {
        ClimbEvent::ClimbBegun {
            attempt_id,
            begun,
            start_time_ms,
        }
    }

    #[test]
    fn ignores_ticks_outside_an_attempt() {
        let mut recorder = ForceRecorder::new(2);
        assert_eq!(recorder.record(&tick(10, &[1.0, 2.0])), Ok(false));
        assert!(recorder.log().is_empty());
    }

    #[test]
    fn records_relative_to_attempt_start() {
        let attempt_id = Uuid::new_v4();
        let mut recorder = ForceRecorder::new(2);
        recorder.on_event(&begun(attempt_id, true, 5_000));

        assert_eq!(recorder.record(&tick(4_990, &[9.0, 9.0])), Ok(false));
        assert_eq!(recorder.record(&tick(5_000, &[1.0, 2.0])), Ok(true));
        assert_eq!(recorder.record(&tick(5_250, &[3.0, 4.0])), Ok(true));

        recorder.on_event(&ClimbEvent::ClimbFinished {
            attempt_id,
            successful: true,
        });
        assert!(!recorder.is_recording());
        assert_eq!(recorder.record(&tick(5_500, &[5.0, 6.0])), Ok(false));

        let log = recorder.take_log();
        let stamps: Vec<i64> = log.samples().iter().map(|s| s.timestamp_ms).collect();
        assert_eq!(stamps, vec![0, 250]);
        assert_eq!(log.channel(1), vec![2.0, 4.0]);
        assert!(recorder.log().is_empty());
        assert_eq!(recorder.hold_count(), 2);
    }

    #[test]
    fn discarded_start_clears_samples() {
        let attempt_id = Uuid::new_v4();
        let mut recorder = ForceRecorder::new(1);
        recorder.on_event(&begun(attempt_id, true, 0));
        recorder.record(&tick(100, &[1.0])).unwrap();

        recorder.on_event(&begun(attempt_id, false, 0));
        assert!(recorder.log().is_empty());
        assert!(!recorder.is_recording());
    }

    #[test]
    fn rejects_ticks_with_wrong_width() {
        let mut recorder = ForceRecorder::new(3);
        assert_eq!(
            recorder.record(&tick(0, &[1.0])),
            Err(ClimbError::MalformedForceTick {
                expected: 3,
                actual: 1
            })
        );
    }

    #[test]
    fn disconnect_pauses_and_resume_reattaches() {
        let attempt_id = Uuid::new_v4();
        let mut recorder = ForceRecorder::new(1);
        recorder.on_event(&begun(attempt_id, true, 0));
        recorder.record(&tick(100, &[1.0])).unwrap();

        assert_eq!(
            recorder.set_link(false),
            Some(ClimbEvent::ForceLinkChanged { connected: false })
        );
        assert_eq!(recorder.set_link(false), None);
        assert_eq!(recorder.record(&tick(200, &[2.0])), Ok(false));

        assert_eq!(
            recorder.set_link(true),
            Some(ClimbEvent::ForceLinkChanged { connected: true })
        );
        assert_eq!(recorder.record(&tick(300, &[3.0])), Ok(true));

        assert!(recorder.is_recording());
        assert_eq!(recorder.log().channel(0), vec![1.0, 3.0]);
    }
}
