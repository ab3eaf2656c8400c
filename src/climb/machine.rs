use std::sync::Arc;

use uuid::Uuid;

use crate::error::{ClimbError, ConfigurationError};
use crate::geometry::GeometryStore;
use crate::models::{AttemptOutcome, FrameLog, FrameObservation, KeypointId, LoggedFrame};

use super::config::DetectionConfig;
use super::events::ClimbEvent;
use super::state::{ClimbState, PositionCheck, Trigger};

// Set to true to trace every transition in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

const START_LIMBS: [KeypointId; 4] = [
    KeypointId::LeftWrist,
    KeypointId::RightWrist,
    KeypointId::LeftAnkle,
    KeypointId::RightAnkle,
];

/// Side effects requested by a transition; the caller executes them in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Emit(ClimbEvent),
    ScheduleDebounce { attempt_id: Uuid, delay_ms: u64 },
    CancelDebounce,
    ArmWatchdog { attempt_id: Uuid, timeout_ms: u64 },
    DisarmWatchdog,
    Flush(FinishedAttempt),
}

/// The frame log of an attempt that just ended, moved out of the machine.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedAttempt {
    pub attempt_id: Uuid,
    pub start_time_ms: i64,
    pub outcome: AttemptOutcome,
    pub frame_log: FrameLog,
}

/// Single-threaded climb lifecycle: feed it observations and timer firings one at a time.
pub struct ClimbStateMachine {
    state: ClimbState,
    geometry: Arc<GeometryStore>,
    config: DetectionConfig,
    frame_log: FrameLog,
    latest_position: PositionCheck,
}

impl ClimbStateMachine {
    pub fn new(geometry: Arc<GeometryStore>, config: DetectionConfig) -> Result<Self, ClimbError> {
        if geometry.is_empty() {
            return Err(ConfigurationError::MissingHoldGeometry.into());
        }

        Ok(Self {
            state: ClimbState::Idle,
            geometry,
            config,
            frame_log: FrameLog::new(),
            latest_position: PositionCheck::Unknown,
        })
    }

    pub fn state(&self) -> ClimbState {
        self.state
    }

    pub fn frame_log(&self) -> &FrameLog {
        &self.frame_log
    }

    pub fn geometry(&self) -> &GeometryStore {
        &self.geometry
    }

    pub fn on_observation(&mut self, observation: &FrameObservation) -> Vec<Effect> {
        if self.state.is_finished() {
            return Vec::new();
        }

        let position = self.check_position(observation);
        let reached_top = self.reached_top(observation);
        self.latest_position = position;

        if let Some(start_time_ms) = self.state.recording_since() {
            self.frame_log
                .push(LoggedFrame::from_observation(observation, start_time_ms));
        }

        let previous = self.state;
        let next = previous.next(Trigger::Frame {
            position,
            reached_top,
            now_ms: observation.timestamp_ms,
            candidate_id: Uuid::new_v4(),
        });

        if let (ClimbState::Idle, ClimbState::Begun { start_time_ms, .. }) = (previous, next) {
            self.frame_log.clear();
            self.frame_log
                .push(LoggedFrame::from_observation(observation, start_time_ms));
        }

        self.apply(previous, next)
    }

    /// Debounce firing for `attempt_id`; ignored unless that attempt is still `Begun`.
    pub fn on_debounce_elapsed(&mut self, attempt_id: Uuid) -> Vec<Effect> {
        let previous = self.state;
        let next = previous.next(Trigger::DebounceElapsed {
            attempt_id,
            latest: self.latest_position,
        });
        if previous == next {
            log_debug!("ignoring stale debounce for attempt {attempt_id}");
        }
        self.apply(previous, next)
    }

    /// Force an unsuccessful finish. Idempotent: a no-op when idle or already finished.
    pub fn complete_due_to_timeout(&mut self) -> Vec<Effect> {
        let previous = self.state;
        let next = previous.next(Trigger::Timeout);
        self.apply(previous, next)
    }

    /// Drop the current attempt, if any, and wait for a new start position.
    pub fn reset(&mut self) -> Vec<Effect> {
        let was_live = self.state.recording_since().is_some();
        self.state = self.state.next(Trigger::Reset);
        self.frame_log.clear();
        self.latest_position = PositionCheck::Unknown;

        if was_live {
            vec![Effect::CancelDebounce, Effect::DisarmWatchdog]
        } else {
            Vec::new()
        }
    }

    /// Start-position check: wrists and ankles confidently observed and above the lowest
    /// hold plus the buffer.
    pub fn check_position(&self, observation: &FrameObservation) -> PositionCheck {
        let Some(lowest) = self.geometry.lowest() else {
            return PositionCheck::Unknown;
        };
        let floor = lowest.row() + self.config.position_buffer;

        let limbs: Vec<_> = START_LIMBS
            .iter()
            .map(|id| observation.keypoint(*id))
            .collect();

        if limbs
            .iter()
            .any(|keypoint| !keypoint.is_confident(self.config.confidence_threshold))
        {
            return PositionCheck::Unknown;
        }

        if limbs.iter().all(|keypoint| keypoint.row < floor) {
            PositionCheck::Valid
        } else {
            PositionCheck::Invalid
        }
    }

    /// Both wrists confidently at or above the highest hold plus the buffer.
    pub fn reached_top(&self, observation: &FrameObservation) -> bool {
        let Some(highest) = self.geometry.highest() else {
            return false;
        };
        let ceiling = highest.row() + self.config.position_buffer;

        [KeypointId::LeftWrist, KeypointId::RightWrist]
            .iter()
            .map(|id| observation.keypoint(*id))
            .all(|keypoint| {
                keypoint.is_confident(self.config.confidence_threshold) && keypoint.row <= ceiling
            })
    }

    fn apply(&mut self, previous: ClimbState, next: ClimbState) -> Vec<Effect> {
        self.state = next;
        let mut effects = Vec::new();

        match (previous, next) {
            (
                ClimbState::Idle,
                ClimbState::Begun {
                    attempt_id,
                    start_time_ms,
                },
            ) => {
                log_info!("attempt {attempt_id} begun at {start_time_ms}ms");
                effects.push(Effect::Emit(ClimbEvent::ClimbBegun {
                    attempt_id,
                    begun: true,
                    start_time_ms,
                }));
                effects.push(Effect::ScheduleDebounce {
                    attempt_id,
                    delay_ms: self.config.debounce_ms,
                });
            }
            (ClimbState::Begun { attempt_id, .. }, ClimbState::InProgress { .. }) => {
                log_info!(
                    "attempt {attempt_id} confirmed after debounce ({} frames)",
                    self.frame_log.len()
                );
                effects.push(Effect::Emit(ClimbEvent::ClimbInProgress {
                    attempt_id,
                    in_progress: true,
                }));
                if let Some(timeout_ms) = self.config.attempt_timeout_ms {
                    effects.push(Effect::ArmWatchdog {
                        attempt_id,
                        timeout_ms,
                    });
                }
            }
            (
                ClimbState::Begun {
                    attempt_id,
                    start_time_ms,
                },
                ClimbState::Idle,
            ) => {
                log_info!(
                    "attempt {attempt_id} discarded: start position not held ({} frames dropped)",
                    self.frame_log.len()
                );
                self.frame_log.clear();
                effects.push(Effect::Emit(ClimbEvent::ClimbBegun {
                    attempt_id,
                    begun: false,
                    start_time_ms,
                }));
            }
            (
                ClimbState::Begun { .. } | ClimbState::InProgress { .. },
                ClimbState::Finished {
                    attempt_id,
                    start_time_ms,
                    outcome,
                },
            ) => {
                let frame_log = std::mem::take(&mut self.frame_log);
                log_info!(
                    "attempt {attempt_id} finished ({}) with {} frames",
                    outcome.as_str(),
                    frame_log.len()
                );
                effects.push(Effect::CancelDebounce);
                effects.push(Effect::DisarmWatchdog);
                effects.push(Effect::Flush(FinishedAttempt {
                    attempt_id,
                    start_time_ms,
                    outcome,
                    frame_log,
                }));
                effects.push(Effect::Emit(ClimbEvent::ClimbFinished {
                    attempt_id,
                    successful: outcome.is_successful(),
                }));
            }
            _ => {}
        }

        effects
    }
}
