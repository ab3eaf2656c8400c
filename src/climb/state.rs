use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::AttemptOutcome;

/// What the latest frame says about the climber's start position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PositionCheck {
    Valid,
    Invalid,
    /// A required limb is not confidently observed; neither confirms nor cancels an attempt.
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ClimbState {
    Idle,
    #[serde(rename_all = "camelCase")]
    Begun { attempt_id: Uuid, start_time_ms: i64 },
    #[serde(rename_all = "camelCase")]
    InProgress { attempt_id: Uuid, start_time_ms: i64 },
    #[serde(rename_all = "camelCase")]
    Finished {
        attempt_id: Uuid,
        start_time_ms: i64,
        outcome: AttemptOutcome,
    },
}

/// Inputs that can move the lifecycle forward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Trigger {
    Frame {
        position: PositionCheck,
        reached_top: bool,
        now_ms: i64,
        /// Id the attempt takes if this frame starts one.
        candidate_id: Uuid,
    },
    DebounceElapsed {
        attempt_id: Uuid,
        latest: PositionCheck,
    },
    Timeout,
    Reset,
}

impl ClimbState {
    /// Pure transition function; returns `self` unchanged when the trigger does not apply.
    pub fn next(self, trigger: Trigger) -> ClimbState {
        match (self, trigger) {
            (_, Trigger::Reset) => ClimbState::Idle,

            (
                ClimbState::Idle,
                Trigger::Frame {
                    position: PositionCheck::Valid,
                    now_ms,
                    candidate_id,
                    ..
                },
            ) => ClimbState::Begun {
                attempt_id: candidate_id,
                start_time_ms: now_ms,
            },

            (
                ClimbState::Begun {
                    attempt_id,
                    start_time_ms,
                },
                Trigger::DebounceElapsed {
                    attempt_id: fired_for,
                    latest,
                },
            ) if attempt_id == fired_for => match latest {
                PositionCheck::Valid | PositionCheck::Unknown => ClimbState::InProgress {
                    attempt_id,
                    start_time_ms,
                },
                PositionCheck::Invalid => ClimbState::Idle,
            },

            (
                ClimbState::InProgress {
                    attempt_id,
                    start_time_ms,
                },
                Trigger::Frame {
                    position,
                    reached_top,
                    ..
                },
            ) => {
                if reached_top {
                    ClimbState::Finished {
                        attempt_id,
                        start_time_ms,
                        outcome: AttemptOutcome::Successful,
                    }
                } else if position == PositionCheck::Invalid {
                    ClimbState::Finished {
                        attempt_id,
                        start_time_ms,
                        outcome: AttemptOutcome::Unsuccessful,
                    }
                } else {
                    self
                }
            }

            (
                ClimbState::Begun {
                    attempt_id,
                    start_time_ms,
                }
                | ClimbState::InProgress {
                    attempt_id,
                    start_time_ms,
                },
                Trigger::Timeout,
            ) => ClimbState::Finished {
                attempt_id,
                start_time_ms,
                outcome: AttemptOutcome::Unsuccessful,
            },

            (state, _) => state,
        }
    }

    pub fn attempt_id(&self) -> Option<Uuid> {
        match self {
            ClimbState::Idle => None,
            ClimbState::Begun { attempt_id, .. }
            | ClimbState::InProgress { attempt_id, .. }
            | ClimbState::Finished { attempt_id, .. } => Some(*attempt_id),
        }
    }

    /// Start time of an attempt that is still recording frames.
    pub fn recording_since(&self) -> Option<i64> {
        match self {
            ClimbState::Begun { start_time_ms, .. } | ClimbState::InProgress { start_time_ms, .. } => {
                Some(*start_time_ms)
            }
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, ClimbState::Finished { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(position: PositionCheck, reached_top: bool) -> Trigger {
        Trigger::Frame {
            position,
            reached_top,
            now_ms: 500,
            candidate_id: Uuid::nil(),
        }
    }

    fn begun(id: Uuid) -> ClimbState {
        ClimbState::Begun {
            attempt_id: id,
            start_time_ms: 500,
        }
    }

    fn in_progress(id: Uuid) -> ClimbState {
        ClimbState::InProgress {
            attempt_id: id,
            start_time_ms: 500,
        }
    }

    #[test]
    fn idle_begins_only_on_valid_position() {
        assert_eq!(ClimbState::Idle.next(frame(PositionCheck::Invalid, false)), ClimbState::Idle);
        assert_eq!(ClimbState::Idle.next(frame(PositionCheck::Unknown, false)), ClimbState::Idle);
        assert_eq!(
            ClimbState::Idle.next(frame(PositionCheck::Valid, false)),
            begun(Uuid::nil())
        );
    }

    #[test]
    fn frames_do_not_move_a_begun_attempt() {
        let id = Uuid::new_v4();
        assert_eq!(begun(id).next(frame(PositionCheck::Invalid, true)), begun(id));
    }

    #[test]
    fn debounce_confirms_valid_or_unknown_position() {
        let id = Uuid::new_v4();
        for latest in [PositionCheck::Valid, PositionCheck::Unknown] {
            assert_eq!(
                begun(id).next(Trigger::DebounceElapsed {
                    attempt_id: id,
                    latest
                }),
                in_progress(id)
            );
        }
        assert_eq!(
            begun(id).next(Trigger::DebounceElapsed {
                attempt_id: id,
                latest: PositionCheck::Invalid
            }),
            ClimbState::Idle
        );
    }

    #[test]
    fn stale_debounce_is_ignored() {
        let id = Uuid::new_v4();
        let stale = Trigger::DebounceElapsed {
            attempt_id: Uuid::new_v4(),
            latest: PositionCheck::Valid,
        };
        assert_eq!(begun(id).next(stale), begun(id));
        assert_eq!(ClimbState::Idle.next(stale), ClimbState::Idle);
    }

    #[test]
    fn in_progress_finishes_on_top_or_leaving_the_wall() {
        let id = Uuid::new_v4();
        let success = in_progress(id).next(frame(PositionCheck::Valid, true));
        assert!(matches!(
            success,
            ClimbState::Finished {
                outcome: AttemptOutcome::Successful,
                ..
            }
        ));

        let fall = in_progress(id).next(frame(PositionCheck::Invalid, false));
        assert!(matches!(
            fall,
            ClimbState::Finished {
                outcome: AttemptOutcome::Unsuccessful,
                ..
            }
        ));

        assert_eq!(in_progress(id).next(frame(PositionCheck::Unknown, false)), in_progress(id));
    }

    #[test]
    fn timeout_finishes_live_attempts_only() {
        let id = Uuid::new_v4();
        assert!(begun(id).next(Trigger::Timeout).is_finished());
        assert!(in_progress(id).next(Trigger::Timeout).is_finished());
        assert_eq!(ClimbState::Idle.next(Trigger::Timeout), ClimbState::Idle);

        let finished = ClimbState::Finished {
            attempt_id: id,
            start_time_ms: 0,
            outcome: AttemptOutcome::Successful,
        };
        assert_eq!(finished.next(Trigger::Timeout), finished);
    }

    #[test]
    fn reset_always_returns_to_idle() {
        let id = Uuid::new_v4();
        assert_eq!(in_progress(id).next(Trigger::Reset), ClimbState::Idle);
    }
}
