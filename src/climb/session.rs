use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use tokio::{
    sync::{broadcast, mpsc, Mutex},
    task::JoinHandle,
    time,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::analysis::{analyse_attempt, AnalysisConfig};
use crate::db::Database;
use crate::error::ClimbError;
use crate::force::ForceRecorder;
use crate::geometry::GeometryStore;
use crate::models::{AttemptRecord, ForceTick, FrameObservation};
use crate::settings::ClimbSettings;
use crate::tips::TipBook;

use super::config::DetectionConfig;
use super::events::ClimbEvent;
use super::machine::{ClimbStateMachine, Effect, FinishedAttempt};

// Frame-rate logging is at debug level only
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Everything that can move a session forward, in arrival order.
#[derive(Debug)]
enum SessionInput {
    Frame {
        timestamp_ms: i64,
        keypoints: Vec<[f64; 3]>,
    },
    Force(ForceTick),
    ForceLink(bool),
    DebounceElapsed(Uuid),
    WatchdogElapsed(Uuid),
    Timeout,
    Reset,
    SetClimber(Option<String>),
    Shutdown,
}

/// Owns the state machine and its timers; runs on a single task so inputs never interleave.
pub struct ClimbSession {
    machine: ClimbStateMachine,
    recorder: ForceRecorder,
    detection: DetectionConfig,
    analysis: AnalysisConfig,
    tips: TipBook,
    db: Option<Database>,
    events: broadcast::Sender<ClimbEvent>,
    inputs: mpsc::UnboundedSender<SessionInput>,
    debounce: Option<JoinHandle<()>>,
    watchdog: Option<JoinHandle<()>>,
    climber_name: Option<String>,
    attempt_started_at: Option<DateTime<Utc>>,
}

/// Cloneable front end to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    inputs: mpsc::UnboundedSender<SessionInput>,
    events: broadcast::Sender<ClimbEvent>,
    cancel_token: CancellationToken,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ClimbSession {
    /// Start a session over `geometry`. Fails before any frame is accepted when the
    /// geometry is empty.
    pub fn spawn(
        geometry: Arc<GeometryStore>,
        settings: &ClimbSettings,
        db: Option<Database>,
    ) -> Result<SessionHandle, ClimbError> {
        let (session, input_rx) = Self::build(geometry, settings, db)?;
        let inputs = session.inputs.clone();
        let events = session.events.clone();
        let cancel_token = CancellationToken::new();

        let hold_count = session.recorder.hold_count();
        let worker = tokio::spawn(session.run(input_rx, cancel_token.clone()));
        log_info!("climb session started with {hold_count} holds");

        Ok(SessionHandle {
            inputs,
            events,
            cancel_token,
            worker: Arc::new(Mutex::new(Some(worker))),
        })
    }

    fn build(
        geometry: Arc<GeometryStore>,
        settings: &ClimbSettings,
        db: Option<Database>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SessionInput>), ClimbError> {
        let hold_count = geometry.len();
        let machine = ClimbStateMachine::new(geometry, settings.detection.clone())?;

        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let session = ClimbSession {
            machine,
            recorder: ForceRecorder::new(hold_count),
            detection: settings.detection.clone(),
            analysis: settings.analysis.clone(),
            tips: settings.tip_book(),
            db,
            events: event_tx,
            inputs: input_tx,
            debounce: None,
            watchdog: None,
            climber_name: settings.climber_name.clone(),
            attempt_started_at: None,
        };
        Ok((session, input_rx))
    }

    async fn run(
        mut self,
        mut inputs: mpsc::UnboundedReceiver<SessionInput>,
        cancel_token: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    log_debug!("climb session cancelled");
                    break;
                }
                input = inputs.recv() => match input {
                    Some(SessionInput::Shutdown) | None => break,
                    Some(input) => self.handle(input).await,
                }
            }
        }

        self.cancel_debounce();
        self.disarm_watchdog();
        log_info!("climb session stopped");
    }

    async fn handle(&mut self, input: SessionInput) {
        match input {
            SessionInput::Frame {
                timestamp_ms,
                keypoints,
            } => {
                match FrameObservation::from_inference(
                    timestamp_ms,
                    &keypoints,
                    self.detection.confidence_threshold,
                ) {
                    Ok(observation) => {
                        let effects = self.machine.on_observation(&observation);
                        self.apply(effects).await;
                    }
                    Err(err) => log_warn!("dropping frame at {timestamp_ms}ms: {err}"),
                }
            }
            SessionInput::Force(tick) => {
                if let Err(err) = self.recorder.record(&tick) {
                    log_warn!("dropping force tick at {}ms: {err}", tick.timestamp_ms);
                }
            }
            SessionInput::ForceLink(connected) => {
                if let Some(event) = self.recorder.set_link(connected) {
                    self.publish(event);
                }
            }
            SessionInput::DebounceElapsed(attempt_id) => {
                // a stale firing must not forget the live attempt's timer
                if self.machine.state().attempt_id() == Some(attempt_id) {
                    self.debounce = None;
                }
                let effects = self.machine.on_debounce_elapsed(attempt_id);
                self.apply(effects).await;
            }
            SessionInput::WatchdogElapsed(attempt_id) => {
                if self.machine.state().attempt_id() == Some(attempt_id) {
                    log_warn!("attempt {attempt_id} timed out");
                    self.watchdog = None;
                    let effects = self.machine.complete_due_to_timeout();
                    self.apply(effects).await;
                }
            }
            SessionInput::Timeout => {
                let effects = self.machine.complete_due_to_timeout();
                self.apply(effects).await;
            }
            SessionInput::Reset => {
                let effects = self.machine.reset();
                self.recorder.discard();
                self.attempt_started_at = None;
                self.apply(effects).await;
            }
            SessionInput::SetClimber(name) => {
                self.climber_name = name;
            }
            SessionInput::Shutdown => {}
        }
    }

    async fn apply(&mut self, effects: Vec<Effect>) {
        let mut finished = None;

        for effect in effects {
            match effect {
                Effect::Emit(event) => self.publish(event),
                Effect::ScheduleDebounce {
                    attempt_id,
                    delay_ms,
                } => self.schedule_debounce(attempt_id, delay_ms),
                Effect::CancelDebounce => self.cancel_debounce(),
                Effect::ArmWatchdog {
                    attempt_id,
                    timeout_ms,
                } => self.arm_watchdog(attempt_id, timeout_ms),
                Effect::DisarmWatchdog => self.disarm_watchdog(),
                Effect::Flush(attempt) => finished = Some(attempt),
            }
        }

        if let Some(attempt) = finished {
            self.complete_attempt(attempt).await;
        }
    }

    fn publish(&mut self, event: ClimbEvent) {
        if let ClimbEvent::ClimbBegun { begun, .. } = &event {
            self.attempt_started_at = begun.then(Utc::now);
        }
        self.recorder.on_event(&event);

        log_debug!("emitting {}", event.name());
        // No subscribers is fine; events are fire-and-forget.
        let _ = self.events.send(event);
    }

    /// Bundle the flushed frames with the force log, persist, score and announce.
    async fn complete_attempt(&mut self, attempt: FinishedAttempt) {
        let finished_at = Utc::now();
        let record = AttemptRecord {
            id: attempt.attempt_id,
            climber_name: self.climber_name.clone(),
            started_at: self.attempt_started_at.take().unwrap_or(finished_at),
            finished_at,
            outcome: attempt.outcome,
            frame_log: attempt.frame_log,
            force_log: self.recorder.take_log(),
        };

        log_info!(
            "attempt {} flushed: {} frames, {} force samples",
            record.id,
            record.frame_log.len(),
            record.force_log.len()
        );

        let stored = match &self.db {
            Some(db) => match db.insert_attempt(&record).await {
                Ok(()) => true,
                Err(err) => {
                    log_error!("Failed to store attempt {}: {err:#}", record.id);
                    false
                }
            },
            None => false,
        };

        let report = analyse_attempt(&record, self.machine.geometry(), &self.analysis, &self.tips);
        log_info!(
            "attempt {} scored {} (weakest: {})",
            record.id,
            report.overall_score,
            report.weakest_submetric.as_deref().unwrap_or("none")
        );

        if let (true, Some(db)) = (stored, &self.db) {
            if let Err(err) = db.insert_score(&report).await {
                log_error!("Failed to store score for attempt {}: {err:#}", record.id);
            }
        }

        self.publish(ClimbEvent::AttemptScored {
            report: Box::new(report),
        });
    }

    fn schedule_debounce(&mut self, attempt_id: Uuid, delay_ms: u64) {
        self.cancel_debounce();
        let inputs = self.inputs.clone();
        self.debounce = Some(tokio::spawn(async move {
            time::sleep(Duration::from_millis(delay_ms)).await;
            let _ = inputs.send(SessionInput::DebounceElapsed(attempt_id));
        }));
    }

    fn cancel_debounce(&mut self) {
        if let Some(handle) = self.debounce.take() {
            handle.abort();
        }
    }

    fn arm_watchdog(&mut self, attempt_id: Uuid, timeout_ms: u64) {
        self.disarm_watchdog();
        let inputs = self.inputs.clone();
        self.watchdog = Some(tokio::spawn(async move {
            time::sleep(Duration::from_millis(timeout_ms)).await;
            let _ = inputs.send(SessionInput::WatchdogElapsed(attempt_id));
        }));
    }

    fn disarm_watchdog(&mut self) {
        if let Some(handle) = self.watchdog.take() {
            handle.abort();
        }
    }
}

impl SessionHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<ClimbEvent> {
        self.events.subscribe()
    }

    fn send(&self, input: SessionInput) -> Result<()> {
        self.inputs
            .send(input)
            .map_err(|_| anyhow!("climb session is no longer running"))
    }

    /// Queue one pose inference result: 17 `[row, col, confidence]` triples in model order.
    pub fn submit_frame(&self, timestamp_ms: i64, keypoints: Vec<[f64; 3]>) -> Result<()> {
        self.send(SessionInput::Frame {
            timestamp_ms,
            keypoints,
        })
    }

    pub fn submit_force(&self, tick: ForceTick) -> Result<()> {
        self.send(SessionInput::Force(tick))
    }

    pub fn set_force_link(&self, connected: bool) -> Result<()> {
        self.send(SessionInput::ForceLink(connected))
    }

    /// Finish the live attempt as unsuccessful. Does nothing when idle or already finished.
    pub fn complete_due_to_timeout(&self) -> Result<()> {
        self.send(SessionInput::Timeout)
    }

    /// Leave `Finished` (or abandon a live attempt) and wait for the next start position.
    pub fn reset(&self) -> Result<()> {
        self.send(SessionInput::Reset)
    }

    pub fn set_climber(&self, name: Option<String>) -> Result<()> {
        self.send(SessionInput::SetClimber(name))
    }

    /// Process everything already queued, then stop the worker.
    pub async fn shutdown(&self) -> Result<()> {
        if self.send(SessionInput::Shutdown).is_err() {
            self.cancel_token.cancel();
        }
        self.join().await
    }

    /// Stop the worker without draining queued inputs.
    pub async fn cancel(&self) -> Result<()> {
        self.cancel_token.cancel();
        self.join().await
    }

    async fn join(&self) -> Result<()> {
        if let Some(handle) = self.worker.lock().await.take() {
            handle.await.context("climb session task failed to join")
        } else {
            Ok(())
        }
    }
}
