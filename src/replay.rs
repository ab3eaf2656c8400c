//! Drives a climb session from a recorded JSON-lines script.
//!
//! Each non-empty line is one event, tagged by `type`:
//!
//! ```text
//! {"type":"holds","holds":[{"id":0,"bounding_box":{"left":0.4,"right":0.5,"top":0.1,"bottom":0.15}}]}
//! {"type":"frame","timestamp_ms":0,"keypoints":[[0.5,0.5,0.9], ...]}
//! {"type":"force","timestamp_ms":40,"readings":[1200.0,0.0]}
//! {"type":"timeout","timestamp_ms":90000}
//! ```
//!
//! Lines starting with `#` are comments. The hold layout (`holds` or `detections`) must be the
//! first event.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use tokio::{sync::broadcast::error::RecvError, task::JoinHandle, time};

use crate::analysis::ScoreReport;
use crate::climb::{ClimbEvent, ClimbSession, SessionHandle};
use crate::db::Database;
use crate::export::export_attempt;
use crate::geometry::GeometryStore;
use crate::models::{BoundingBox, ForceTick, HoldDetection};
use crate::settings::{ClimbSettings, SettingsStore};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScriptHold {
    pub id: u32,
    pub bounding_box: BoundingBox,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScriptEvent {
    Holds {
        holds: Vec<ScriptHold>,
    },
    Detections {
        detections: Vec<HoldDetection>,
    },
    Frame {
        timestamp_ms: i64,
        keypoints: Vec<[f64; 3]>,
    },
    Force {
        timestamp_ms: i64,
        readings: Vec<f64>,
    },
    ForceLink {
        connected: bool,
    },
    Timeout {
        #[serde(default)]
        timestamp_ms: Option<i64>,
    },
    Reset,
    Climber {
        name: Option<String>,
    },
}

impl ScriptEvent {
    fn timestamp_ms(&self) -> Option<i64> {
        match self {
            ScriptEvent::Frame { timestamp_ms, .. } | ScriptEvent::Force { timestamp_ms, .. } => {
                Some(*timestamp_ms)
            }
            ScriptEvent::Timeout { timestamp_ms } => *timestamp_ms,
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReplayOptions {
    /// Holds `settings.json`, the attempt database and CSV exports.
    pub data_dir: PathBuf,
    /// Playback rate; timers in the detection settings are scaled with it.
    pub speed: f64,
    /// Persist attempts and scores and export their logs as CSV.
    pub store: bool,
    /// Replaces the climber remembered in the settings.
    pub climber: Option<String>,
}

pub fn parse_script(reader: impl BufRead) -> Result<Vec<ScriptEvent>> {
    let mut events = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read script line {}", number + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let event = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid script event on line {}", number + 1))?;
        events.push(event);
    }
    Ok(events)
}

pub fn load_script(path: &Path) -> Result<Vec<ScriptEvent>> {
    let file =
        File::open(path).with_context(|| format!("failed to open script {}", path.display()))?;
    parse_script(BufReader::new(file))
}

fn geometry_from(event: &ScriptEvent, settings: &ClimbSettings) -> Result<Option<GeometryStore>> {
    let geometry = match event {
        ScriptEvent::Holds { holds } => GeometryStore::from_boxes(
            holds.iter().map(|hold| (hold.id, hold.bounding_box)),
        )?,
        ScriptEvent::Detections { detections } => GeometryStore::from_detections(
            detections,
            settings.detection.min_hold_confidence,
        )?,
        _ => return Ok(None),
    };
    Ok(Some(geometry))
}

fn scaled(settings: &ClimbSettings, speed: f64) -> ClimbSettings {
    let mut settings = settings.clone();
    let scale = |ms: u64| ((ms as f64) / speed).round() as u64;
    settings.detection.debounce_ms = scale(settings.detection.debounce_ms);
    settings.detection.attempt_timeout_ms = settings.detection.attempt_timeout_ms.map(scale);
    settings
}

/// Replay `events` against a fresh session and return the score of every finished attempt.
pub async fn replay(events: Vec<ScriptEvent>, options: &ReplayOptions) -> Result<Vec<ScoreReport>> {
    std::fs::create_dir_all(&options.data_dir).with_context(|| {
        format!(
            "failed to create data directory {}",
            options.data_dir.display()
        )
    })?;
    let store = SettingsStore::new(options.data_dir.join("settings.json"))?;
    if let Some(name) = &options.climber {
        store.set_climber_name(Some(name.clone()))?;
    }
    let settings = store.settings();

    let mut events = events.into_iter();
    let first = events
        .next()
        .ok_or_else(|| anyhow!("script is empty"))?;
    let Some(geometry) = geometry_from(&first, &settings)? else {
        bail!("script must start with the hold layout");
    };
    log::info!("replaying against {} holds", geometry.len());

    let db = if options.store {
        Some(Database::new(options.data_dir.join("climb-rocks.sqlite3"))?)
    } else {
        None
    };

    let handle = ClimbSession::spawn(
        Arc::new(geometry),
        &scaled(&settings, options.speed),
        db.clone(),
    )?;
    let collector = spawn_collector(&handle, db, options.data_dir.join("exports"));

    let mut previous_ms: Option<i64> = None;
    for event in events {
        if let Some(timestamp_ms) = event.timestamp_ms() {
            if let Some(previous_ms) = previous_ms {
                let gap = (timestamp_ms - previous_ms).max(0) as f64 / options.speed;
                time::sleep(Duration::from_secs_f64(gap / 1_000.0)).await;
            }
            previous_ms = Some(timestamp_ms);
        }
        feed(&handle, event)?;
    }

    handle.shutdown().await?;
    drop(handle);

    collector.await.context("event collector failed to join")
}

fn feed(handle: &SessionHandle, event: ScriptEvent) -> Result<()> {
    match event {
        ScriptEvent::Frame {
            timestamp_ms,
            keypoints,
        } => handle.submit_frame(timestamp_ms, keypoints),
        ScriptEvent::Force {
            timestamp_ms,
            readings,
        } => handle.submit_force(ForceTick {
            timestamp_ms,
            readings,
        }),
        ScriptEvent::ForceLink { connected } => handle.set_force_link(connected),
        ScriptEvent::Timeout { .. } => handle.complete_due_to_timeout(),
        ScriptEvent::Reset => handle.reset(),
        ScriptEvent::Climber { name } => handle.set_climber(name),
        ScriptEvent::Holds { .. } | ScriptEvent::Detections { .. } => {
            log::warn!("ignoring hold layout after the session started");
            Ok(())
        }
    }
}

/// Print lifecycle events as they happen and collect score reports until the session closes.
fn spawn_collector(
    handle: &SessionHandle,
    db: Option<Database>,
    export_dir: PathBuf,
) -> JoinHandle<Vec<ScoreReport>> {
    let mut receiver = handle.subscribe();
    tokio::spawn(async move {
        let mut reports = Vec::new();
        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("replay output skipped {skipped} events");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(err) => log::warn!("failed to encode {}: {err}", event.name()),
            }

            if let ClimbEvent::AttemptScored { report } = event {
                if let Some(db) = &db {
                    if let Err(err) = export_stored(db, report.attempt_id, &export_dir).await {
                        log::warn!("CSV export of {} failed: {err:#}", report.attempt_id);
                    }
                }
                reports.push(*report);
            }
        }
        reports
    })
}

async fn export_stored(db: &Database, attempt_id: uuid::Uuid, dir: &Path) -> Result<()> {
    let record = db
        .get_attempt(attempt_id)
        .await?
        .ok_or_else(|| anyhow!("attempt {attempt_id} was not stored"))?;
    let (frames, forces) = export_attempt(&record, dir)?;
    log::info!(
        "exported {} and {}",
        frames.display(),
        forces.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::climb::machine::tests::{at_top, on_wall};
    use crate::models::{AttemptOutcome, FrameObservation};

    fn frame_line(observation: FrameObservation) -> String {
        let keypoints: Vec<[f64; 3]> = observation
            .keypoints
            .iter()
            .map(|keypoint| [keypoint.row, keypoint.col, keypoint.confidence])
            .collect();
        json!({
            "type": "frame",
            "timestamp_ms": observation.timestamp_ms,
            "keypoints": keypoints,
        })
        .to_string()
    }

    fn wall_line() -> String {
        json!({
            "type": "holds",
            "holds": [
                {"id": 0, "bounding_box": {"left": 0.45, "right": 0.55, "top": 0.80, "bottom": 0.85}},
                {"id": 1, "bounding_box": {"left": 0.40, "right": 0.50, "top": 0.45, "bottom": 0.50}},
                {"id": 2, "bounding_box": {"left": 0.45, "right": 0.55, "top": 0.10, "bottom": 0.15}},
            ]
        })
        .to_string()
    }

    #[test]
    fn parses_events_and_skips_comments() {
        let script = format!(
            "# warm-up\n{}\n\n{{\"type\":\"force\",\"timestamp_ms\":5,\"readings\":[1.0,2.0,3.0]}}\n{{\"type\":\"timeout\"}}\n{{\"type\":\"reset\"}}\n",
            wall_line()
        );
        let events = parse_script(script.as_bytes()).unwrap();

        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], ScriptEvent::Holds { ref holds } if holds.len() == 3));
        assert_eq!(
            events[1],
            ScriptEvent::Force {
                timestamp_ms: 5,
                readings: vec![1.0, 2.0, 3.0]
            }
        );
        assert_eq!(events[2], ScriptEvent::Timeout { timestamp_ms: None });
        assert_eq!(events[3], ScriptEvent::Reset);
    }

    #[test]
    fn reports_the_offending_line() {
        let err = parse_script("{\"type\":\"reset\"}\n{\"type\":\"jump\"}\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn timers_scale_with_speed() {
        let settings = scaled(&ClimbSettings::default(), 4.0);
        assert_eq!(settings.detection.debounce_ms, 500);
        assert_eq!(settings.detection.attempt_timeout_ms, Some(30_000));
    }

    #[tokio::test(start_paused = true)]
    async fn script_without_holds_is_rejected() {
        let options = ReplayOptions {
            data_dir: std::env::temp_dir().join(format!("climb-replay-{}", Uuid::new_v4())),
            speed: 1.0,
            store: false,
            climber: None,
        };
        let events = parse_script(frame_line(on_wall(0)).as_bytes()).unwrap();

        assert!(replay(events, &options).await.is_err());
        let _ = std::fs::remove_dir_all(&options.data_dir);
    }

    #[tokio::test]
    async fn replays_a_successful_climb_and_exports_it() {
        let data_dir = std::env::temp_dir().join(format!("climb-replay-{}", Uuid::new_v4()));
        let options = ReplayOptions {
            data_dir: data_dir.clone(),
            speed: 10.0,
            store: true,
            climber: Some("Kai".to_string()),
        };

        let mut lines = vec![wall_line()];
        for step in 0..=30 {
            lines.push(frame_line(on_wall(step * 100)));
        }
        lines.push(frame_line(at_top(3_100)));
        let events = parse_script(lines.join("\n").as_bytes()).unwrap();

        let reports = replay(events, &options).await.unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].outcome, AttemptOutcome::Successful);
        assert_eq!(reports[0].leaderboard.climber_name, "Kai");
        let remembered = SettingsStore::new(data_dir.join("settings.json"))
            .unwrap()
            .settings();
        assert_eq!(remembered.climber_name.as_deref(), Some("Kai"));
        let exports: Vec<_> = std::fs::read_dir(data_dir.join("exports"))
            .unwrap()
            .collect();
        assert_eq!(exports.len(), 2);

        let _ = std::fs::remove_dir_all(&data_dir);
    }
}
