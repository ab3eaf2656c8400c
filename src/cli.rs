use std::path::PathBuf;

use clap::{builder::FalseyValueParser, Parser, ValueHint};
use thiserror::Error;

use crate::replay::ReplayOptions;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpeedError {
    #[error("replay speed {0:?} is not a number")]
    NotANumber(String),
    #[error("replay speed must be a positive finite factor, got {0}")]
    NotPositive(f64),
}

fn parse_speed(raw: &str) -> Result<f64, SpeedError> {
    let speed: f64 = raw
        .trim()
        .parse()
        .map_err(|_| SpeedError::NotANumber(raw.to_string()))?;
    if speed.is_finite() && speed > 0.0 {
        Ok(speed)
    } else {
        Err(SpeedError::NotPositive(speed))
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Replay a recorded climbing session and score its attempts", long_about = None)]
pub struct Cli {
    /// JSON-lines session script, hold layout first
    #[arg(value_hint = ValueHint::FilePath)]
    pub script: PathBuf,

    /// Directory for settings.json, the attempt database and CSV exports
    #[arg(long, env = "CLIMB_ROCKS_DATA_DIR", default_value = "data", value_hint = ValueHint::DirPath)]
    pub data_dir: PathBuf,

    /// Playback rate; 2 replays twice as fast
    #[arg(long, env = "CLIMB_ROCKS_REPLAY_SPEED", default_value_t = 1.0, value_parser = parse_speed)]
    pub speed: f64,

    /// Skip the database and CSV export
    #[arg(long, env = "CLIMB_ROCKS_NO_STORE", value_parser = FalseyValueParser::new())]
    pub no_store: bool,

    /// Climber credited with the attempts; remembered in settings.json
    #[arg(long)]
    pub climber: Option<String>,
}

impl Cli {
    pub fn replay_options(&self) -> ReplayOptions {
        ReplayOptions {
            data_dir: self.data_dir.clone(),
            speed: self.speed,
            store: !self.no_store,
            climber: self.climber.clone(),
        }
    }
}
