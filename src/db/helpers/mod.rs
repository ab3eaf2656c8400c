use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::AttemptOutcome;

pub fn to_i64(value: usize) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_usize(value: i64, field: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_uuid(value: &str, field: &str) -> Result<Uuid> {
    Uuid::parse_str(value).with_context(|| format!("failed to parse {field} '{value}'"))
}

pub fn parse_outcome(value: &str) -> Result<AttemptOutcome> {
    match value {
        "Successful" => Ok(AttemptOutcome::Successful),
        "Unsuccessful" => Ok(AttemptOutcome::Unsuccessful),
        other => Err(anyhow!("unknown attempt outcome {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_names_round_trip() {
        for outcome in [AttemptOutcome::Successful, AttemptOutcome::Unsuccessful] {
            assert_eq!(parse_outcome(outcome.as_str()).unwrap(), outcome);
        }
        assert!(parse_outcome("Abandoned").is_err());
    }

    #[test]
    fn rejects_negative_counts() {
        assert_eq!(to_usize(3, "seq").unwrap(), 3);
        assert!(to_usize(-1, "seq").is_err());
    }
}
