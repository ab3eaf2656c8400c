use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::helpers::{parse_datetime, parse_outcome, parse_uuid, to_i64, to_usize};
use crate::models::{
    ArmAngles, AttemptOutcome, AttemptRecord, ForceLog, ForceSample, FrameLog, LoggedFrame, Point,
};

/// Attempt metadata without its logs.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptSummary {
    pub id: Uuid,
    pub climber_name: Option<String>,
    pub started_at: chrono::DateTime<Utc>,
    pub finished_at: chrono::DateTime<Utc>,
    pub outcome: AttemptOutcome,
}

fn row_to_summary(row: &Row) -> Result<AttemptSummary> {
    let id: String = row.get("id")?;
    let started_at: String = row.get("started_at")?;
    let finished_at: String = row.get("finished_at")?;
    let outcome: String = row.get("outcome")?;

    Ok(AttemptSummary {
        id: parse_uuid(&id, "id")?,
        climber_name: row.get("climber_name")?,
        started_at: parse_datetime(&started_at, "started_at")?,
        finished_at: parse_datetime(&finished_at, "finished_at")?,
        outcome: parse_outcome(&outcome)?,
    })
}

fn row_to_frame(row: &Row) -> Result<LoggedFrame> {
    let cog_x: Option<f64> = row.get("cog_x")?;
    let cog_y: Option<f64> = row.get("cog_y")?;
    let keypoints_json: String = row.get("keypoints_json")?;

    Ok(LoggedFrame {
        timestamp_ms: row.get("timestamp_ms")?,
        center_of_gravity: cog_x.zip(cog_y).map(|(x, y)| Point::new(x, y)),
        arm_angles: ArmAngles {
            left: row.get("left_arm_angle")?,
            right: row.get("right_arm_angle")?,
        },
        keypoints: serde_json::from_str(&keypoints_json)
            .context("failed to decode frame keypoints")?,
    })
}

fn row_to_force_sample(row: &Row) -> Result<ForceSample> {
    let forces_json: String = row.get("forces_json")?;
    Ok(ForceSample {
        timestamp_ms: row.get("timestamp_ms")?,
        forces: serde_json::from_str(&forces_json).context("failed to decode force row")?,
    })
}

pub(crate) fn insert_attempt(conn: &mut Connection, record: &AttemptRecord) -> Result<()> {
    let tx = conn.transaction()?;
    let attempt_id = record.id.to_string();

    tx.execute(
        "INSERT INTO attempts (id, climber_name, started_at, finished_at, outcome, force_hold_count, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            attempt_id,
            record.climber_name,
            record.started_at.to_rfc3339(),
            record.finished_at.to_rfc3339(),
            record.outcome.as_str(),
            to_i64(record.force_log.hold_count())?,
            Utc::now().to_rfc3339(),
        ],
    )
    .context("failed to insert attempt")?;

    {
        let mut frames = tx.prepare(
            "INSERT INTO frame_rows (attempt_id, seq, timestamp_ms, cog_x, cog_y, left_arm_angle, right_arm_angle, keypoints_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for (seq, frame) in record.frame_log.iter().enumerate() {
            frames
                .execute(params![
                    attempt_id,
                    to_i64(seq)?,
                    frame.timestamp_ms,
                    frame.center_of_gravity.map(|cog| cog.x),
                    frame.center_of_gravity.map(|cog| cog.y),
                    frame.arm_angles.left,
                    frame.arm_angles.right,
                    serde_json::to_string(&frame.keypoints)?,
                ])
                .context("failed to insert frame row")?;
        }

        let mut forces = tx.prepare(
            "INSERT INTO force_rows (attempt_id, seq, timestamp_ms, forces_json)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (seq, sample) in record.force_log.samples().iter().enumerate() {
            forces
                .execute(params![
                    attempt_id,
                    to_i64(seq)?,
                    sample.timestamp_ms,
                    serde_json::to_string(&sample.forces)?,
                ])
                .context("failed to insert force row")?;
        }
    }

    tx.commit().context("failed to commit attempt")
}

pub(crate) fn get_attempt(conn: &Connection, attempt_id: Uuid) -> Result<Option<AttemptRecord>> {
    let id = attempt_id.to_string();

    let header = conn
        .query_row(
            "SELECT id, climber_name, started_at, finished_at, outcome, force_hold_count
             FROM attempts
             WHERE id = ?1",
            params![id],
            |row| Ok((row_to_summary(row), row.get::<_, i64>("force_hold_count")?)),
        )
        .optional()?;

    let Some((summary, hold_count)) = header else {
        return Ok(None);
    };
    let summary = summary?;

    let mut stmt = conn.prepare(
        "SELECT timestamp_ms, cog_x, cog_y, left_arm_angle, right_arm_angle, keypoints_json
         FROM frame_rows
         WHERE attempt_id = ?1
         ORDER BY seq",
    )?;
    let mut rows = stmt.query(params![id])?;
    let mut frames = Vec::new();
    while let Some(row) = rows.next()? {
        frames.push(row_to_frame(row)?);
    }

    let mut stmt = conn.prepare(
        "SELECT timestamp_ms, forces_json
         FROM force_rows
         WHERE attempt_id = ?1
         ORDER BY seq",
    )?;
    let mut rows = stmt.query(params![id])?;
    let mut samples = Vec::new();
    while let Some(row) = rows.next()? {
        samples.push(row_to_force_sample(row)?);
    }

    Ok(Some(AttemptRecord {
        id: summary.id,
        climber_name: summary.climber_name,
        started_at: summary.started_at,
        finished_at: summary.finished_at,
        outcome: summary.outcome,
        frame_log: FrameLog::from_frames(frames),
        force_log: ForceLog::from_samples(to_usize(hold_count, "force_hold_count")?, samples),
    }))
}

pub(crate) fn list_attempts(conn: &Connection, limit: usize) -> Result<Vec<AttemptSummary>> {
    let mut stmt = conn.prepare(
        "SELECT id, climber_name, started_at, finished_at, outcome
         FROM attempts
         ORDER BY started_at DESC
         LIMIT ?1",
    )?;
    let mut rows = stmt.query(params![to_i64(limit)?])?;
    let mut attempts = Vec::new();
    while let Some(row) = rows.next()? {
        attempts.push(row_to_summary(row)?);
    }
    Ok(attempts)
}

pub(crate) fn delete_attempt(conn: &Connection, attempt_id: Uuid) -> Result<bool> {
    let removed = conn
        .execute(
            "DELETE FROM attempts WHERE id = ?1",
            params![attempt_id.to_string()],
        )
        .context("failed to delete attempt")?;
    Ok(removed > 0)
}
