//! Flat CSV form of the frame and force logs.
//!
//! Frame log columns: `timestamp_ms, cog_x, cog_y, left_arm_angle, right_arm_angle`, then
//! `{keypoint}_x, {keypoint}_y, {keypoint}_score` for each tracked keypoint. Empty cells
//! are missing values. Force log columns: `timestamp_ms, force_hold0 .. force_holdN`.

use std::{
    fs::File,
    io::{Read, Write},
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};

use crate::models::{
    ArmAngles, AttemptRecord, ForceLog, ForceSample, FrameLog, Keypoint, LoggedFrame, Point,
    TRACKED_KEYPOINTS,
};

const FRAME_PREFIX_COLUMNS: [&str; 5] = [
    "timestamp_ms",
    "cog_x",
    "cog_y",
    "left_arm_angle",
    "right_arm_angle",
];

pub fn frame_log_headers() -> Vec<String> {
    let mut headers: Vec<String> = FRAME_PREFIX_COLUMNS.iter().map(|h| h.to_string()).collect();
    for id in TRACKED_KEYPOINTS {
        let name = id.as_str();
        headers.push(format!("{name}_x"));
        headers.push(format!("{name}_y"));
        headers.push(format!("{name}_score"));
    }
    headers
}

pub fn force_log_headers(hold_count: usize) -> Vec<String> {
    std::iter::once("timestamp_ms".to_string())
        .chain((0..hold_count).map(|hold| format!("force_hold{hold}")))
        .collect()
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn write_frame_log<W: Write>(log: &FrameLog, out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(frame_log_headers())?;

    for frame in log.iter() {
        let mut row = vec![
            frame.timestamp_ms.to_string(),
            cell(frame.center_of_gravity.map(|cog| cog.x)),
            cell(frame.center_of_gravity.map(|cog| cog.y)),
            cell(frame.arm_angles.left),
            cell(frame.arm_angles.right),
        ];
        for keypoint in &frame.keypoints {
            row.push(keypoint.col.to_string());
            row.push(keypoint.row.to_string());
            row.push(keypoint.confidence.to_string());
        }
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

pub fn read_frame_log<R: Read>(input: R) -> Result<FrameLog> {
    let mut reader = csv::Reader::from_reader(input);
    let expected = frame_log_headers();
    let headers = reader.headers().context("frame log has no header row")?;
    if headers.iter().ne(expected.iter().map(String::as_str)) {
        bail!("unexpected frame log header: {:?}", headers);
    }

    let mut frames = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("failed to read frame row {}", line + 1))?;
        let field = |column: usize| -> Result<Option<f64>> {
            parse_cell(record.get(column), &expected[column])
                .with_context(|| format!("frame row {}", line + 1))
        };
        let required = |column: usize| -> Result<f64> {
            field(column)?.ok_or_else(|| anyhow!("frame row {} is missing {}", line + 1, expected[column]))
        };

        let timestamp_ms = record
            .get(0)
            .unwrap_or_default()
            .parse::<i64>()
            .with_context(|| format!("invalid timestamp in frame row {}", line + 1))?;

        let center_of_gravity = match (field(1)?, field(2)?) {
            (Some(x), Some(y)) => Some(Point::new(x, y)),
            _ => None,
        };

        let mut keypoints = [Keypoint::new(0.0, 0.0, 0.0); TRACKED_KEYPOINTS.len()];
        for (slot, keypoint) in keypoints.iter_mut().enumerate() {
            let base = FRAME_PREFIX_COLUMNS.len() + slot * 3;
            *keypoint = Keypoint::new(required(base + 1)?, required(base)?, required(base + 2)?);
        }

        frames.push(LoggedFrame {
            timestamp_ms,
            center_of_gravity,
            arm_angles: ArmAngles {
                left: field(3)?,
                right: field(4)?,
            },
            keypoints,
        });
    }

    Ok(FrameLog::from_frames(frames))
}

pub fn write_force_log<W: Write>(log: &ForceLog, out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(force_log_headers(log.hold_count()))?;

    for sample in log.samples() {
        let row: Vec<String> = std::iter::once(sample.timestamp_ms.to_string())
            .chain(sample.forces.iter().map(|force| force.to_string()))
            .collect();
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

pub fn read_force_log<R: Read>(input: R) -> Result<ForceLog> {
    let mut reader = csv::Reader::from_reader(input);
    let headers = reader.headers().context("force log has no header row")?.clone();
    let hold_count = headers.len().saturating_sub(1);
    if headers.iter().ne(force_log_headers(hold_count).iter().map(String::as_str)) {
        bail!("unexpected force log header: {:?}", headers);
    }

    let mut samples = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("failed to read force row {}", line + 1))?;
        let timestamp_ms = record
            .get(0)
            .unwrap_or_default()
            .parse::<i64>()
            .with_context(|| format!("invalid timestamp in force row {}", line + 1))?;
        let forces = record
            .iter()
            .skip(1)
            .map(|value| {
                value
                    .parse::<f64>()
                    .with_context(|| format!("invalid force '{value}' in row {}", line + 1))
            })
            .collect::<Result<Vec<f64>>>()?;
        samples.push(ForceSample {
            timestamp_ms,
            forces,
        });
    }

    Ok(ForceLog::from_samples(hold_count, samples))
}

fn parse_cell(value: Option<&str>, column: &str) -> Result<Option<f64>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<f64>()
            .map(Some)
            .with_context(|| format!("invalid {column} value '{raw}'")),
    }
}

/// Write `<id>_frames.csv` and `<id>_forces.csv` for the attempt into `dir`.
pub fn export_attempt(record: &AttemptRecord, dir: &Path) -> Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create export directory {}", dir.display()))?;

    let frames_path = dir.join(format!("{}_frames.csv", record.id));
    let forces_path = dir.join(format!("{}_forces.csv", record.id));

    let frames_file = File::create(&frames_path)
        .with_context(|| format!("failed to create {}", frames_path.display()))?;
    write_frame_log(&record.frame_log, frames_file)?;

    let forces_file = File::create(&forces_path)
        .with_context(|| format!("failed to create {}", forces_path.display()))?;
    write_force_log(&record.force_log, forces_file)?;

    Ok((frames_path, forces_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FrameObservation, KeypointId, KEYPOINT_COUNT};

    fn sample_log() -> FrameLog {
        let mut raw = vec![[0.512345678, 0.4, 0.87654321]; KEYPOINT_COUNT];
        raw[KeypointId::LeftShoulder.index()] = [0.40, 0.40, 0.9];
        raw[KeypointId::LeftElbow.index()] = [0.50, 0.43, 0.9];
        raw[KeypointId::LeftWrist.index()] = [0.58, 0.47, 0.9];
        raw[KeypointId::RightWrist.index()] = [0.1, 0.9, 0.05];

        let first = FrameObservation::from_inference(1_000, &raw, 0.3).unwrap();
        raw[KeypointId::LeftHip.index()][2] = 0.0;
        let second = FrameObservation::from_inference(1_033, &raw, 0.3).unwrap();

        FrameLog::from_frames(vec![
            LoggedFrame::from_observation(&first, 1_000),
            LoggedFrame::from_observation(&second, 1_000),
        ])
    }

    #[test]
    fn header_lists_every_tracked_keypoint() {
        let headers = frame_log_headers();
        assert_eq!(headers.len(), 5 + 12 * 3);
        assert_eq!(headers[5], "left_shoulder_x");
        assert_eq!(headers[7], "left_shoulder_score");
        assert_eq!(headers.last().map(String::as_str), Some("right_ankle_score"));
    }

    #[test]
    fn frame_log_survives_csv() {
        let log = sample_log();
        assert_eq!(log.frames()[0].arm_angles.right, None);
        assert!(log.frames()[0].arm_angles.left.is_some());

        let mut buffer = Vec::new();
        write_frame_log(&log, &mut buffer).unwrap();
        let restored = read_frame_log(buffer.as_slice()).unwrap();

        assert_eq!(restored, log);
        assert_eq!(restored.frames()[1].timestamp_ms, 33);
    }

    #[test]
    fn rejects_foreign_header() {
        let err = read_frame_log("time,x,y\n1,2,3\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("unexpected frame log header"));
    }

    #[test]
    fn missing_keypoint_cell_is_an_error() {
        let mut buffer = Vec::new();
        write_frame_log(&sample_log(), &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
        // blank the last keypoint score of the first row
        let row = lines[1].rsplit_once(',').unwrap().0.to_string();
        lines[1] = format!("{row},");

        assert!(read_frame_log(lines.join("\n").as_bytes()).is_err());
    }

    #[test]
    fn force_log_survives_csv() {
        let log = ForceLog::from_samples(
            3,
            vec![
                ForceSample {
                    timestamp_ms: 0,
                    forces: vec![0.0, 1250.5, 3.25],
                },
                ForceSample {
                    timestamp_ms: 50,
                    forces: vec![10.0, 0.0, 8000.0],
                },
            ],
        );

        let mut buffer = Vec::new();
        write_force_log(&log, &mut buffer).unwrap();
        let text = String::from_utf8(buffer.clone()).unwrap();
        assert!(text.starts_with("timestamp_ms,force_hold0,force_hold1,force_hold2\n"));

        assert_eq!(read_force_log(buffer.as_slice()).unwrap(), log);
    }

    #[test]
    fn exports_attempt_files() {
        use chrono::Utc;
        use uuid::Uuid;

        use crate::models::AttemptOutcome;

        let record = AttemptRecord {
            id: Uuid::new_v4(),
            climber_name: None,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            outcome: AttemptOutcome::Unsuccessful,
            frame_log: sample_log(),
            force_log: ForceLog::new(2),
        };
        let dir = std::env::temp_dir().join(format!("climb-export-{}", Uuid::new_v4()));

        let (frames, forces) = export_attempt(&record, &dir).unwrap();
        let restored = read_frame_log(File::open(&frames).unwrap()).unwrap();
        assert_eq!(restored, record.frame_log);
        assert_eq!(read_force_log(File::open(&forces).unwrap()).unwrap().hold_count(), 2);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
