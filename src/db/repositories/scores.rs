use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::analysis::ScoreReport;

pub(crate) fn insert_score(conn: &Connection, report: &ScoreReport) -> Result<()> {
    let report_json = serde_json::to_string(report).context("failed to encode score report")?;
    conn.execute(
        "INSERT OR REPLACE INTO attempt_scores (attempt_id, overall_score, pressure, positioning, progress, weakest_submetric, tip, report_json, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            report.attempt_id.to_string(),
            report.overall_score,
            report.pressure.combined_score,
            report.positioning.combined_score,
            report.progress.combined_score,
            report.weakest_submetric,
            report.tip,
            report_json,
            Utc::now().to_rfc3339(),
        ],
    )
    .context("failed to insert score report")?;
    Ok(())
}

pub(crate) fn get_score(conn: &Connection, attempt_id: Uuid) -> Result<Option<ScoreReport>> {
    let report_json: Option<String> = conn
        .query_row(
            "SELECT report_json FROM attempt_scores WHERE attempt_id = ?1",
            params![attempt_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;

    report_json
        .map(|json| serde_json::from_str(&json).context("failed to decode score report"))
        .transpose()
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use crate::analysis::{analyse_attempt_with_rng, AnalysisConfig};
    use crate::db::connection::tests::{cleanup, temp_db};
    use crate::db::repositories::attempts::tests::sample_record;
    use crate::geometry::GeometryStore;
    use crate::models::BoundingBox;
    use crate::tips::TipBook;

    #[tokio::test]
    async fn score_report_round_trips() {
        let (db, path) = temp_db();
        let record = sample_record();
        let geometry = GeometryStore::from_boxes(vec![
            (0, BoundingBox::new(0.1, 0.2, 0.1, 0.2)),
            (1, BoundingBox::new(0.1, 0.2, 0.7, 0.8)),
        ])
        .unwrap();
        let report = analyse_attempt_with_rng(
            &record,
            &geometry,
            &AnalysisConfig::default(),
            &TipBook::default(),
            &mut StdRng::seed_from_u64(9),
        );

        db.insert_attempt(&record).await.unwrap();
        db.insert_score(&report).await.unwrap();

        let loaded = db.get_score(record.id).await.unwrap().unwrap();
        assert_eq!(loaded, report);
        assert!(db.get_score(uuid::Uuid::new_v4()).await.unwrap().is_none());

        drop(db);
        cleanup(&path);
    }

    #[tokio::test]
    async fn score_needs_a_stored_attempt() {
        let (db, path) = temp_db();
        let record = sample_record();
        let report = analyse_attempt_with_rng(
            &record,
            &GeometryStore::from_boxes(vec![(0, BoundingBox::new(0.1, 0.2, 0.1, 0.2))]).unwrap(),
            &AnalysisConfig::default(),
            &TipBook::default(),
            &mut StdRng::seed_from_u64(9),
        );

        assert!(db.insert_score(&report).await.is_err());

        drop(db);
        cleanup(&path);
    }

    #[tokio::test]
    async fn deleting_the_attempt_drops_its_score() {
        let (db, path) = temp_db();
        let record = sample_record();
        let report = analyse_attempt_with_rng(
            &record,
            &GeometryStore::from_boxes(vec![(0, BoundingBox::new(0.1, 0.2, 0.1, 0.2))]).unwrap(),
            &AnalysisConfig::default(),
            &TipBook::default(),
            &mut StdRng::seed_from_u64(3),
        );

        db.insert_attempt(&record).await.unwrap();
        db.insert_score(&report).await.unwrap();
        assert!(db.delete_attempt(record.id).await.unwrap());
        assert!(db.get_score(record.id).await.unwrap().is_none());

        drop(db);
        cleanup(&path);
    }
}
