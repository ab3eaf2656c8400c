use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{debug, error, info};
use rusqlite::Connection;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::analysis::ScoreReport;
use crate::models::AttemptRecord;

use super::migrations::run_migrations;
use super::repositories::{attempts, scores, AttemptSummary};

type Reply<T> = oneshot::Sender<Result<T>>;

/// Requests understood by the attempt store thread.
enum StoreCommand {
    InsertAttempt {
        record: Box<AttemptRecord>,
        reply: Reply<()>,
    },
    GetAttempt {
        attempt_id: Uuid,
        reply: Reply<Option<AttemptRecord>>,
    },
    ListAttempts {
        limit: usize,
        reply: Reply<Vec<AttemptSummary>>,
    },
    DeleteAttempt {
        attempt_id: Uuid,
        reply: Reply<bool>,
    },
    InsertScore {
        report: Box<ScoreReport>,
        reply: Reply<()>,
    },
    GetScore {
        attempt_id: Uuid,
        reply: Reply<Option<ScoreReport>>,
    },
    Close,
}

fn answer<T>(reply: Reply<T>, result: Result<T>) {
    if reply.send(result).is_err() {
        debug!("attempt store caller left before the reply");
    }
}

/// Owns the SQLite connection; everything touching it runs on this thread.
struct StoreWorker {
    conn: Connection,
}

impl StoreWorker {
    fn open(path: &Path) -> Result<Self> {
        let mut conn = Connection::open(path)
            .with_context(|| format!("failed to open attempt store {}", path.display()))?;

        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .context("failed to switch to WAL journaling")?;
        debug!("attempt store journal mode: {mode}");
        // frame and force rows cascade with their attempt
        conn.pragma_update(None, "foreign_keys", "ON")
            .context("failed to enable foreign keys")?;

        run_migrations(&mut conn).context("failed to run database migrations")?;
        Ok(Self { conn })
    }

    fn run(mut self, commands: mpsc::Receiver<StoreCommand>) {
        while let Ok(command) = commands.recv() {
            if !self.handle(command) {
                break;
            }
        }
        info!("attempt store closed");
    }

    /// Returns `false` once the store should stop.
    fn handle(&mut self, command: StoreCommand) -> bool {
        match command {
            StoreCommand::InsertAttempt { record, reply } => {
                answer(reply, attempts::insert_attempt(&mut self.conn, &record))
            }
            StoreCommand::GetAttempt { attempt_id, reply } => {
                answer(reply, attempts::get_attempt(&self.conn, attempt_id))
            }
            StoreCommand::ListAttempts { limit, reply } => {
                answer(reply, attempts::list_attempts(&self.conn, limit))
            }
            StoreCommand::DeleteAttempt { attempt_id, reply } => {
                answer(reply, attempts::delete_attempt(&self.conn, attempt_id))
            }
            StoreCommand::InsertScore { report, reply } => {
                answer(reply, scores::insert_score(&self.conn, &report))
            }
            StoreCommand::GetScore { attempt_id, reply } => {
                answer(reply, scores::get_score(&self.conn, attempt_id))
            }
            StoreCommand::Close => return false,
        }
        true
    }
}

struct Shared {
    path: PathBuf,
    commands: mpsc::Sender<StoreCommand>,
    worker: Option<JoinHandle<()>>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        // A send error means the thread is already gone; joining still reaps it.
        let _ = self.commands.send(StoreCommand::Close);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("attempt store thread panicked");
            }
        }
    }
}

/// Async handle to the attempt store. Clones share one thread, which closes with the last clone.
#[derive(Clone)]
pub struct Database {
    shared: Arc<Shared>,
}

impl Database {
    /// Open (creating and migrating if needed) the store at `path`.
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let worker = StoreWorker::open(&path)?;
        let (commands, receiver) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("climb-db".into())
            .spawn(move || worker.run(receiver))
            .context("failed to spawn attempt store thread")?;

        info!("Attempt store ready at {}", path.display());

        Ok(Self {
            shared: Arc::new(Shared {
                path,
                commands,
                worker: Some(handle),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> StoreCommand) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.shared
            .commands
            .send(command(reply))
            .map_err(|_| anyhow!("attempt store is closed"))?;
        response
            .await
            .map_err(|_| anyhow!("attempt store stopped before replying"))?
    }

    /// Store an attempt with its frame and force logs in one transaction.
    pub async fn insert_attempt(&self, record: &AttemptRecord) -> Result<()> {
        let record = Box::new(record.clone());
        self.request(|reply| StoreCommand::InsertAttempt { record, reply })
            .await
    }

    pub async fn get_attempt(&self, attempt_id: Uuid) -> Result<Option<AttemptRecord>> {
        self.request(|reply| StoreCommand::GetAttempt { attempt_id, reply })
            .await
    }

    /// Most recent attempts first.
    pub async fn list_attempts(&self, limit: usize) -> Result<Vec<AttemptSummary>> {
        self.request(|reply| StoreCommand::ListAttempts { limit, reply })
            .await
    }

    /// Remove an attempt with its rows and score; `false` if it was not stored.
    pub async fn delete_attempt(&self, attempt_id: Uuid) -> Result<bool> {
        self.request(|reply| StoreCommand::DeleteAttempt { attempt_id, reply })
            .await
    }

    /// Store (or replace) the score report of an already stored attempt.
    pub async fn insert_score(&self, report: &ScoreReport) -> Result<()> {
        let report = Box::new(report.clone());
        self.request(|reply| StoreCommand::InsertScore { report, reply })
            .await
    }

    pub async fn get_score(&self, attempt_id: Uuid) -> Result<Option<ScoreReport>> {
        self.request(|reply| StoreCommand::GetScore { attempt_id, reply })
            .await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn temp_db() -> (Database, PathBuf) {
        let path = std::env::temp_dir().join(format!("climb-rocks-{}.sqlite", Uuid::new_v4()));
        (Database::new(path.clone()).unwrap(), path)
    }

    pub(crate) fn cleanup(path: &Path) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }

    /// Second connection to the same file, for inspecting what the store wrote.
    pub(crate) fn inspect(path: &Path) -> Connection {
        Connection::open(path).unwrap()
    }

    #[tokio::test]
    async fn migrates_to_current_schema() {
        let (db, path) = temp_db();
        let conn = inspect(&path);

        let version: i32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, super::super::migrations::CURRENT_SCHEMA_VERSION);

        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        let tables = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .unwrap()
            .collect::<rusqlite::Result<Vec<String>>>()
            .unwrap();
        for table in ["attempt_scores", "attempts", "force_rows", "frame_rows"] {
            assert!(tables.iter().any(|name| name == table), "missing {table}");
        }

        drop(stmt);
        drop(conn);
        drop(db);
        cleanup(&path);
    }

    #[tokio::test]
    async fn reopening_keeps_the_schema() {
        let (db, path) = temp_db();
        drop(db);
        let reopened = Database::new(path.clone()).unwrap();
        assert_eq!(reopened.path(), path.as_path());
        assert!(reopened.list_attempts(5).await.unwrap().is_empty());
        drop(reopened);
        cleanup(&path);
    }

    #[tokio::test]
    async fn clones_share_one_store_until_the_last_drops() {
        let (db, path) = temp_db();
        let clone = db.clone();
        drop(db);
        assert!(clone.get_score(Uuid::new_v4()).await.unwrap().is_none());
        drop(clone);
        cleanup(&path);
    }

    #[test]
    fn unreadable_path_fails_to_open() {
        let dir = std::env::temp_dir().join(format!("climb-rocks-dir-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        // a directory cannot be opened as a database file
        assert!(Database::new(dir.clone()).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
