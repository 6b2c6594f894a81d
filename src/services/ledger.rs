//! Durable per-chunk progress tracking for resumable builds.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, params};
use tracing::debug;

use crate::error::{ErrorKind, LedgerError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS chunk_progress (
    chunk_id TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    error_kind TEXT,
    updated_at TEXT NOT NULL
);
"#;

/// Durable record of which chunks have been embedded and stored.
///
/// One ledger exists per knowledge-base destination and is never deleted
/// implicitly; [`ProgressLedger::reset`] is the only way to wipe it. A lock
/// file beside the database rejects concurrent builds against the same
/// destination.
pub struct ProgressLedger {
    conn: Connection,
    completed: HashSet<String>,
    lock_path: PathBuf,
}

impl ProgressLedger {
    /// Open the ledger at `path`, creating it if needed, and load the set of
    /// completed chunk ids.
    pub fn open(path: &Path) -> Result<Self, LedgerError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lock_path = path.with_extension("lock");
        acquire_lock(&lock_path)?;

        match Self::open_database(path) {
            Ok((conn, completed)) => {
                debug!(completed = completed.len(), path = %path.display(), "ledger opened");
                Ok(Self {
                    conn,
                    completed,
                    lock_path,
                })
            }
            Err(err) => {
                let _ = fs::remove_file(&lock_path);
                Err(err)
            }
        }
    }

    fn open_database(path: &Path) -> Result<(Connection, HashSet<String>), LedgerError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        conn.execute_batch(SCHEMA)?;

        let mut completed = HashSet::new();
        {
            let mut stmt =
                conn.prepare("SELECT chunk_id FROM chunk_progress WHERE status = 'completed'")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            for row in rows {
                completed.insert(row?);
            }
        }

        Ok((conn, completed))
    }

    /// O(1) membership check against the state loaded at open.
    pub fn is_complete(&self, chunk_id: &str) -> bool {
        self.completed.contains(chunk_id)
    }

    /// Number of chunks recorded as completed.
    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    /// Number of chunks whose last recorded outcome was a failure.
    pub fn failed_count(&self) -> Result<usize, LedgerError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM chunk_progress WHERE status = 'failed'",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Record a whole batch as completed. Atomic with respect to process
    /// crash: either every id in the batch is durable or none is.
    pub fn mark_completed(&mut self, chunk_ids: &[String]) -> Result<(), LedgerError> {
        if chunk_ids.is_empty() {
            return Ok(());
        }

        let now = chrono::Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO chunk_progress (chunk_id, status, error_kind, updated_at)
                 VALUES (?1, 'completed', NULL, ?2)
                 ON CONFLICT(chunk_id) DO UPDATE SET
                     status = 'completed', error_kind = NULL, updated_at = ?2",
            )?;
            for id in chunk_ids {
                stmt.execute(params![id, now])?;
            }
        }
        tx.commit()?;

        self.completed.extend(chunk_ids.iter().cloned());
        Ok(())
    }

    /// Record a failed batch for diagnostics. Failed chunks stay eligible
    /// for the next run; a chunk already completed is never downgraded.
    pub fn mark_failed(&mut self, chunk_ids: &[String], kind: ErrorKind) -> Result<(), LedgerError> {
        if chunk_ids.is_empty() {
            return Ok(());
        }

        let now = chrono::Utc::now().to_rfc3339();
        let kind = kind.to_string();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO chunk_progress (chunk_id, status, error_kind, updated_at)
                 VALUES (?1, 'failed', ?2, ?3)
                 ON CONFLICT(chunk_id) DO UPDATE SET
                     status = 'failed', error_kind = ?2, updated_at = ?3
                 WHERE chunk_progress.status != 'completed'",
            )?;
            for id in chunk_ids {
                stmt.execute(params![id, kind, now])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Wipe all recorded progress. Explicit user action only.
    pub fn reset(&mut self) -> Result<(), LedgerError> {
        self.conn.execute("DELETE FROM chunk_progress", [])?;
        self.completed.clear();
        Ok(())
    }
}

impl Drop for ProgressLedger {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}

/// Create the lock file, failing if another process already holds it.
fn acquire_lock(lock_path: &Path) -> Result<(), LedgerError> {
    match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(lock_path)
    {
        Ok(mut file) => {
            let _ = write!(file, "{}", std::process::id());
            Ok(())
        }
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
            Err(LedgerError::Locked(lock_path.display().to_string()))
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_completed_state_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("progress.db");

        let mut ledger = ProgressLedger::open(&path).unwrap();
        assert!(!ledger.is_complete("a"));
        ledger.mark_completed(&ids(&["a", "b"])).unwrap();
        assert!(ledger.is_complete("a"));
        assert!(ledger.is_complete("b"));
        drop(ledger);

        let reopened = ProgressLedger::open(&path).unwrap();
        assert!(reopened.is_complete("a"));
        assert!(reopened.is_complete("b"));
        assert!(!reopened.is_complete("c"));
        assert_eq!(reopened.completed_count(), 2);
    }

    #[test]
    fn test_failed_chunks_stay_eligible() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("progress.db");

        let mut ledger = ProgressLedger::open(&path).unwrap();
        ledger
            .mark_failed(&ids(&["a", "b"]), ErrorKind::RetriesExhausted)
            .unwrap();
        assert!(!ledger.is_complete("a"));
        assert_eq!(ledger.failed_count().unwrap(), 2);
        drop(ledger);

        let reopened = ProgressLedger::open(&path).unwrap();
        assert!(!reopened.is_complete("a"));
        assert_eq!(reopened.completed_count(), 0);
    }

    #[test]
    fn test_failure_then_completion_upgrades() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("progress.db");

        let mut ledger = ProgressLedger::open(&path).unwrap();
        ledger
            .mark_failed(&ids(&["a"]), ErrorKind::Transient)
            .unwrap();
        ledger.mark_completed(&ids(&["a"])).unwrap();
        assert!(ledger.is_complete("a"));
        assert_eq!(ledger.failed_count().unwrap(), 0);
    }

    #[test]
    fn test_completion_is_never_downgraded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("progress.db");

        let mut ledger = ProgressLedger::open(&path).unwrap();
        ledger.mark_completed(&ids(&["a"])).unwrap();
        ledger
            .mark_failed(&ids(&["a"]), ErrorKind::Storage)
            .unwrap();
        drop(ledger);

        let reopened = ProgressLedger::open(&path).unwrap();
        assert!(reopened.is_complete("a"));
    }

    #[test]
    fn test_reset_clears_everything() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("progress.db");

        let mut ledger = ProgressLedger::open(&path).unwrap();
        ledger.mark_completed(&ids(&["a", "b"])).unwrap();
        ledger.reset().unwrap();
        assert!(!ledger.is_complete("a"));
        assert_eq!(ledger.completed_count(), 0);
        drop(ledger);

        let reopened = ProgressLedger::open(&path).unwrap();
        assert_eq!(reopened.completed_count(), 0);
    }

    #[test]
    fn test_concurrent_open_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("progress.db");

        let first = ProgressLedger::open(&path).unwrap();
        let second = ProgressLedger::open(&path);
        assert!(matches!(second, Err(LedgerError::Locked(_))));

        drop(first);
        assert!(ProgressLedger::open(&path).is_ok());
    }

    #[test]
    fn test_mark_empty_batch_is_noop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("progress.db");

        let mut ledger = ProgressLedger::open(&path).unwrap();
        ledger.mark_completed(&[]).unwrap();
        ledger.mark_failed(&[], ErrorKind::Transient).unwrap();
        assert_eq!(ledger.completed_count(), 0);
    }
}
