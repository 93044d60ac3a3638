//! SQLite-backed download store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::store::{CreateDownloadInput, DownloadError, DownloadStore};
use super::types::{DownloadRecord, DownloadStatus, SearchMethod, SourceRef};

const SELECT_COLUMNS: &str = "id, request_id, status, source, search_method, confidence, \
     file_path, file_size, error, created_at, updated_at";

/// SQLite-backed download store.
///
/// The source reference is stored as tagged JSON in a TEXT column so new
/// source kinds never need a schema migration.
pub struct SqliteDownloadStore {
    conn: Mutex<Connection>,
}

impl SqliteDownloadStore {
    pub fn new(path: &Path) -> Result<Self, DownloadError> {
        let conn = Connection::open(path).map_err(|e| DownloadError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, DownloadError> {
        let conn =
            Connection::open_in_memory().map_err(|e| DownloadError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), DownloadError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS downloads (
                id TEXT PRIMARY KEY,
                request_id TEXT NOT NULL,
                status TEXT NOT NULL,
                source TEXT NOT NULL,
                search_method TEXT NOT NULL,
                confidence INTEGER,
                file_path TEXT,
                file_size INTEGER,
                error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_downloads_request_id ON downloads(request_id);
            CREATE INDEX IF NOT EXISTS idx_downloads_status ON downloads(status);

            CREATE TABLE IF NOT EXISTS daily_download_stats (
                date TEXT PRIMARY KEY,
                count INTEGER NOT NULL DEFAULT 0
            );
            "#,
        )
        .map_err(|e| DownloadError::Database(e.to_string()))?;

        Ok(())
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<DownloadRecord> {
        let id: String = row.get(0)?;
        let request_id: String = row.get(1)?;
        let status_str: String = row.get(2)?;
        let source_json: String = row.get(3)?;
        let search_method_str: String = row.get(4)?;
        let confidence: Option<u8> = row.get(5)?;
        let file_path: Option<String> = row.get(6)?;
        let file_size: Option<i64> = row.get(7)?;
        let error: Option<String> = row.get(8)?;
        let created_at_str: String = row.get(9)?;
        let updated_at_str: String = row.get(10)?;

        let source: SourceRef = serde_json::from_str(&source_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?;

        let status = match status_str.as_str() {
            "pending" => DownloadStatus::Pending,
            "downloading" => DownloadStatus::Downloading,
            "completed" => DownloadStatus::Completed,
            _ => DownloadStatus::Failed,
        };

        let search_method = match search_method_str.as_str() {
            "isbn" => SearchMethod::Isbn,
            "manual" => SearchMethod::Manual,
            _ => SearchMethod::TitleAuthor,
        };

        Ok(DownloadRecord {
            id,
            request_id,
            status,
            source,
            search_method,
            confidence,
            file_path,
            file_size,
            error,
            created_at: parse_timestamp(&created_at_str),
            updated_at: parse_timestamp(&updated_at_str),
        })
    }

    fn get_locked(conn: &Connection, id: &str) -> Result<DownloadRecord, DownloadError> {
        conn.query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM downloads WHERE id = ?"),
            params![id],
            Self::row_to_record,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DownloadError::NotFound(id.to_string()),
            other => DownloadError::Database(other.to_string()),
        })
    }

    /// A transition matched zero rows either because the record is missing
    /// or because it already reached a terminal state.
    fn transition_failure(conn: &Connection, id: &str) -> DownloadError {
        match Self::get_locked(conn, id) {
            Ok(_) => DownloadError::AlreadyTerminal(id.to_string()),
            Err(e) => e,
        }
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl DownloadStore for SqliteDownloadStore {
    fn create(&self, input: CreateDownloadInput) -> Result<DownloadRecord, DownloadError> {
        let conn = self.conn.lock().unwrap();

        // The connection mutex makes the check-then-insert atomic.
        let in_flight: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM downloads WHERE request_id = ? \
                 AND status IN ('pending', 'downloading')",
                params![input.request_id],
                |row| row.get(0),
            )
            .map_err(|e| DownloadError::Database(e.to_string()))?;

        if in_flight > 0 {
            return Err(DownloadError::AlreadyInFlight(input.request_id));
        }

        let now = Utc::now();
        let record = DownloadRecord {
            id: uuid::Uuid::new_v4().to_string(),
            request_id: input.request_id,
            status: DownloadStatus::Pending,
            source: input.source,
            search_method: input.search_method,
            confidence: input.confidence,
            file_path: None,
            file_size: None,
            error: None,
            created_at: now,
            updated_at: now,
        };

        let source_json = serde_json::to_string(&record.source)
            .map_err(|e| DownloadError::Database(e.to_string()))?;

        conn.execute(
            "INSERT INTO downloads (id, request_id, status, source, search_method, confidence, \
             file_path, file_size, error, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, NULL, NULL, NULL, ?, ?)",
            params![
                record.id,
                record.request_id,
                record.status.as_str(),
                source_json,
                record.search_method.as_str(),
                record.confidence,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| DownloadError::Database(e.to_string()))?;

        Ok(record)
    }

    fn get(&self, id: &str) -> Result<Option<DownloadRecord>, DownloadError> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM downloads WHERE id = ?"),
            params![id],
            Self::row_to_record,
        )
        .optional()
        .map_err(|e| DownloadError::Database(e.to_string()))
    }

    fn latest_for_request(
        &self,
        request_id: &str,
    ) -> Result<Option<DownloadRecord>, DownloadError> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            &format!(
                "SELECT {SELECT_COLUMNS} FROM downloads WHERE request_id = ? \
                 ORDER BY created_at DESC LIMIT 1"
            ),
            params![request_id],
            Self::row_to_record,
        )
        .optional()
        .map_err(|e| DownloadError::Database(e.to_string()))
    }

    fn active_for_request(
        &self,
        request_id: &str,
    ) -> Result<Option<DownloadRecord>, DownloadError> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            &format!(
                "SELECT {SELECT_COLUMNS} FROM downloads WHERE request_id = ? \
                 AND status IN ('pending', 'downloading') LIMIT 1"
            ),
            params![request_id],
            Self::row_to_record,
        )
        .optional()
        .map_err(|e| DownloadError::Database(e.to_string()))
    }

    fn list_in_flight(&self) -> Result<Vec<DownloadRecord>, DownloadError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM downloads \
                 WHERE status IN ('pending', 'downloading') ORDER BY created_at ASC"
            ))
            .map_err(|e| DownloadError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], Self::row_to_record)
            .map_err(|e| DownloadError::Database(e.to_string()))?;

        let mut records = Vec::new();
        for row_result in rows {
            records.push(row_result.map_err(|e| DownloadError::Database(e.to_string()))?);
        }

        Ok(records)
    }

    fn mark_downloading(&self, id: &str) -> Result<DownloadRecord, DownloadError> {
        let conn = self.conn.lock().unwrap();

        let updated = conn
            .execute(
                "UPDATE downloads SET status = 'downloading', updated_at = ? \
                 WHERE id = ? AND status IN ('pending', 'downloading')",
                params![Utc::now().to_rfc3339(), id],
            )
            .map_err(|e| DownloadError::Database(e.to_string()))?;

        if updated == 0 {
            return Err(Self::transition_failure(&conn, id));
        }

        Self::get_locked(&conn, id)
    }

    fn mark_completed(
        &self,
        id: &str,
        file_path: Option<&str>,
        file_size: Option<i64>,
    ) -> Result<DownloadRecord, DownloadError> {
        let conn = self.conn.lock().unwrap();

        let updated = conn
            .execute(
                "UPDATE downloads SET status = 'completed', file_path = ?, file_size = ?, \
                 error = NULL, updated_at = ? \
                 WHERE id = ? AND status IN ('pending', 'downloading')",
                params![file_path, file_size, Utc::now().to_rfc3339(), id],
            )
            .map_err(|e| DownloadError::Database(e.to_string()))?;

        if updated == 0 {
            return Err(Self::transition_failure(&conn, id));
        }

        Self::get_locked(&conn, id)
    }

    fn mark_failed(&self, id: &str, error: &str) -> Result<DownloadRecord, DownloadError> {
        let conn = self.conn.lock().unwrap();

        let updated = conn
            .execute(
                "UPDATE downloads SET status = 'failed', error = ?, updated_at = ? \
                 WHERE id = ? AND status IN ('pending', 'downloading')",
                params![error, Utc::now().to_rfc3339(), id],
            )
            .map_err(|e| DownloadError::Database(e.to_string()))?;

        if updated == 0 {
            return Err(Self::transition_failure(&conn, id));
        }

        Self::get_locked(&conn, id)
    }

    fn reopen(&self, id: &str, status: DownloadStatus) -> Result<DownloadRecord, DownloadError> {
        let conn = self.conn.lock().unwrap();

        let record = Self::get_locked(&conn, id)?;
        if record.status != DownloadStatus::Failed {
            return Err(DownloadError::NotFailed(id.to_string()));
        }

        // Reopening must not break the one-in-flight-per-request invariant.
        let in_flight: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM downloads WHERE request_id = ? \
                 AND status IN ('pending', 'downloading')",
                params![record.request_id],
                |row| row.get(0),
            )
            .map_err(|e| DownloadError::Database(e.to_string()))?;

        if in_flight > 0 {
            return Err(DownloadError::AlreadyInFlight(record.request_id));
        }

        conn.execute(
            "UPDATE downloads SET status = ?, error = NULL, file_path = NULL, \
             file_size = NULL, updated_at = ? WHERE id = ?",
            params![status.as_str(), Utc::now().to_rfc3339(), id],
        )
        .map_err(|e| DownloadError::Database(e.to_string()))?;

        Self::get_locked(&conn, id)
    }

    fn increment_daily_count(&self, date: &str) -> Result<i64, DownloadError> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            "INSERT INTO daily_download_stats (date, count) VALUES (?, 1) \
             ON CONFLICT(date) DO UPDATE SET count = count + 1 \
             RETURNING count",
            params![date],
            |row| row.get(0),
        )
        .map_err(|e| DownloadError::Database(e.to_string()))
    }

    fn daily_count(&self, date: &str) -> Result<i64, DownloadError> {
        let conn = self.conn.lock().unwrap();

        let count: Option<i64> = conn
            .query_row(
                "SELECT count FROM daily_download_stats WHERE date = ?",
                params![date],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| DownloadError::Database(e.to_string()))?;

        Ok(count.unwrap_or(0))
    }
}
