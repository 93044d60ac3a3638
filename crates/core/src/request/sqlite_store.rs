//! SQLite-backed request store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{
    BookRequest, CreateRequestInput, RequestError, RequestFilter, RequestStatus, RequestStore,
};

const SELECT_COLUMNS: &str = "id, title, authors, isbn13, isbn10, year, language, \
     requested_format, status, error_message, created_at, updated_at";

/// SQLite-backed request store.
pub struct SqliteRequestStore {
    conn: Mutex<Connection>,
}

impl SqliteRequestStore {
    /// Open (or create) the store at the given path.
    pub fn new(path: &Path) -> Result<Self, RequestError> {
        let conn = Connection::open(path).map_err(|e| RequestError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, RequestError> {
        let conn =
            Connection::open_in_memory().map_err(|e| RequestError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), RequestError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS book_requests (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                authors TEXT NOT NULL,
                isbn13 TEXT,
                isbn10 TEXT,
                year INTEGER,
                language TEXT,
                requested_format TEXT,
                status TEXT NOT NULL,
                error_message TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_book_requests_status ON book_requests(status);
            CREATE INDEX IF NOT EXISTS idx_book_requests_created_at ON book_requests(created_at);
            "#,
        )
        .map_err(|e| RequestError::Database(e.to_string()))?;

        Ok(())
    }

    fn row_to_request(row: &rusqlite::Row) -> rusqlite::Result<BookRequest> {
        let id: String = row.get(0)?;
        let title: String = row.get(1)?;
        let authors_json: String = row.get(2)?;
        let isbn13: Option<String> = row.get(3)?;
        let isbn10: Option<String> = row.get(4)?;
        let year: Option<i32> = row.get(5)?;
        let language: Option<String> = row.get(6)?;
        let requested_format: Option<String> = row.get(7)?;
        let status_str: String = row.get(8)?;
        let error_message: Option<String> = row.get(9)?;
        let created_at_str: String = row.get(10)?;
        let updated_at_str: String = row.get(11)?;

        let authors: Vec<String> = serde_json::from_str(&authors_json).unwrap_or_default();

        let status = match status_str.as_str() {
            "pending" => RequestStatus::Pending,
            "approved" => RequestStatus::Approved,
            "rejected" => RequestStatus::Rejected,
            "completed" => RequestStatus::Completed,
            "download_problem" => RequestStatus::DownloadProblem,
            _ => RequestStatus::Pending,
        };

        Ok(BookRequest {
            id,
            title,
            authors,
            isbn13,
            isbn10,
            year,
            language,
            requested_format,
            status,
            error_message,
            created_at: parse_timestamp(&created_at_str),
            updated_at: parse_timestamp(&updated_at_str),
        })
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl RequestStore for SqliteRequestStore {
    fn create(&self, input: CreateRequestInput) -> Result<BookRequest, RequestError> {
        let conn = self.conn.lock().unwrap();

        let now = Utc::now();
        let request = BookRequest {
            id: uuid::Uuid::new_v4().to_string(),
            title: input.title,
            authors: input.authors,
            isbn13: input.isbn13,
            isbn10: input.isbn10,
            year: input.year,
            language: input.language,
            requested_format: input.requested_format,
            status: RequestStatus::Pending,
            error_message: None,
            created_at: now,
            updated_at: now,
        };

        let authors_json = serde_json::to_string(&request.authors)
            .map_err(|e| RequestError::Database(e.to_string()))?;

        conn.execute(
            "INSERT INTO book_requests (id, title, authors, isbn13, isbn10, year, language, \
             requested_format, status, error_message, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?, ?)",
            params![
                request.id,
                request.title,
                authors_json,
                request.isbn13,
                request.isbn10,
                request.year,
                request.language,
                request.requested_format,
                request.status.as_str(),
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| RequestError::Database(e.to_string()))?;

        Ok(request)
    }

    fn get(&self, id: &str) -> Result<Option<BookRequest>, RequestError> {
        let conn = self.conn.lock().unwrap();

        let result = conn.query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM book_requests WHERE id = ?"),
            params![id],
            Self::row_to_request,
        );

        match result {
            Ok(request) => Ok(Some(request)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(RequestError::Database(e.to_string())),
        }
    }

    fn list(&self, filter: &RequestFilter) -> Result<Vec<BookRequest>, RequestError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, status_param) = match filter.status {
            Some(status) => ("WHERE status = ?", Some(status.as_str().to_string())),
            None => ("", None),
        };

        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM book_requests {where_clause} \
             ORDER BY created_at DESC LIMIT ? OFFSET ?"
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| RequestError::Database(e.to_string()))?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(status) = status_param {
            all_params.push(Box::new(status));
        }
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_request)
            .map_err(|e| RequestError::Database(e.to_string()))?;

        let mut requests = Vec::new();
        for row_result in rows {
            requests.push(row_result.map_err(|e| RequestError::Database(e.to_string()))?);
        }

        Ok(requests)
    }

    fn update_status(&self, id: &str, status: RequestStatus) -> Result<BookRequest, RequestError> {
        let conn = self.conn.lock().unwrap();

        let updated = conn
            .execute(
                "UPDATE book_requests SET status = ?, error_message = NULL, updated_at = ? \
                 WHERE id = ?",
                params![status.as_str(), Utc::now().to_rfc3339(), id],
            )
            .map_err(|e| RequestError::Database(e.to_string()))?;

        if updated == 0 {
            return Err(RequestError::NotFound(id.to_string()));
        }

        let result = conn.query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM book_requests WHERE id = ?"),
            params![id],
            Self::row_to_request,
        );

        result.map_err(|e| RequestError::Database(e.to_string()))
    }

    fn mark_problem(&self, id: &str, message: &str) -> Result<BookRequest, RequestError> {
        let conn = self.conn.lock().unwrap();

        let updated = conn
            .execute(
                "UPDATE book_requests SET status = 'download_problem', error_message = ?, \
                 updated_at = ? WHERE id = ?",
                params![message, Utc::now().to_rfc3339(), id],
            )
            .map_err(|e| RequestError::Database(e.to_string()))?;

        if updated == 0 {
            return Err(RequestError::NotFound(id.to_string()));
        }

        let result = conn.query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM book_requests WHERE id = ?"),
            params![id],
            Self::row_to_request,
        );

        result.map_err(|e| RequestError::Database(e.to_string()))
    }
}
