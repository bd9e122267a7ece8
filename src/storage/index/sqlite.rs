//! `SQLite` + FTS5 comment index.
//!
//! Field filters run against the `comments` table and free text against the
//! `comments_fts` virtual table, joined on `rowid`.

use crate::models::{CommentDocument, SearchHit, SearchQuery};
use crate::storage::sqlite::{
    acquire_lock, build_expr_clause, configure_connection, fts_match_expression, op_failed,
    open_connection, open_in_memory, record_operation_metrics, status_of,
};
use crate::storage::traits::CommentIndex;
use crate::{Error, Result};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::instrument;

const BACKEND: &str = "sqlite_index";

/// Default cap on the page size of a single search.
pub const DEFAULT_MAX_LIMIT: usize = 100;

/// `SQLite`-backed [`CommentIndex`] with BM25 ranking.
pub struct SqliteCommentIndex {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
    max_limit: usize,
}

impl SqliteCommentIndex {
    /// Opens (or creates) an index in a database file.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let index = Self {
            conn: Mutex::new(open_connection(&db_path)?),
            db_path: Some(db_path),
            max_limit: DEFAULT_MAX_LIMIT,
        };
        index.initialize()?;
        Ok(index)
    }

    /// Creates an in-memory index (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn in_memory() -> Result<Self> {
        let index = Self {
            conn: Mutex::new(open_in_memory()?),
            db_path: None,
            max_limit: DEFAULT_MAX_LIMIT,
        };
        index.initialize()?;
        Ok(index)
    }

    /// Sets the largest page size a search may request.
    #[must_use]
    pub const fn with_max_limit(mut self, max_limit: usize) -> Self {
        self.max_limit = max_limit;
        self
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        configure_connection(&conn)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS comments (
                rowid INTEGER PRIMARY KEY,
                id TEXT NOT NULL UNIQUE,
                course_id TEXT NOT NULL,
                giver_email TEXT NOT NULL,
                recipient_email TEXT NOT NULL,
                is_visible_to_receiver INTEGER NOT NULL,
                is_visible_to_instructor INTEGER NOT NULL,
                searchable_text TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_comments_course_id ON comments(course_id);
            CREATE INDEX IF NOT EXISTS idx_comments_giver_email ON comments(giver_email);
            CREATE INDEX IF NOT EXISTS idx_comments_recipient_email ON comments(recipient_email);",
        )
        .map_err(op_failed("create_comments_table"))?;

        // rowid of an FTS row always equals the rowid of its comments row
        conn.execute(
            "CREATE VIRTUAL TABLE IF NOT EXISTS comments_fts USING fts5(searchable_text)",
            [],
        )
        .map_err(op_failed("create_fts_table"))?;

        Ok(())
    }

    fn with_transaction<T>(conn: &Connection, f: impl FnOnce() -> Result<T>) -> Result<T> {
        conn.execute("BEGIN IMMEDIATE", [])
            .map_err(op_failed("begin_transaction"))?;
        let result = f();
        if result.is_ok() {
            conn.execute("COMMIT", [])
                .map_err(op_failed("commit_transaction"))?;
        } else {
            let _ = conn.execute("ROLLBACK", []);
        }
        result
    }
}

/// Maps a BM25 score (more negative is better) into `(0, 1)`.
#[allow(clippy::cast_possible_truncation)]
fn normalize_bm25(score: f64) -> f32 {
    let sigmoid = 1.0 / (1.0 + (0.5 * score).exp());
    sigmoid.clamp(0.0, 1.0) as f32
}

impl CommentIndex for SqliteCommentIndex {
    #[instrument(skip(self, document), fields(operation = "index", backend = BACKEND, document.id = %document.id))]
    fn index(&self, document: &CommentDocument) -> Result<()> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);
            Self::with_transaction(&conn, || {
                conn.execute(
                    "INSERT INTO comments (id, course_id, giver_email, recipient_email,
                        is_visible_to_receiver, is_visible_to_instructor, searchable_text)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(id) DO UPDATE SET
                        course_id = excluded.course_id,
                        giver_email = excluded.giver_email,
                        recipient_email = excluded.recipient_email,
                        is_visible_to_receiver = excluded.is_visible_to_receiver,
                        is_visible_to_instructor = excluded.is_visible_to_instructor,
                        searchable_text = excluded.searchable_text",
                    params![
                        document.id,
                        document.course_id,
                        document.giver_email,
                        document.recipient_email,
                        document.is_visible_to_receiver,
                        document.is_visible_to_instructor,
                        document.searchable_text,
                    ],
                )
                .map_err(op_failed("upsert_comment"))?;

                let rowid: i64 = conn
                    .query_row(
                        "SELECT rowid FROM comments WHERE id = ?1",
                        params![document.id],
                        |row| row.get(0),
                    )
                    .map_err(op_failed("lookup_comment_rowid"))?;

                conn.execute("DELETE FROM comments_fts WHERE rowid = ?1", params![rowid])
                    .map_err(op_failed("delete_fts_row"))?;
                conn.execute(
                    "INSERT INTO comments_fts (rowid, searchable_text) VALUES (?1, ?2)",
                    params![rowid, document.searchable_text],
                )
                .map_err(op_failed("insert_fts_row"))?;
                Ok(())
            })
        })();

        record_operation_metrics(BACKEND, "index", start, status_of(&result));
        result
    }

    #[instrument(skip(self), fields(operation = "remove", backend = BACKEND, document.id = %id))]
    fn remove(&self, id: &str) -> Result<bool> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);
            Self::with_transaction(&conn, || {
                let rowid: Option<i64> = conn
                    .query_row(
                        "SELECT rowid FROM comments WHERE id = ?1",
                        params![id],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(op_failed("lookup_comment_rowid"))?;

                let Some(rowid) = rowid else {
                    return Ok(false);
                };
                conn.execute("DELETE FROM comments_fts WHERE rowid = ?1", params![rowid])
                    .map_err(op_failed("delete_fts_row"))?;
                conn.execute("DELETE FROM comments WHERE rowid = ?1", params![rowid])
                    .map_err(op_failed("delete_comment"))?;
                Ok(true)
            })
        })();

        record_operation_metrics(BACKEND, "remove", start, status_of(&result));
        result
    }

    #[instrument(
        skip(self, query),
        fields(operation = "search", backend = BACKEND, query = %query, limit = query.options.limit)
    )]
    fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        let start = Instant::now();
        let result = (|| {
            let limit = query.options.limit.min(self.max_limit);
            if limit == 0 {
                return Ok(Vec::new());
            }
            // SQLite reads LIMIT/OFFSET as signed 64-bit integers
            let limit = i64::try_from(limit).unwrap_or(i64::MAX);
            let offset = i64::try_from(query.options.offset).unwrap_or(i64::MAX);

            // A plain text part joins the FTS table for ranking; anything
            // else is evaluated entirely as a filter.
            let (sql, params) = match fts_match_expression(query.text_query()) {
                Some(matcher) => {
                    let (clause, filter_params, _) = build_expr_clause(&query.visibility, 2);
                    let sql = format!(
                        "SELECT c.id, bm25(comments_fts) AS score
                         FROM comments_fts
                         JOIN comments c ON c.rowid = comments_fts.rowid
                         WHERE comments_fts MATCH ?1 AND ({clause})
                         ORDER BY score, c.id
                         LIMIT {limit} OFFSET {offset}"
                    );
                    (sql, std::iter::once(matcher).chain(filter_params).collect())
                },
                None => {
                    let (clause, filter_params, _) = build_expr_clause(&query.filter(), 1);
                    let sql = format!(
                        "SELECT c.id, 0.0 AS score
                         FROM comments c
                         WHERE {clause}
                         ORDER BY c.id
                         LIMIT {limit} OFFSET {offset}"
                    );
                    (sql, filter_params)
                },
            };

            let conn = acquire_lock(&self.conn);
            let mut stmt = conn.prepare(&sql).map_err(op_failed("prepare_search"))?;
            let rows = stmt
                .query_map(params_from_iter(params.iter()), |row| {
                    let id: String = row.get(0)?;
                    let score: f64 = row.get(1)?;
                    Ok((id, score))
                })
                .map_err(op_failed("execute_search"))?;

            rows.map(|row| {
                row.map(|(document_id, score)| SearchHit {
                    document_id,
                    score: normalize_bm25(score),
                })
                .map_err(|e| Error::OperationFailed {
                    operation: "read_search_row".to_string(),
                    cause: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()
        })();

        if let Ok(ref hits) = result {
            tracing::debug!(hits = hits.len(), "comment search completed");
        }
        record_operation_metrics(BACKEND, "search", start, status_of(&result));
        result
    }
}
