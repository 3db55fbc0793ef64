use anyhow::{Context, Result};
use rusqlite::types::{Type, Value as SqlValue};
use rusqlite::{Connection, OptionalExtension, Row, params_from_iter};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use taskboard_api::db::Built;
use taskboard_api::db::migrations::MIGRATIONS;
use taskboard_api::{
    AttachmentResponse, BoardResponse, BoardRole, CommentResponse, InvitationResponse,
    InvitationStatus, InvitationTarget, LabelResponse, ListResponse, MemberResponse,
    NotificationKind, NotificationResponse, TaskPriority, TaskResponse, TeamResponse, TeamRole,
    TimeEntryResponse, UserResponse,
};

/// Shared database state
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
    data_dir: PathBuf,
}

impl Db {
    /// Lock the connection, recovering from a poisoned mutex.
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open an in-memory database with attachments stored under `data_dir`.
    pub fn open_in_memory(data_dir: &Path) -> Result<Self> {
        let conn = Connection::open_in_memory().context("opening in-memory SQLite")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            data_dir: data_dir.to_path_buf(),
        })
    }

    /// Directory holding uploaded attachment bytes.
    pub fn attachments_dir(&self) -> PathBuf {
        self.data_dir.join("attachments")
    }

    /// Write an attachment to disk under its storage key.
    pub async fn write_attachment(&self, storage_key: &str, bytes: &[u8]) -> Result<()> {
        let dir = self.attachments_dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .context("creating attachments directory")?;
        tokio::fs::write(dir.join(storage_key), bytes)
            .await
            .context("writing attachment")
    }

    /// Read an attachment from disk without blocking the runtime.
    pub async fn read_attachment(&self, storage_key: &str) -> Result<Vec<u8>> {
        tokio::fs::read(self.attachments_dir().join(storage_key))
            .await
            .context("reading attachment")
    }

    /// Best-effort removal of attachment files whose rows are gone.
    pub async fn remove_attachments(&self, storage_keys: &[String]) {
        let dir = self.attachments_dir();
        for key in storage_keys {
            match tokio::fs::remove_file(dir.join(key)).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("failed to remove attachment {key}: {e}"),
            }
        }
    }
}

/// Initialize the database: open connection, enable WAL, run migrations
pub fn init_db(data_dir: &Path) -> Result<Db> {
    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join("taskboard.db");
    let conn = Connection::open(&db_path).context("opening SQLite database")?;

    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;

    run_migrations(&conn)?;

    Ok(Db {
        conn: Arc::new(Mutex::new(conn)),
        data_dir: data_dir.to_path_buf(),
    })
}

fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for &(name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?1",
            [name],
            |row| row.get(0),
        )?;

        if !already_applied {
            conn.execute_batch(sql)
                .with_context(|| format!("running migration {name}"))?;
            conn.execute("INSERT INTO _migrations (name) VALUES (?1)", [name])?;
            tracing::info!("Applied migration: {name}");
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// sea-query → rusqlite bridging
// ---------------------------------------------------------------------------

/// Convert sea-query bind values into rusqlite values.
pub fn sql_values(values: &sea_query::Values) -> Vec<SqlValue> {
    values.0.iter().map(to_sql_value).collect()
}

fn to_sql_value(v: &sea_query::Value) -> SqlValue {
    use sea_query::Value;
    match v {
        Value::Bool(Some(b)) => SqlValue::Integer(i64::from(*b)),
        Value::TinyInt(Some(n)) => SqlValue::Integer(i64::from(*n)),
        Value::SmallInt(Some(n)) => SqlValue::Integer(i64::from(*n)),
        Value::Int(Some(n)) => SqlValue::Integer(i64::from(*n)),
        Value::BigInt(Some(n)) => SqlValue::Integer(*n),
        Value::TinyUnsigned(Some(n)) => SqlValue::Integer(i64::from(*n)),
        Value::SmallUnsigned(Some(n)) => SqlValue::Integer(i64::from(*n)),
        Value::Unsigned(Some(n)) => SqlValue::Integer(i64::from(*n)),
        Value::BigUnsigned(Some(n)) => SqlValue::Integer(i64::try_from(*n).unwrap_or(i64::MAX)),
        Value::Float(Some(f)) => SqlValue::Real(f64::from(*f)),
        Value::Double(Some(f)) => SqlValue::Real(*f),
        Value::String(Some(s)) => SqlValue::Text(s.as_ref().clone()),
        Value::Char(Some(c)) => SqlValue::Text(c.to_string()),
        Value::Bytes(Some(b)) => SqlValue::Blob(b.as_ref().clone()),
        _ => SqlValue::Null,
    }
}

/// Execute a built statement; returns the number of changed rows.
pub fn exec(conn: &Connection, (sql, values): Built) -> rusqlite::Result<usize> {
    conn.execute(&sql, params_from_iter(sql_values(&values)))
}

/// First row mapped by `f`, or `None`.
pub fn query_opt<T>(
    conn: &Connection,
    (sql, values): Built,
    f: impl FnOnce(&Row<'_>) -> rusqlite::Result<T>,
) -> rusqlite::Result<Option<T>> {
    conn.query_row(&sql, params_from_iter(sql_values(&values)), f)
        .optional()
}

/// All rows mapped by `f`.
pub fn query_all<T>(
    conn: &Connection,
    (sql, values): Built,
    f: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
) -> rusqlite::Result<Vec<T>> {
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(sql_values(&values)), f)?;
    let out: rusqlite::Result<Vec<T>> = rows.collect();
    out
}

/// Single integer result (`COUNT(*)`, `SUM(..)`).
pub fn query_i64(conn: &Connection, built: Built) -> rusqlite::Result<i64> {
    Ok(query_opt(conn, built, |row| row.get(0))?.unwrap_or(0))
}

/// Column 0 of every row as a string.
pub fn query_strings(conn: &Connection, built: Built) -> rusqlite::Result<Vec<String>> {
    query_all(conn, built, |row| row.get(0))
}

/// Whether a statement failed on a UNIQUE / PRIMARY KEY / CHECK constraint.
pub fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// ---------------------------------------------------------------------------
// Row mappers (column order documented on each builder)
// ---------------------------------------------------------------------------

fn parse_col<T>(row: &Row<'_>, idx: usize, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unexpected enum value {raw:?}").into(),
        )
    })
}

pub fn board_role_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<BoardRole>> {
    let raw: Option<String> = row.get(idx)?;
    Ok(raw.as_deref().and_then(BoardRole::parse))
}

pub fn team_role_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<TeamRole>> {
    let raw: Option<String> = row.get(idx)?;
    Ok(raw.as_deref().and_then(TeamRole::parse))
}

pub fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserResponse> {
    Ok(UserResponse {
        id: row.get(0)?,
        email: row.get(1)?,
        nickname: row.get(2)?,
        avatar_url: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub fn team_from_row(row: &Row<'_>) -> rusqlite::Result<TeamResponse> {
    Ok(TeamResponse {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_by: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub fn member_from_row(row: &Row<'_>) -> rusqlite::Result<MemberResponse> {
    Ok(MemberResponse {
        user_id: row.get(0)?,
        nickname: row.get(1)?,
        email: row.get(2)?,
        role: row.get(3)?,
        joined_at: row.get(4)?,
    })
}

pub fn board_from_row(row: &Row<'_>) -> rusqlite::Result<BoardResponse> {
    Ok(BoardResponse {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        owner_id: row.get(3)?,
        team_id: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

pub fn list_from_row(row: &Row<'_>) -> rusqlite::Result<ListResponse> {
    Ok(ListResponse {
        id: row.get(0)?,
        board_id: row.get(1)?,
        title: row.get(2)?,
        position: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Task row without labels; callers fill `label_ids`.
pub fn task_from_row(row: &Row<'_>) -> rusqlite::Result<TaskResponse> {
    Ok(TaskResponse {
        id: row.get(0)?,
        board_id: row.get(1)?,
        list_id: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        position: row.get(5)?,
        priority: parse_col(row, 6, TaskPriority::parse)?,
        due_date: row.get(7)?,
        assignee_id: row.get(8)?,
        assignee_nickname: row.get(9)?,
        created_by: row.get(10)?,
        completed: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
        label_ids: Vec::new(),
    })
}

pub fn label_from_row(row: &Row<'_>) -> rusqlite::Result<LabelResponse> {
    Ok(LabelResponse {
        id: row.get(0)?,
        board_id: row.get(1)?,
        name: row.get(2)?,
        color: row.get(3)?,
    })
}

pub fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<CommentResponse> {
    Ok(CommentResponse {
        id: row.get(0)?,
        task_id: row.get(1)?,
        author_id: row.get(2)?,
        author_nickname: row.get(3)?,
        body: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Attachment metadata plus its storage key (column 7).
pub fn attachment_from_row(row: &Row<'_>) -> rusqlite::Result<(AttachmentResponse, String)> {
    Ok((
        AttachmentResponse {
            id: row.get(0)?,
            task_id: row.get(1)?,
            uploaded_by: row.get(2)?,
            filename: row.get(3)?,
            content_type: row.get(4)?,
            size_bytes: row.get(5)?,
            created_at: row.get(6)?,
        },
        row.get(7)?,
    ))
}

pub fn time_entry_from_row(row: &Row<'_>) -> rusqlite::Result<TimeEntryResponse> {
    let ended_at: Option<String> = row.get(4)?;
    Ok(TimeEntryResponse {
        id: row.get(0)?,
        task_id: row.get(1)?,
        user_id: row.get(2)?,
        started_at: row.get(3)?,
        running: ended_at.is_none(),
        ended_at,
        duration_seconds: row.get(5)?,
        note: row.get(6)?,
    })
}

pub fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<NotificationResponse> {
    Ok(NotificationResponse {
        id: row.get(0)?,
        kind: parse_col(row, 1, NotificationKind::parse)?,
        message: row.get(2)?,
        board_id: row.get(3)?,
        task_id: row.get(4)?,
        actor_id: row.get(5)?,
        is_read: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub fn invitation_from_row(row: &Row<'_>) -> rusqlite::Result<InvitationResponse> {
    Ok(InvitationResponse {
        id: row.get(0)?,
        target_type: parse_col(row, 1, InvitationTarget::parse)?,
        target_id: row.get(2)?,
        target_name: row.get(3)?,
        email: row.get(4)?,
        role: row.get(5)?,
        invited_by: row.get(6)?,
        invited_by_nickname: row.get(7)?,
        status: parse_col(row, 8, InvitationStatus::parse)?,
        created_at: row.get(9)?,
        expires_at: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskboard_api::db;

    fn test_db() -> (Db, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Db::open_in_memory(dir.path()).expect("open db");
        (db, dir)
    }

    #[test]
    fn migrations_apply_once() {
        let (db, _dir) = test_db();
        let conn = db.conn();
        run_migrations(&conn).expect("second run is a no-op");
        let applied: i64 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |row| row.get(0))
            .expect("count");
        assert_eq!(applied, MIGRATIONS.len() as i64);
    }

    #[test]
    fn built_statements_round_trip_through_sqlite() {
        let (db, _dir) = test_db();
        let conn = db.conn();
        exec(&conn, db::users::insert("u1", "a@x.io", "alice", "hash")).expect("insert");
        let user = query_opt(&conn, db::users::get_by_id("u1"), user_from_row)
            .expect("query")
            .expect("row");
        assert_eq!(user.nickname, "alice");
        assert_eq!(user.avatar_url, None);

        let taken = query_i64(&conn, db::users::nickname_count("ALICE", None)).expect("count");
        assert_eq!(taken, 1);

        let err = exec(&conn, db::users::insert("u2", "a@x.io", "bob", "hash"))
            .expect_err("duplicate email");
        assert!(is_constraint_violation(&err));
    }

    #[test]
    fn foreign_keys_cascade() {
        let (db, _dir) = test_db();
        let conn = db.conn();
        exec(&conn, db::users::insert("u1", "a@x.io", "alice", "hash")).expect("user");
        exec(&conn, db::boards::insert("b1", "Board", None, "u1", None)).expect("board");
        exec(&conn, db::lists::insert("l1", "b1", "Todo", 0)).expect("list");
        exec(&conn, db::users::delete("u1")).expect("delete user");
        let lists = query_i64(&conn, db::lists::count("b1")).expect("count");
        assert_eq!(lists, 0);
    }

    #[tokio::test]
    async fn attachment_files_are_written_and_removed() {
        let (db, _dir) = test_db();
        db.write_attachment("k1", b"hello").await.expect("write");
        assert_eq!(db.read_attachment("k1").await.expect("read"), b"hello");
        db.remove_attachments(&["k1".to_string(), "missing".to_string()])
            .await;
        assert!(db.read_attachment("k1").await.is_err());
    }
}
