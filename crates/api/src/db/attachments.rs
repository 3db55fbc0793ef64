//! Attachment metadata query builders. File bytes live on disk under the
//! `storage_key`.

use sea_query::{Expr, Order, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::{Attachments, Boards, Tasks};

/// Fields of a stored upload.
#[derive(Debug, Clone, Copy)]
pub struct NewAttachment<'a> {
    pub id: &'a str,
    pub task_id: &'a str,
    pub uploaded_by: &'a str,
    pub filename: &'a str,
    pub content_type: &'a str,
    pub size_bytes: i64,
    pub storage_key: &'a str,
}

pub fn insert(a: &NewAttachment<'_>) -> Built {
    Query::insert()
        .into_table(Attachments::Table)
        .columns([
            Attachments::Id,
            Attachments::TaskId,
            Attachments::UploadedBy,
            Attachments::Filename,
            Attachments::ContentType,
            Attachments::SizeBytes,
            Attachments::StorageKey,
        ])
        .values_panic([
            a.id.into(),
            a.task_id.into(),
            a.uploaded_by.into(),
            a.filename.into(),
            a.content_type.into(),
            a.size_bytes.into(),
            a.storage_key.into(),
        ])
        .build(SqliteQueryBuilder)
}

/// Columns: id, task_id, uploaded_by, filename, content_type, size_bytes,
/// created_at, storage_key.
pub fn get_by_id(id: &str) -> Built {
    Query::select()
        .columns([
            Attachments::Id,
            Attachments::TaskId,
            Attachments::UploadedBy,
            Attachments::Filename,
            Attachments::ContentType,
            Attachments::SizeBytes,
            Attachments::CreatedAt,
            Attachments::StorageKey,
        ])
        .from(Attachments::Table)
        .and_where(Expr::col(Attachments::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// Same columns as [`get_by_id`], newest first.
pub fn list_by_task(task_id: &str) -> Built {
    Query::select()
        .columns([
            Attachments::Id,
            Attachments::TaskId,
            Attachments::UploadedBy,
            Attachments::Filename,
            Attachments::ContentType,
            Attachments::SizeBytes,
            Attachments::CreatedAt,
            Attachments::StorageKey,
        ])
        .from(Attachments::Table)
        .and_where(Expr::col(Attachments::TaskId).eq(task_id))
        .order_by(Attachments::CreatedAt, Order::Desc)
        .order_by(Attachments::Id, Order::Asc)
        .build(SqliteQueryBuilder)
}

pub fn delete(id: &str) -> Built {
    Query::delete()
        .from_table(Attachments::Table)
        .and_where(Expr::col(Attachments::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// Storage keys of a task's attachments.
pub fn storage_keys_for_task(task_id: &str) -> Built {
    Query::select()
        .column(Attachments::StorageKey)
        .from(Attachments::Table)
        .and_where(Expr::col(Attachments::TaskId).eq(task_id))
        .build(SqliteQueryBuilder)
}

/// Storage keys of every attachment on a list's tasks.
pub fn storage_keys_for_list(list_id: &str) -> Built {
    Query::select()
        .column((Attachments::Table, Attachments::StorageKey))
        .from(Attachments::Table)
        .inner_join(
            Tasks::Table,
            Expr::col((Tasks::Table, Tasks::Id)).equals((Attachments::Table, Attachments::TaskId)),
        )
        .and_where(Expr::col((Tasks::Table, Tasks::ListId)).eq(list_id))
        .build(SqliteQueryBuilder)
}

/// Storage keys of every attachment on a board.
pub fn storage_keys_for_board(board_id: &str) -> Built {
    Query::select()
        .column((Attachments::Table, Attachments::StorageKey))
        .from(Attachments::Table)
        .inner_join(
            Tasks::Table,
            Expr::col((Tasks::Table, Tasks::Id)).equals((Attachments::Table, Attachments::TaskId)),
        )
        .and_where(Expr::col((Tasks::Table, Tasks::BoardId)).eq(board_id))
        .build(SqliteQueryBuilder)
}

/// Storage keys of every attachment on boards owned by the user.
pub fn storage_keys_for_owner(user_id: &str) -> Built {
    Query::select()
        .column((Attachments::Table, Attachments::StorageKey))
        .from(Attachments::Table)
        .inner_join(
            Tasks::Table,
            Expr::col((Tasks::Table, Tasks::Id)).equals((Attachments::Table, Attachments::TaskId)),
        )
        .inner_join(
            Boards::Table,
            Expr::col((Boards::Table, Boards::Id)).equals((Tasks::Table, Tasks::BoardId)),
        )
        .and_where(Expr::col((Boards::Table, Boards::OwnerId)).eq(user_id))
        .build(SqliteQueryBuilder)
}
