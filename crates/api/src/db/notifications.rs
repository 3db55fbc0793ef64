//! Notification query builders. Every read or write is scoped to the
//! recipient.

use sea_query::{Alias, Asterisk, Expr, Func, Order, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::Notifications;

/// Fields of a stored notification.
#[derive(Debug, Clone, Copy)]
pub struct NewNotification<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub kind: &'a str,
    pub message: &'a str,
    pub board_id: Option<&'a str>,
    pub task_id: Option<&'a str>,
    pub actor_id: Option<&'a str>,
}

pub fn insert(n: &NewNotification<'_>) -> Built {
    Query::insert()
        .into_table(Notifications::Table)
        .columns([
            Notifications::Id,
            Notifications::UserId,
            Notifications::Kind,
            Notifications::Message,
            Notifications::BoardId,
            Notifications::TaskId,
            Notifications::ActorId,
        ])
        .values_panic([
            n.id.into(),
            n.user_id.into(),
            n.kind.into(),
            n.message.into(),
            n.board_id.map(|s| s.to_string()).into(),
            n.task_id.map(|s| s.to_string()).into(),
            n.actor_id.map(|s| s.to_string()).into(),
        ])
        .build(SqliteQueryBuilder)
}

/// Columns: id, kind, message, board_id, task_id, actor_id, is_read,
/// created_at. Newest first.
pub fn list_for_user(user_id: &str, unread_only: bool, limit: u64) -> Built {
    let mut q = Query::select();
    q.columns([
        Notifications::Id,
        Notifications::Kind,
        Notifications::Message,
        Notifications::BoardId,
        Notifications::TaskId,
        Notifications::ActorId,
        Notifications::IsRead,
        Notifications::CreatedAt,
    ])
    .from(Notifications::Table)
    .and_where(Expr::col(Notifications::UserId).eq(user_id));
    if unread_only {
        q.and_where(Expr::col(Notifications::IsRead).eq(false));
    }
    q.order_by(Notifications::CreatedAt, Order::Desc)
        .order_by_expr(Expr::cust("rowid"), Order::Desc)
        .limit(limit)
        .build(SqliteQueryBuilder)
}

pub fn unread_count(user_id: &str) -> Built {
    Query::select()
        .expr_as(Func::count(Expr::col(Asterisk)), Alias::new("count"))
        .from(Notifications::Table)
        .and_where(Expr::col(Notifications::UserId).eq(user_id))
        .and_where(Expr::col(Notifications::IsRead).eq(false))
        .build(SqliteQueryBuilder)
}

pub fn mark_read(id: &str, user_id: &str) -> Built {
    Query::update()
        .table(Notifications::Table)
        .value(Notifications::IsRead, true)
        .and_where(Expr::col(Notifications::Id).eq(id))
        .and_where(Expr::col(Notifications::UserId).eq(user_id))
        .build(SqliteQueryBuilder)
}

pub fn mark_all_read(user_id: &str) -> Built {
    Query::update()
        .table(Notifications::Table)
        .value(Notifications::IsRead, true)
        .and_where(Expr::col(Notifications::UserId).eq(user_id))
        .and_where(Expr::col(Notifications::IsRead).eq(false))
        .build(SqliteQueryBuilder)
}

pub fn delete(id: &str, user_id: &str) -> Built {
    Query::delete()
        .from_table(Notifications::Table)
        .and_where(Expr::col(Notifications::Id).eq(id))
        .and_where(Expr::col(Notifications::UserId).eq(user_id))
        .build(SqliteQueryBuilder)
}
