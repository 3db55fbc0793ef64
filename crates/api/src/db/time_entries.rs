//! Time entry query builders.

use sea_query::{
    Alias, Expr, Func, Order, Query, SelectStatement, SimpleExpr, SqliteQueryBuilder,
};

use super::Built;
use super::tables::TimeEntries;

/// Columns: id, task_id, user_id, started_at, ended_at, duration_seconds,
/// note.
fn entry_select() -> SelectStatement {
    Query::select()
        .columns([
            TimeEntries::Id,
            TimeEntries::TaskId,
            TimeEntries::UserId,
            TimeEntries::StartedAt,
            TimeEntries::EndedAt,
            TimeEntries::DurationSeconds,
            TimeEntries::Note,
        ])
        .from(TimeEntries::Table)
        .to_owned()
}

/// Start a running entry (`ended_at` NULL).
pub fn insert_running(
    id: &str,
    task_id: &str,
    user_id: &str,
    started_at: &str,
    note: Option<&str>,
) -> Built {
    Query::insert()
        .into_table(TimeEntries::Table)
        .columns([
            TimeEntries::Id,
            TimeEntries::TaskId,
            TimeEntries::UserId,
            TimeEntries::StartedAt,
            TimeEntries::Note,
        ])
        .values_panic([
            id.into(),
            task_id.into(),
            user_id.into(),
            started_at.into(),
            note.map(|s| s.to_string()).into(),
        ])
        .build(SqliteQueryBuilder)
}

/// Record a finished entry.
#[allow(clippy::too_many_arguments)]
pub fn insert_finished(
    id: &str,
    task_id: &str,
    user_id: &str,
    started_at: &str,
    ended_at: &str,
    duration_seconds: i64,
    note: Option<&str>,
) -> Built {
    Query::insert()
        .into_table(TimeEntries::Table)
        .columns([
            TimeEntries::Id,
            TimeEntries::TaskId,
            TimeEntries::UserId,
            TimeEntries::StartedAt,
            TimeEntries::EndedAt,
            TimeEntries::DurationSeconds,
            TimeEntries::Note,
        ])
        .values_panic([
            id.into(),
            task_id.into(),
            user_id.into(),
            started_at.into(),
            ended_at.into(),
            duration_seconds.into(),
            note.map(|s| s.to_string()).into(),
        ])
        .build(SqliteQueryBuilder)
}

pub fn get_by_id(id: &str) -> Built {
    entry_select()
        .and_where(Expr::col(TimeEntries::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// The user's running entry, if any.
pub fn running_for_user(user_id: &str) -> Built {
    entry_select()
        .and_where(Expr::col(TimeEntries::UserId).eq(user_id))
        .and_where(Expr::col(TimeEntries::EndedAt).is_null())
        .limit(1)
        .build(SqliteQueryBuilder)
}

/// Close a running entry. Matches nothing if it was already stopped.
pub fn stop(id: &str, ended_at: &str, duration_seconds: i64) -> Built {
    Query::update()
        .table(TimeEntries::Table)
        .value(TimeEntries::EndedAt, ended_at)
        .value(TimeEntries::DurationSeconds, duration_seconds)
        .and_where(Expr::col(TimeEntries::Id).eq(id))
        .and_where(Expr::col(TimeEntries::EndedAt).is_null())
        .build(SqliteQueryBuilder)
}

/// Newest first.
pub fn list_by_task(task_id: &str) -> Built {
    entry_select()
        .and_where(Expr::col(TimeEntries::TaskId).eq(task_id))
        .order_by(TimeEntries::StartedAt, Order::Desc)
        .build(SqliteQueryBuilder)
}

/// Sum of finished entries' durations (0 when none).
pub fn total_for_task(task_id: &str) -> Built {
    Query::select()
        .expr_as(
            Func::coalesce([
                SimpleExpr::from(Func::sum(Expr::col(TimeEntries::DurationSeconds))),
                Expr::val(0).into(),
            ]),
            Alias::new("total"),
        )
        .from(TimeEntries::Table)
        .and_where(Expr::col(TimeEntries::TaskId).eq(task_id))
        .and_where(Expr::col(TimeEntries::EndedAt).is_not_null())
        .build(SqliteQueryBuilder)
}

pub fn delete(id: &str) -> Built {
    Query::delete()
        .from_table(TimeEntries::Table)
        .and_where(Expr::col(TimeEntries::Id).eq(id))
        .build(SqliteQueryBuilder)
}
