//! Comment query builders.

use sea_query::{Alias, Asterisk, Expr, Func, Order, Query, SelectStatement, SqliteQueryBuilder};

use super::tables::{Comments, Users};
use super::{Built, now_expr};

/// Columns: id, task_id, author_id, author_nickname, body, created_at,
/// updated_at.
fn comment_select() -> SelectStatement {
    Query::select()
        .column((Comments::Table, Comments::Id))
        .column((Comments::Table, Comments::TaskId))
        .column((Comments::Table, Comments::AuthorId))
        .expr_as(
            Expr::col((Users::Table, Users::Nickname)),
            Alias::new("author_nickname"),
        )
        .column((Comments::Table, Comments::Body))
        .column((Comments::Table, Comments::CreatedAt))
        .column((Comments::Table, Comments::UpdatedAt))
        .from(Comments::Table)
        .inner_join(
            Users::Table,
            Expr::col((Users::Table, Users::Id)).equals((Comments::Table, Comments::AuthorId)),
        )
        .to_owned()
}

pub fn insert(id: &str, task_id: &str, author_id: &str, body: &str) -> Built {
    Query::insert()
        .into_table(Comments::Table)
        .columns([Comments::Id, Comments::TaskId, Comments::AuthorId, Comments::Body])
        .values_panic([id.into(), task_id.into(), author_id.into(), body.into()])
        .build(SqliteQueryBuilder)
}

pub fn get_by_id(id: &str) -> Built {
    comment_select()
        .and_where(Expr::col((Comments::Table, Comments::Id)).eq(id))
        .build(SqliteQueryBuilder)
}

/// Oldest first.
pub fn list_by_task(task_id: &str) -> Built {
    comment_select()
        .and_where(Expr::col((Comments::Table, Comments::TaskId)).eq(task_id))
        .order_by((Comments::Table, Comments::CreatedAt), Order::Asc)
        .order_by_expr(Expr::cust("\"comments\".rowid"), Order::Asc)
        .build(SqliteQueryBuilder)
}

pub fn count_for_task(task_id: &str) -> Built {
    Query::select()
        .expr_as(Func::count(Expr::col(Asterisk)), Alias::new("count"))
        .from(Comments::Table)
        .and_where(Expr::col(Comments::TaskId).eq(task_id))
        .build(SqliteQueryBuilder)
}

pub fn update_body(id: &str, body: &str) -> Built {
    Query::update()
        .table(Comments::Table)
        .value(Comments::Body, body)
        .value(Comments::UpdatedAt, now_expr())
        .and_where(Expr::col(Comments::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn delete(id: &str) -> Built {
    Query::delete()
        .from_table(Comments::Table)
        .and_where(Expr::col(Comments::Id).eq(id))
        .build(SqliteQueryBuilder)
}
