//! List (board column) query builders.

use sea_query::{Alias, Asterisk, Expr, Func, Order, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::Lists;

/// Columns: id, board_id, title, position, created_at.
fn list_columns(q: &mut sea_query::SelectStatement) -> &mut sea_query::SelectStatement {
    q.columns([
        Lists::Id,
        Lists::BoardId,
        Lists::Title,
        Lists::Position,
        Lists::CreatedAt,
    ])
}

pub fn insert(id: &str, board_id: &str, title: &str, position: i64) -> Built {
    Query::insert()
        .into_table(Lists::Table)
        .columns([Lists::Id, Lists::BoardId, Lists::Title, Lists::Position])
        .values_panic([id.into(), board_id.into(), title.into(), position.into()])
        .build(SqliteQueryBuilder)
}

pub fn get_by_id(id: &str) -> Built {
    let mut q = Query::select().to_owned();
    list_columns(&mut q);
    q.from(Lists::Table)
        .and_where(Expr::col(Lists::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// All lists of a board in display order.
pub fn list_by_board(board_id: &str) -> Built {
    let mut q = Query::select().to_owned();
    list_columns(&mut q);
    q.from(Lists::Table)
        .and_where(Expr::col(Lists::BoardId).eq(board_id))
        .order_by(Lists::Position, Order::Asc)
        .build(SqliteQueryBuilder)
}

pub fn count(board_id: &str) -> Built {
    Query::select()
        .expr_as(Func::count(Expr::col(Asterisk)), Alias::new("count"))
        .from(Lists::Table)
        .and_where(Expr::col(Lists::BoardId).eq(board_id))
        .build(SqliteQueryBuilder)
}

pub fn update_title(id: &str, title: &str) -> Built {
    Query::update()
        .table(Lists::Table)
        .value(Lists::Title, title)
        .and_where(Expr::col(Lists::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn set_position(id: &str, position: i64) -> Built {
    Query::update()
        .table(Lists::Table)
        .value(Lists::Position, position)
        .and_where(Expr::col(Lists::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// Add `delta` to the position of every list in `[from, to]` (open-ended
/// when `to` is `None`).
pub fn shift(board_id: &str, from: i64, to: Option<i64>, delta: i64) -> Built {
    let mut q = Query::update();
    q.table(Lists::Table)
        .value(Lists::Position, Expr::col(Lists::Position).add(delta))
        .and_where(Expr::col(Lists::BoardId).eq(board_id))
        .and_where(Expr::col(Lists::Position).gte(from));
    if let Some(to) = to {
        q.and_where(Expr::col(Lists::Position).lte(to));
    }
    q.build(SqliteQueryBuilder)
}

/// DELETE a list; its tasks cascade.
pub fn delete(id: &str) -> Built {
    Query::delete()
        .from_table(Lists::Table)
        .and_where(Expr::col(Lists::Id).eq(id))
        .build(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_is_bounded_when_asked() {
        let (sql, values) = shift("b1", 2, Some(4), -1);
        assert!(sql.contains("\"position\" = \"position\" + ?"), "{sql}");
        assert!(sql.contains("\"position\" <= ?"), "{sql}");
        assert_eq!(values.0.len(), 4);

        let (sql, values) = shift("b1", 2, None, 1);
        assert!(!sql.contains("<="), "{sql}");
        assert_eq!(values.0.len(), 3);
    }
}
