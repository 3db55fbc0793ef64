//! Label query builders.

use sea_query::{Alias, Asterisk, Expr, Func, Order, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::{Labels, TaskLabels};

/// Columns: id, board_id, name, color.
fn label_columns(q: &mut sea_query::SelectStatement) -> &mut sea_query::SelectStatement {
    q.column((Labels::Table, Labels::Id))
        .column((Labels::Table, Labels::BoardId))
        .column((Labels::Table, Labels::Name))
        .column((Labels::Table, Labels::Color))
}

pub fn insert(id: &str, board_id: &str, name: &str, color: &str) -> Built {
    Query::insert()
        .into_table(Labels::Table)
        .columns([Labels::Id, Labels::BoardId, Labels::Name, Labels::Color])
        .values_panic([id.into(), board_id.into(), name.into(), color.into()])
        .build(SqliteQueryBuilder)
}

pub fn get_by_id(id: &str) -> Built {
    let mut q = Query::select().to_owned();
    label_columns(&mut q);
    q.from(Labels::Table)
        .and_where(Expr::col((Labels::Table, Labels::Id)).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn list_by_board(board_id: &str) -> Built {
    let mut q = Query::select().to_owned();
    label_columns(&mut q);
    q.from(Labels::Table)
        .and_where(Expr::col((Labels::Table, Labels::BoardId)).eq(board_id))
        .order_by((Labels::Table, Labels::Name), Order::Asc)
        .build(SqliteQueryBuilder)
}

/// Labels attached to a task.
pub fn list_for_task(task_id: &str) -> Built {
    let mut q = Query::select().to_owned();
    label_columns(&mut q);
    q.from(Labels::Table)
        .inner_join(
            TaskLabels::Table,
            Expr::col((TaskLabels::Table, TaskLabels::LabelId)).equals((Labels::Table, Labels::Id)),
        )
        .and_where(Expr::col((TaskLabels::Table, TaskLabels::TaskId)).eq(task_id))
        .order_by((Labels::Table, Labels::Name), Order::Asc)
        .build(SqliteQueryBuilder)
}

/// Count labels on the board with this name, other than `exclude_id`.
pub fn name_count(board_id: &str, name: &str, exclude_id: Option<&str>) -> Built {
    let mut q = Query::select();
    q.expr_as(Func::count(Expr::col(Asterisk)), Alias::new("count"))
        .from(Labels::Table)
        .and_where(Expr::col(Labels::BoardId).eq(board_id))
        .and_where(Expr::col(Labels::Name).eq(name));
    if let Some(id) = exclude_id {
        q.and_where(Expr::col(Labels::Id).ne(id));
    }
    q.build(SqliteQueryBuilder)
}

pub fn update_name(id: &str, name: &str) -> Built {
    Query::update()
        .table(Labels::Table)
        .value(Labels::Name, name)
        .and_where(Expr::col(Labels::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn update_color(id: &str, color: &str) -> Built {
    Query::update()
        .table(Labels::Table)
        .value(Labels::Color, color)
        .and_where(Expr::col(Labels::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn delete(id: &str) -> Built {
    Query::delete()
        .from_table(Labels::Table)
        .and_where(Expr::col(Labels::Id).eq(id))
        .build(SqliteQueryBuilder)
}
