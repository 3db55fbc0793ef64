//! Task + task label query builders.

use sea_query::{
    Alias, Asterisk, Cond, Expr, Func, LikeExpr, OnConflict, Order, Query, SelectStatement,
    SqliteQueryBuilder,
};

use super::tables::{Labels, TaskLabels, Tasks, Users};
use super::{Built, now_expr};

/// Column list for task SELECT queries:
/// id, board_id, list_id, title, description, position, priority, due_date,
/// assignee_id, assignee_nickname, created_by, completed, created_at,
/// updated_at.
fn task_select() -> SelectStatement {
    Query::select()
        .column((Tasks::Table, Tasks::Id))
        .column((Tasks::Table, Tasks::BoardId))
        .column((Tasks::Table, Tasks::ListId))
        .column((Tasks::Table, Tasks::Title))
        .column((Tasks::Table, Tasks::Description))
        .column((Tasks::Table, Tasks::Position))
        .column((Tasks::Table, Tasks::Priority))
        .column((Tasks::Table, Tasks::DueDate))
        .column((Tasks::Table, Tasks::AssigneeId))
        .expr_as(
            Expr::col((Users::Table, Users::Nickname)),
            Alias::new("assignee_nickname"),
        )
        .column((Tasks::Table, Tasks::CreatedBy))
        .column((Tasks::Table, Tasks::Completed))
        .column((Tasks::Table, Tasks::CreatedAt))
        .column((Tasks::Table, Tasks::UpdatedAt))
        .from(Tasks::Table)
        .left_join(
            Users::Table,
            Expr::col((Users::Table, Users::Id)).equals((Tasks::Table, Tasks::AssigneeId)),
        )
        .to_owned()
}

/// Fields of a task being created.
#[derive(Debug, Clone, Copy)]
pub struct NewTask<'a> {
    pub id: &'a str,
    pub board_id: &'a str,
    pub list_id: &'a str,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub position: i64,
    pub priority: &'a str,
    pub due_date: Option<&'a str>,
    pub assignee_id: Option<&'a str>,
    pub created_by: &'a str,
}

pub fn insert(task: &NewTask<'_>) -> Built {
    Query::insert()
        .into_table(Tasks::Table)
        .columns([
            Tasks::Id,
            Tasks::BoardId,
            Tasks::ListId,
            Tasks::Title,
            Tasks::Description,
            Tasks::Position,
            Tasks::Priority,
            Tasks::DueDate,
            Tasks::AssigneeId,
            Tasks::CreatedBy,
        ])
        .values_panic([
            task.id.into(),
            task.board_id.into(),
            task.list_id.into(),
            task.title.into(),
            task.description.map(|s| s.to_string()).into(),
            task.position.into(),
            task.priority.into(),
            task.due_date.map(|s| s.to_string()).into(),
            task.assignee_id.map(|s| s.to_string()).into(),
            task.created_by.into(),
        ])
        .build(SqliteQueryBuilder)
}

pub fn get_by_id(id: &str) -> Built {
    task_select()
        .and_where(Expr::col((Tasks::Table, Tasks::Id)).eq(id))
        .build(SqliteQueryBuilder)
}

/// Every task of a board, grouped by list then position.
pub fn list_by_board(board_id: &str) -> Built {
    task_select()
        .and_where(Expr::col((Tasks::Table, Tasks::BoardId)).eq(board_id))
        .order_by((Tasks::Table, Tasks::ListId), Order::Asc)
        .order_by((Tasks::Table, Tasks::Position), Order::Asc)
        .build(SqliteQueryBuilder)
}

/// Optional filters for [`list_filtered`]. Values are already validated.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskFilter<'a> {
    pub assignee_id: Option<&'a str>,
    pub label_id: Option<&'a str>,
    pub priority: Option<&'a str>,
    pub completed: Option<bool>,
    /// Case-insensitive substring of title or description.
    pub text: Option<&'a str>,
    /// Inclusive `YYYY-MM-DD` upper bound on `due_date`.
    pub due_before: Option<&'a str>,
}

fn like_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '!') {
            escaped.push('!');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

pub fn list_filtered(board_id: &str, filter: &TaskFilter<'_>) -> Built {
    let mut q = task_select();
    q.and_where(Expr::col((Tasks::Table, Tasks::BoardId)).eq(board_id));
    if let Some(assignee) = filter.assignee_id {
        q.and_where(Expr::col((Tasks::Table, Tasks::AssigneeId)).eq(assignee));
    }
    if let Some(label_id) = filter.label_id {
        q.and_where(
            Expr::col((Tasks::Table, Tasks::Id)).in_subquery(
                Query::select()
                    .column(TaskLabels::TaskId)
                    .from(TaskLabels::Table)
                    .and_where(Expr::col(TaskLabels::LabelId).eq(label_id))
                    .to_owned(),
            ),
        );
    }
    if let Some(priority) = filter.priority {
        q.and_where(Expr::col((Tasks::Table, Tasks::Priority)).eq(priority));
    }
    if let Some(completed) = filter.completed {
        q.and_where(Expr::col((Tasks::Table, Tasks::Completed)).eq(completed));
    }
    if let Some(text) = filter.text {
        let pattern = like_pattern(&text.to_lowercase());
        q.cond_where(
            Cond::any()
                .add(
                    Expr::expr(Func::lower(Expr::col((Tasks::Table, Tasks::Title))))
                        .like(LikeExpr::new(pattern.clone()).escape('!')),
                )
                .add(
                    Expr::expr(Func::lower(Expr::col((Tasks::Table, Tasks::Description))))
                        .like(LikeExpr::new(pattern).escape('!')),
                ),
        );
    }
    if let Some(due) = filter.due_before {
        q.and_where(Expr::col((Tasks::Table, Tasks::DueDate)).is_not_null())
            .and_where(Expr::col((Tasks::Table, Tasks::DueDate)).lte(due));
    }
    q.order_by((Tasks::Table, Tasks::ListId), Order::Asc)
        .order_by((Tasks::Table, Tasks::Position), Order::Asc)
        .build(SqliteQueryBuilder)
}

/// Open tasks assigned to the user on boards they can still access,
/// earliest due date first (undated last).
/// Params: user_id (×4).
pub fn list_assigned(user_id: &str) -> Built {
    let sql = concat!(
        "SELECT t.\"id\", t.\"board_id\", t.\"list_id\", t.\"title\", t.\"description\", ",
        "t.\"position\", t.\"priority\", t.\"due_date\", t.\"assignee_id\", ",
        "u.\"nickname\" AS \"assignee_nickname\", t.\"created_by\", t.\"completed\", ",
        "t.\"created_at\", t.\"updated_at\" ",
        "FROM \"tasks\" t ",
        "INNER JOIN \"boards\" b ON b.\"id\" = t.\"board_id\" ",
        "LEFT JOIN \"users\" u ON u.\"id\" = t.\"assignee_id\" ",
        "WHERE t.\"assignee_id\" = ? AND t.\"completed\" = 0 ",
        "AND (b.\"owner_id\" = ? ",
        "OR EXISTS (SELECT 1 FROM \"board_members\" bm ",
        "WHERE bm.\"board_id\" = b.\"id\" AND bm.\"user_id\" = ?) ",
        "OR EXISTS (SELECT 1 FROM \"team_members\" tm ",
        "WHERE tm.\"team_id\" = b.\"team_id\" AND tm.\"user_id\" = ?)) ",
        "ORDER BY t.\"due_date\" IS NULL, t.\"due_date\", t.\"created_at\""
    )
    .to_string();
    (
        sql,
        sea_query::Values(vec![
            user_id.into(),
            user_id.into(),
            user_id.into(),
            user_id.into(),
        ]),
    )
}

/// Partial update of a task. `None` leaves the column alone; for nullable
/// columns `Some(None)` writes NULL.
#[derive(Debug, Clone, Default)]
pub struct TaskChanges<'a> {
    pub title: Option<&'a str>,
    pub description: Option<Option<&'a str>>,
    pub priority: Option<&'a str>,
    pub due_date: Option<Option<&'a str>>,
    pub assignee_id: Option<Option<&'a str>>,
    pub completed: Option<bool>,
}

/// UPDATE the changed columns and `updated_at`.
pub fn update(id: &str, changes: &TaskChanges<'_>) -> Built {
    let mut q = Query::update();
    q.table(Tasks::Table);
    if let Some(title) = changes.title {
        q.value(Tasks::Title, title);
    }
    if let Some(description) = changes.description {
        q.value(Tasks::Description, description.map(|s| s.to_string()));
    }
    if let Some(priority) = changes.priority {
        q.value(Tasks::Priority, priority);
    }
    if let Some(due) = changes.due_date {
        q.value(Tasks::DueDate, due.map(|s| s.to_string()));
    }
    if let Some(assignee) = changes.assignee_id {
        q.value(Tasks::AssigneeId, assignee.map(|s| s.to_string()));
    }
    if let Some(completed) = changes.completed {
        q.value(Tasks::Completed, completed);
    }
    q.value(Tasks::UpdatedAt, now_expr())
        .and_where(Expr::col(Tasks::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// Place a task in a list at a position.
pub fn set_list_and_position(id: &str, list_id: &str, position: i64) -> Built {
    Query::update()
        .table(Tasks::Table)
        .value(Tasks::ListId, list_id)
        .value(Tasks::Position, position)
        .value(Tasks::UpdatedAt, now_expr())
        .and_where(Expr::col(Tasks::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// Add `delta` to the position of tasks of a list in `[from, to]`.
pub fn shift(list_id: &str, from: i64, to: Option<i64>, delta: i64) -> Built {
    let mut q = Query::update();
    q.table(Tasks::Table)
        .value(Tasks::Position, Expr::col(Tasks::Position).add(delta))
        .and_where(Expr::col(Tasks::ListId).eq(list_id))
        .and_where(Expr::col(Tasks::Position).gte(from));
    if let Some(to) = to {
        q.and_where(Expr::col(Tasks::Position).lte(to));
    }
    q.build(SqliteQueryBuilder)
}

pub fn count_in_list(list_id: &str) -> Built {
    Query::select()
        .expr_as(Func::count(Expr::col(Asterisk)), Alias::new("count"))
        .from(Tasks::Table)
        .and_where(Expr::col(Tasks::ListId).eq(list_id))
        .build(SqliteQueryBuilder)
}

pub fn delete(id: &str) -> Built {
    Query::delete()
        .from_table(Tasks::Table)
        .and_where(Expr::col(Tasks::Id).eq(id))
        .build(SqliteQueryBuilder)
}

// ── Task labels ───────────────────────────────────────────────────────────

/// Attach a label; attaching twice is a no-op.
pub fn label_add(task_id: &str, label_id: &str) -> Built {
    Query::insert()
        .into_table(TaskLabels::Table)
        .columns([TaskLabels::TaskId, TaskLabels::LabelId])
        .values_panic([task_id.into(), label_id.into()])
        .on_conflict(
            OnConflict::columns([TaskLabels::TaskId, TaskLabels::LabelId])
                .do_nothing()
                .to_owned(),
        )
        .build(SqliteQueryBuilder)
}

pub fn label_remove(task_id: &str, label_id: &str) -> Built {
    Query::delete()
        .from_table(TaskLabels::Table)
        .and_where(Expr::col(TaskLabels::TaskId).eq(task_id))
        .and_where(Expr::col(TaskLabels::LabelId).eq(label_id))
        .build(SqliteQueryBuilder)
}

/// `(task_id, label_id)` pairs for every task of a board.
pub fn label_ids_for_board(board_id: &str) -> Built {
    Query::select()
        .column((TaskLabels::Table, TaskLabels::TaskId))
        .column((TaskLabels::Table, TaskLabels::LabelId))
        .from(TaskLabels::Table)
        .inner_join(
            Labels::Table,
            Expr::col((Labels::Table, Labels::Id)).equals((TaskLabels::Table, TaskLabels::LabelId)),
        )
        .and_where(Expr::col((Labels::Table, Labels::BoardId)).eq(board_id))
        .order_by((Labels::Table, Labels::Name), Order::Asc)
        .build(SqliteQueryBuilder)
}

/// `(task_id, label_id)` pairs for one task.
pub fn label_ids_for_task(task_id: &str) -> Built {
    Query::select()
        .column((TaskLabels::Table, TaskLabels::TaskId))
        .column((TaskLabels::Table, TaskLabels::LabelId))
        .from(TaskLabels::Table)
        .inner_join(
            Labels::Table,
            Expr::col((Labels::Table, Labels::Id)).equals((TaskLabels::Table, TaskLabels::LabelId)),
        )
        .and_where(Expr::col((TaskLabels::Table, TaskLabels::TaskId)).eq(task_id))
        .order_by((Labels::Table, Labels::Name), Order::Asc)
        .build(SqliteQueryBuilder)
}
