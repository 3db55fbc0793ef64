use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use rusqlite::Connection;
use uuid::Uuid;

use taskboard_api::db::tasks::{NewTask, TaskChanges, TaskFilter};
use taskboard_api::permissions::BoardAction;
use taskboard_api::{
    CreateTaskRequest, LabelResponse, ListTasksResponse, MoveTaskRequest, TaskDetailResponse,
    TaskFilterQuery, TaskResponse, UpdateTaskRequest, db, notify, service,
};

use crate::error::ApiErr;
use crate::extract::{Json, Query};
use crate::routes::access::{
    attach_label_ids, board_access, board_label_pairs, board_role, list_access, load_list,
    load_task, store_notices, task_access,
};
use crate::routes::auth::AuthUser;
use crate::storage::{
    Db, attachment_from_row, exec, label_from_row, query_all, query_i64, query_opt, query_strings,
    task_from_row,
};

const TASK_DESCRIPTION_MAX: usize = 10_000;

/// Normalise an assignee id: blank clears, anyone else must see the board.
fn check_assignee(
    conn: &Connection,
    board_id: &str,
    assignee_id: &str,
) -> Result<Option<String>, ApiErr> {
    let assignee_id = assignee_id.trim();
    if assignee_id.is_empty() {
        return Ok(None);
    }
    if board_role(conn, board_id, assignee_id)?.is_none() {
        return Err(ApiErr::bad_request(
            "assignee must have access to the board",
        ));
    }
    Ok(Some(assignee_id.to_string()))
}

fn notify_assignee(conn: &Connection, user: &AuthUser, task: &TaskResponse) {
    let Some(assignee_id) = task.assignee_id.as_deref() else {
        return;
    };
    if let Some(notice) =
        notify::assignment_notice(&user.user_id, &user.nickname, assignee_id, &task.title)
    {
        store_notices(
            conn,
            &[notice],
            Some(&task.board_id),
            Some(&task.id),
            &user.user_id,
        );
    }
}

// ---------------------------------------------------------------------------
// Create / read
// ---------------------------------------------------------------------------

/// POST /api/lists/{id}/tasks — create a task in a list.
pub async fn create_task(
    State(db): State<Db>,
    user: AuthUser,
    Path(list_id): Path<String>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskResponse>), ApiErr> {
    let title = service::validate_task_title(&req.title)?;
    let description =
        service::normalize_description(req.description.as_deref(), TASK_DESCRIPTION_MAX)?;
    let due_date = req
        .due_date
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .map(service::validate_due_date)
        .transpose()?;
    let priority = req.priority.unwrap_or_default();
    let task_id = Uuid::new_v4().to_string();

    let mut conn = db.conn();
    let (list, _) = list_access(&conn, &list_id, &user.user_id, BoardAction::EditContent)?;
    let assignee_id = match req.assignee_id.as_deref() {
        Some(id) => check_assignee(&conn, &list.board_id, id)?,
        None => None,
    };

    let tx = conn.transaction()?;
    let len =
        query_i64(&tx, db::tasks::count_in_list(&list_id)).map_err(ApiErr::from_db("count tasks"))?;
    let position = service::insert_position(req.position, len);
    exec(&tx, db::tasks::shift(&list_id, position, None, 1))
        .map_err(ApiErr::from_db("shift tasks"))?;
    exec(
        &tx,
        db::tasks::insert(&NewTask {
            id: &task_id,
            board_id: &list.board_id,
            list_id: &list_id,
            title: &title,
            description: description.as_deref(),
            position,
            priority: priority.as_str(),
            due_date: due_date.as_deref(),
            assignee_id: assignee_id.as_deref(),
            created_by: &user.user_id,
        }),
    )
    .map_err(ApiErr::from_db("create task"))?;
    exec(&tx, db::boards::touch(&list.board_id)).map_err(ApiErr::from_db("touch board"))?;
    tx.commit()?;

    let task = load_task(&conn, &task_id)?;
    notify_assignee(&conn, &user, &task);
    Ok((StatusCode::CREATED, Json(task)))
}

/// GET /api/tasks/{id} — task with labels, attachments and tracked time.
pub async fn get_task(
    State(db): State<Db>,
    user: AuthUser,
    Path(task_id): Path<String>,
) -> Result<Json<TaskDetailResponse>, ApiErr> {
    let conn = db.conn();
    let (task, _) = task_access(&conn, &task_id, &user.user_id, BoardAction::View)?;

    let labels: Vec<LabelResponse> =
        query_all(&conn, db::labels::list_for_task(&task_id), label_from_row)
            .map_err(ApiErr::from_db("task labels"))?;
    let comment_count = query_i64(&conn, db::comments::count_for_task(&task_id))
        .map_err(ApiErr::from_db("comment count"))?;
    let attachments = query_all(&conn, db::attachments::list_by_task(&task_id), |row| {
        attachment_from_row(row).map(|(attachment, _)| attachment)
    })
    .map_err(ApiErr::from_db("task attachments"))?;
    let tracked_seconds = query_i64(&conn, db::time_entries::total_for_task(&task_id))
        .map_err(ApiErr::from_db("tracked time"))?;

    Ok(Json(TaskDetailResponse {
        task,
        labels,
        comment_count,
        attachments,
        tracked_seconds,
    }))
}

/// GET /api/boards/{id}/tasks — filtered task search on one board.
pub async fn list_board_tasks(
    State(db): State<Db>,
    user: AuthUser,
    Path(board_id): Path<String>,
    Query(query): Query<TaskFilterQuery>,
) -> Result<Json<ListTasksResponse>, ApiErr> {
    let due_before = query
        .due_before
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .map(service::validate_due_date)
        .transpose()?;
    let text = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty());
    let filter = TaskFilter {
        assignee_id: query.assignee_id.as_deref().filter(|a| !a.is_empty()),
        label_id: query.label_id.as_deref().filter(|l| !l.is_empty()),
        priority: query.priority.map(|p| p.as_str()),
        completed: query.completed,
        text,
        due_before: due_before.as_deref(),
    };

    let conn = db.conn();
    board_access(&conn, &board_id, &user.user_id, BoardAction::View)?;
    let mut tasks = query_all(
        &conn,
        db::tasks::list_filtered(&board_id, &filter),
        task_from_row,
    )
    .map_err(ApiErr::from_db("filter tasks"))?;
    attach_label_ids(&mut tasks, board_label_pairs(&conn, &board_id)?);

    Ok(Json(ListTasksResponse { tasks }))
}

/// GET /api/tasks/mine — open tasks assigned to the caller.
pub async fn my_tasks(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<ListTasksResponse>, ApiErr> {
    let conn = db.conn();
    let mut tasks = query_all(&conn, db::tasks::list_assigned(&user.user_id), task_from_row)
        .map_err(ApiErr::from_db("assigned tasks"))?;
    for task in &mut tasks {
        task.label_ids = query_all(&conn, db::tasks::label_ids_for_task(&task.id), |row| {
            row.get::<_, String>(1)
        })
        .map_err(ApiErr::from_db("task labels"))?;
    }
    Ok(Json(ListTasksResponse { tasks }))
}

// ---------------------------------------------------------------------------
// Update / move / delete
// ---------------------------------------------------------------------------

/// PUT /api/tasks/{id} — partial update. Explicit `null` clears a field.
pub async fn update_task(
    State(db): State<Db>,
    user: AuthUser,
    Path(task_id): Path<String>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<TaskResponse>, ApiErr> {
    let title = req
        .title
        .as_deref()
        .map(service::validate_task_title)
        .transpose()?;
    let description = req
        .description
        .as_ref()
        .map(|d| service::normalize_description(d.as_deref(), TASK_DESCRIPTION_MAX))
        .transpose()?;
    let due_date = req
        .due_date
        .as_ref()
        .map(|d| {
            d.as_deref()
                .filter(|d| !d.trim().is_empty())
                .map(service::validate_due_date)
                .transpose()
        })
        .transpose()?;

    let conn = db.conn();
    let (before, _) = task_access(&conn, &task_id, &user.user_id, BoardAction::EditContent)?;
    let assignee_id = match &req.assignee_id {
        Some(Some(id)) => Some(check_assignee(&conn, &before.board_id, id)?),
        Some(None) => Some(None),
        None => None,
    };

    let changes = TaskChanges {
        title: title.as_deref(),
        description: description.as_ref().map(Option::as_deref),
        priority: req.priority.map(|p| p.as_str()),
        due_date: due_date.as_ref().map(Option::as_deref),
        assignee_id: assignee_id.as_ref().map(Option::as_deref),
        completed: req.completed,
    };
    exec(&conn, db::tasks::update(&task_id, &changes)).map_err(ApiErr::from_db("update task"))?;
    exec(&conn, db::boards::touch(&before.board_id)).map_err(ApiErr::from_db("touch board"))?;

    let task = load_task(&conn, &task_id)?;
    if task.assignee_id.is_some() && task.assignee_id != before.assignee_id {
        notify_assignee(&conn, &user, &task);
    }
    Ok(Json(task))
}

/// POST /api/tasks/{id}/move — move within or across lists of one board.
pub async fn move_task(
    State(db): State<Db>,
    user: AuthUser,
    Path(task_id): Path<String>,
    Json(req): Json<MoveTaskRequest>,
) -> Result<Json<TaskResponse>, ApiErr> {
    let mut conn = db.conn();
    let (task, _) = task_access(&conn, &task_id, &user.user_id, BoardAction::EditContent)?;
    let target = load_list(&conn, &req.list_id)?;
    if target.board_id != task.board_id {
        return Err(ApiErr::bad_request(
            "target list belongs to another board",
        ));
    }

    let tx = conn.transaction()?;
    let from = task.position;
    if target.id == task.list_id {
        let len = query_i64(&tx, db::tasks::count_in_list(&target.id))
            .map_err(ApiErr::from_db("count tasks"))?;
        let to = service::move_position(req.position, len);
        if to < from {
            exec(&tx, db::tasks::shift(&target.id, to, Some(from - 1), 1))
                .map_err(ApiErr::from_db("shift tasks"))?;
        } else if to > from {
            exec(&tx, db::tasks::shift(&target.id, from + 1, Some(to), -1))
                .map_err(ApiErr::from_db("shift tasks"))?;
        }
        exec(&tx, db::tasks::set_list_and_position(&task_id, &target.id, to))
            .map_err(ApiErr::from_db("move task"))?;
    } else {
        exec(&tx, db::tasks::shift(&task.list_id, from + 1, None, -1))
            .map_err(ApiErr::from_db("close gap"))?;
        let len = query_i64(&tx, db::tasks::count_in_list(&target.id))
            .map_err(ApiErr::from_db("count tasks"))?;
        let to = service::insert_position(Some(req.position), len);
        exec(&tx, db::tasks::shift(&target.id, to, None, 1))
            .map_err(ApiErr::from_db("open gap"))?;
        exec(&tx, db::tasks::set_list_and_position(&task_id, &target.id, to))
            .map_err(ApiErr::from_db("move task"))?;
    }
    exec(&tx, db::boards::touch(&task.board_id)).map_err(ApiErr::from_db("touch board"))?;
    tx.commit()?;

    load_task(&conn, &task_id).map(Json)
}

/// DELETE /api/tasks/{id} — removes the task and its attachment files.
pub async fn delete_task(
    State(db): State<Db>,
    user: AuthUser,
    Path(task_id): Path<String>,
) -> Result<StatusCode, ApiErr> {
    let storage_keys = {
        let mut conn = db.conn();
        let (task, _) = task_access(&conn, &task_id, &user.user_id, BoardAction::EditContent)?;

        let tx = conn.transaction()?;
        let keys = query_strings(&tx, db::attachments::storage_keys_for_task(&task_id))
            .map_err(ApiErr::from_db("task attachments"))?;
        exec(&tx, db::tasks::delete(&task_id)).map_err(ApiErr::from_db("delete task"))?;
        exec(&tx, db::tasks::shift(&task.list_id, task.position + 1, None, -1))
            .map_err(ApiErr::from_db("close gap"))?;
        tx.commit()?;
        keys
    };
    db.remove_attachments(&storage_keys).await;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Task labels
// ---------------------------------------------------------------------------

fn label_for_task(
    conn: &Connection,
    task: &TaskResponse,
    label_id: &str,
) -> Result<LabelResponse, ApiErr> {
    let label = query_opt(conn, db::labels::get_by_id(label_id), label_from_row)
        .map_err(ApiErr::from_db("load label"))?
        .ok_or_else(|| ApiErr::not_found("label not found"))?;
    if label.board_id != task.board_id {
        return Err(ApiErr::bad_request("label belongs to another board"));
    }
    Ok(label)
}

/// PUT /api/tasks/{id}/labels/{label_id}
pub async fn add_label(
    State(db): State<Db>,
    user: AuthUser,
    Path((task_id, label_id)): Path<(String, String)>,
) -> Result<Json<TaskResponse>, ApiErr> {
    let conn = db.conn();
    let (task, _) = task_access(&conn, &task_id, &user.user_id, BoardAction::EditContent)?;
    label_for_task(&conn, &task, &label_id)?;
    exec(&conn, db::tasks::label_add(&task_id, &label_id))
        .map_err(ApiErr::from_db("add task label"))?;
    load_task(&conn, &task_id).map(Json)
}

/// DELETE /api/tasks/{id}/labels/{label_id}
pub async fn remove_label(
    State(db): State<Db>,
    user: AuthUser,
    Path((task_id, label_id)): Path<(String, String)>,
) -> Result<Json<TaskResponse>, ApiErr> {
    let conn = db.conn();
    let (task, _) = task_access(&conn, &task_id, &user.user_id, BoardAction::EditContent)?;
    label_for_task(&conn, &task, &label_id)?;
    exec(&conn, db::tasks::label_remove(&task_id, &label_id))
        .map_err(ApiErr::from_db("remove task label"))?;
    load_task(&conn, &task_id).map(Json)
}
