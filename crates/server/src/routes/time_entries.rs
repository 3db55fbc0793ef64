use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
};
use rusqlite::Connection;
use uuid::Uuid;

use taskboard_api::permissions::{self, BoardAction};
use taskboard_api::{
    BoardRole, ListTimeEntriesResponse, ManualTimeEntryRequest, RunningTimerResponse, StartTimerRequest,
    TimeEntryResponse, db, service,
};

use crate::error::ApiErr;
use crate::extract::Json;
use crate::routes::access::{BoardAccess, board_role, load_task, task_access};
use crate::routes::auth::AuthUser;
use crate::routes::optional_json;
use crate::storage::{Db, exec, query_all, query_i64, query_opt, time_entry_from_row};

const NOTE_MAX: usize = 1000;

fn load_entry(conn: &Connection, entry_id: &str) -> Result<TimeEntryResponse, ApiErr> {
    query_opt(conn, db::time_entries::get_by_id(entry_id), time_entry_from_row)
        .map_err(ApiErr::from_db("load time entry"))?
        .ok_or_else(|| ApiErr::not_found("time entry not found"))
}

/// An entry and the caller's board role. The entry's own user keeps
/// access after losing the board, so a running timer can still be stopped.
fn entry_access(
    conn: &Connection,
    entry_id: &str,
    user_id: &str,
) -> Result<(TimeEntryResponse, Option<BoardAccess>), ApiErr> {
    let entry = load_entry(conn, entry_id)?;
    let task = load_task(conn, &entry.task_id)?;
    let access = board_role(conn, &task.board_id, user_id)?;
    if access.is_none() && entry.user_id != user_id {
        return Err(ApiErr::not_found("time entry not found"));
    }
    Ok((entry, access))
}

fn running_entry(conn: &Connection, user_id: &str) -> Result<Option<TimeEntryResponse>, ApiErr> {
    query_opt(
        conn,
        db::time_entries::running_for_user(user_id),
        time_entry_from_row,
    )
    .map_err(ApiErr::from_db("running timer"))
}

/// POST /api/tasks/{id}/time-entries/start — one running timer per user.
pub async fn start_timer(
    State(db): State<Db>,
    user: AuthUser,
    Path(task_id): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<TimeEntryResponse>), ApiErr> {
    let req: StartTimerRequest = optional_json(&body)?;
    let note = service::normalize_description(req.note.as_deref(), NOTE_MAX)?;
    let entry_id = Uuid::new_v4().to_string();

    let conn = db.conn();
    task_access(&conn, &task_id, &user.user_id, BoardAction::EditContent)?;
    if running_entry(&conn, &user.user_id)?.is_some() {
        return Err(ApiErr::conflict("a timer is already running"));
    }

    exec(
        &conn,
        db::time_entries::insert_running(
            &entry_id,
            &task_id,
            &user.user_id,
            &service::now_sqlite(),
            note.as_deref(),
        ),
    )
    .map_err(ApiErr::from_db("start timer"))?;

    let entry = load_entry(&conn, &entry_id)?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// POST /api/time-entries/{id}/stop
pub async fn stop_timer(
    State(db): State<Db>,
    user: AuthUser,
    Path(entry_id): Path<String>,
) -> Result<Json<TimeEntryResponse>, ApiErr> {
    let conn = db.conn();
    let (entry, _) = entry_access(&conn, &entry_id, &user.user_id)?;
    if entry.user_id != user.user_id {
        return Err(ApiErr::forbidden("only the owner can stop this timer"));
    }
    if !entry.running {
        return Err(ApiErr::conflict("timer is already stopped"));
    }

    let now = chrono::Utc::now();
    let seconds = service::elapsed_seconds(&entry.started_at, now)?;
    let stopped = exec(
        &conn,
        db::time_entries::stop(&entry_id, &service::format_sqlite(now), seconds),
    )
    .map_err(ApiErr::from_db("stop timer"))?;
    if stopped == 0 {
        return Err(ApiErr::conflict("timer is already stopped"));
    }

    load_entry(&conn, &entry_id).map(Json)
}

/// POST /api/tasks/{id}/time-entries — log a finished interval.
pub async fn log_manual(
    State(db): State<Db>,
    user: AuthUser,
    Path(task_id): Path<String>,
    Json(req): Json<ManualTimeEntryRequest>,
) -> Result<(StatusCode, Json<TimeEntryResponse>), ApiErr> {
    let (started_at, ended_at, seconds) =
        service::validate_time_range(&req.started_at, &req.ended_at)?;
    let note = service::normalize_description(req.note.as_deref(), NOTE_MAX)?;
    let entry_id = Uuid::new_v4().to_string();

    let conn = db.conn();
    task_access(&conn, &task_id, &user.user_id, BoardAction::EditContent)?;
    exec(
        &conn,
        db::time_entries::insert_finished(
            &entry_id,
            &task_id,
            &user.user_id,
            &started_at,
            &ended_at,
            seconds,
            note.as_deref(),
        ),
    )
    .map_err(ApiErr::from_db("log time"))?;

    let entry = load_entry(&conn, &entry_id)?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// GET /api/tasks/{id}/time-entries — entries plus finished total.
pub async fn list_entries(
    State(db): State<Db>,
    user: AuthUser,
    Path(task_id): Path<String>,
) -> Result<Json<ListTimeEntriesResponse>, ApiErr> {
    let conn = db.conn();
    task_access(&conn, &task_id, &user.user_id, BoardAction::View)?;
    let entries = query_all(
        &conn,
        db::time_entries::list_by_task(&task_id),
        time_entry_from_row,
    )
    .map_err(ApiErr::from_db("list time entries"))?;
    let total_seconds = query_i64(&conn, db::time_entries::total_for_task(&task_id))
        .map_err(ApiErr::from_db("tracked time"))?;
    Ok(Json(ListTimeEntriesResponse {
        entries,
        total_seconds,
    }))
}

/// DELETE /api/time-entries/{id} — the entry's user or a board admin.
pub async fn delete_entry(
    State(db): State<Db>,
    user: AuthUser,
    Path(entry_id): Path<String>,
) -> Result<StatusCode, ApiErr> {
    let conn = db.conn();
    let (entry, access) = entry_access(&conn, &entry_id, &user.user_id)?;
    let role = access.map_or(BoardRole::Viewer, |a| a.role);
    if !permissions::can_delete_owned(&user.user_id, Some(&entry.user_id), role) {
        return Err(ApiErr::forbidden("cannot delete this time entry"));
    }
    exec(&conn, db::time_entries::delete(&entry_id))
        .map_err(ApiErr::from_db("delete time entry"))?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/time-entries/running — the caller's running timer, if any.
pub async fn running(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<RunningTimerResponse>, ApiErr> {
    let conn = db.conn();
    let entry = running_entry(&conn, &user.user_id)?;
    Ok(Json(RunningTimerResponse { entry }))
}
