//! Record loaders shared by the handlers.
//!
//! Every board-scoped lookup resolves the caller's effective role first. A
//! caller without any role gets the same 404 as for a missing record.

use rusqlite::Connection;
use uuid::Uuid;

use taskboard_api::notify::Notice;
use taskboard_api::permissions::{self, BoardAction};
use taskboard_api::{BoardRole, ListResponse, TaskResponse, TeamRole, db};

use crate::error::ApiErr;
use crate::storage::{
    board_role_col, exec, list_from_row, query_all, query_opt, task_from_row, team_role_col,
};

/// The caller's effective role on a board.
#[derive(Debug, Clone)]
pub struct BoardAccess {
    pub board_id: String,
    pub owner_id: String,
    pub role: BoardRole,
}

impl BoardAccess {
    /// `403` unless the role permits `action`.
    pub fn require(&self, action: BoardAction) -> Result<(), ApiErr> {
        permissions::require_board(self.role, action).map_err(ApiErr::from)
    }
}

/// Effective role of `user_id` on a board, `None` when the board is
/// missing or invisible to the user.
pub fn board_role(
    conn: &Connection,
    board_id: &str,
    user_id: &str,
) -> Result<Option<BoardAccess>, ApiErr> {
    let row = query_opt(conn, db::boards::access_row(board_id, user_id), |row| {
        Ok((
            row.get::<_, String>(0)?,
            board_role_col(row, 1)?,
            team_role_col(row, 2)?,
        ))
    })
    .map_err(ApiErr::from_db("board access"))?;

    Ok(row.and_then(|(owner_id, direct, team)| {
        permissions::effective_board_role(user_id, &owner_id, direct, team).map(|role| {
            BoardAccess {
                board_id: board_id.to_string(),
                owner_id,
                role,
            }
        })
    }))
}

/// Board access for `action`: 404 without any role, 403 with too weak a role.
pub fn board_access(
    conn: &Connection,
    board_id: &str,
    user_id: &str,
    action: BoardAction,
) -> Result<BoardAccess, ApiErr> {
    let access = board_role(conn, board_id, user_id)?
        .ok_or_else(|| ApiErr::not_found("board not found"))?;
    access.require(action)?;
    Ok(access)
}

/// A user's role in a team. Non-members get 404.
pub fn team_role(conn: &Connection, team_id: &str, user_id: &str) -> Result<TeamRole, ApiErr> {
    query_opt(conn, db::teams::member_role(team_id, user_id), |row| {
        team_role_col(row, 0)
    })
    .map_err(ApiErr::from_db("team role"))?
    .flatten()
    .ok_or_else(|| ApiErr::not_found("team not found"))
}

// ---------------------------------------------------------------------------
// Lists and tasks
// ---------------------------------------------------------------------------

pub fn load_list(conn: &Connection, list_id: &str) -> Result<ListResponse, ApiErr> {
    query_opt(conn, db::lists::get_by_id(list_id), list_from_row)
        .map_err(ApiErr::from_db("load list"))?
        .ok_or_else(|| ApiErr::not_found("list not found"))
}

/// A list plus the caller's access to its board.
pub fn list_access(
    conn: &Connection,
    list_id: &str,
    user_id: &str,
    action: BoardAction,
) -> Result<(ListResponse, BoardAccess), ApiErr> {
    let list = load_list(conn, list_id)?;
    let access = board_role(conn, &list.board_id, user_id)?
        .ok_or_else(|| ApiErr::not_found("list not found"))?;
    access.require(action)?;
    Ok((list, access))
}

/// Load a task with its label ids.
pub fn load_task(conn: &Connection, task_id: &str) -> Result<TaskResponse, ApiErr> {
    let mut task = query_opt(conn, db::tasks::get_by_id(task_id), task_from_row)
        .map_err(ApiErr::from_db("load task"))?
        .ok_or_else(|| ApiErr::not_found("task not found"))?;
    task.label_ids = query_all(conn, db::tasks::label_ids_for_task(task_id), |row| {
        row.get::<_, String>(1)
    })
    .map_err(ApiErr::from_db("task labels"))?;
    Ok(task)
}

/// A task plus the caller's access to its board.
pub fn task_access(
    conn: &Connection,
    task_id: &str,
    user_id: &str,
    action: BoardAction,
) -> Result<(TaskResponse, BoardAccess), ApiErr> {
    let task = load_task(conn, task_id)?;
    let access = board_role(conn, &task.board_id, user_id)?
        .ok_or_else(|| ApiErr::not_found("task not found"))?;
    access.require(action)?;
    Ok((task, access))
}

/// Fill `label_ids` from `(task_id, label_id)` pairs.
pub fn attach_label_ids(tasks: &mut [TaskResponse], pairs: Vec<(String, String)>) {
    for (task_id, label_id) in pairs {
        if let Some(task) = tasks.iter_mut().find(|t| t.id == task_id) {
            task.label_ids.push(label_id);
        }
    }
}

pub fn board_label_pairs(
    conn: &Connection,
    board_id: &str,
) -> Result<Vec<(String, String)>, ApiErr> {
    query_all(conn, db::tasks::label_ids_for_board(board_id), |row| {
        Ok((row.get(0)?, row.get(1)?))
    })
    .map_err(ApiErr::from_db("board task labels"))
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Persist notices. Failures are logged; the triggering request still
/// succeeds.
pub fn store_notices(
    conn: &Connection,
    notices: &[Notice],
    board_id: Option<&str>,
    task_id: Option<&str>,
    actor_id: &str,
) {
    for notice in notices {
        let id = Uuid::new_v4().to_string();
        let result = exec(
            conn,
            db::notifications::insert(&db::notifications::NewNotification {
                id: &id,
                user_id: &notice.user_id,
                kind: notice.kind.as_str(),
                message: &notice.message,
                board_id,
                task_id,
                actor_id: Some(actor_id),
            }),
        );
        if let Err(e) = result {
            tracing::warn!("store notification for {}: {e}", notice.user_id);
        }
    }
}
