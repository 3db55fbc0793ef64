use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use rusqlite::Connection;
use uuid::Uuid;

use taskboard_api::notify::{self, CommentEvent};
use taskboard_api::permissions::{self, BoardAction};
use taskboard_api::{
    CommentRequest, CommentResponse, ListCommentsResponse, TaskResponse, db, service,
};

use crate::error::ApiErr;
use crate::extract::Json;
use crate::routes::access::{BoardAccess, board_role, load_task, store_notices, task_access};
use crate::routes::auth::AuthUser;
use crate::storage::{Db, comment_from_row, exec, query_all, query_opt};

fn load_comment(conn: &Connection, comment_id: &str) -> Result<CommentResponse, ApiErr> {
    query_opt(conn, db::comments::get_by_id(comment_id), comment_from_row)
        .map_err(ApiErr::from_db("load comment"))?
        .ok_or_else(|| ApiErr::not_found("comment not found"))
}

/// A comment, its task and the caller's board role. Callers that cannot
/// see the board get 404.
fn comment_access(
    conn: &Connection,
    comment_id: &str,
    user_id: &str,
) -> Result<(CommentResponse, TaskResponse, BoardAccess), ApiErr> {
    let comment = load_comment(conn, comment_id)?;
    let task = load_task(conn, &comment.task_id)?;
    let access = board_role(conn, &task.board_id, user_id)?
        .ok_or_else(|| ApiErr::not_found("comment not found"))?;
    Ok((comment, task, access))
}

/// Ids of `@mentioned` users that can see the board, in mention order.
fn resolve_mentions(conn: &Connection, board_id: &str, body: &str) -> Result<Vec<String>, ApiErr> {
    let nicknames = service::extract_mentions(body);
    if nicknames.is_empty() {
        return Ok(Vec::new());
    }
    let found: Vec<(String, String)> =
        query_all(conn, db::users::ids_by_nicknames(&nicknames), |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .map_err(ApiErr::from_db("resolve mentions"))?;

    let mut ids = Vec::new();
    for nickname in &nicknames {
        let Some((id, _)) = found.iter().find(|(_, n)| n.eq_ignore_ascii_case(nickname)) else {
            continue;
        };
        if board_role(conn, board_id, id)?.is_some() {
            ids.push(id.clone());
        }
    }
    Ok(ids)
}

/// GET /api/tasks/{id}/comments — oldest first.
pub async fn list_comments(
    State(db): State<Db>,
    user: AuthUser,
    Path(task_id): Path<String>,
) -> Result<Json<ListCommentsResponse>, ApiErr> {
    let conn = db.conn();
    task_access(&conn, &task_id, &user.user_id, BoardAction::View)?;
    let comments = query_all(&conn, db::comments::list_by_task(&task_id), comment_from_row)
        .map_err(ApiErr::from_db("list comments"))?;
    Ok(Json(ListCommentsResponse { comments }))
}

/// POST /api/tasks/{id}/comments — comment and notify watchers and mentions.
pub async fn create_comment(
    State(db): State<Db>,
    user: AuthUser,
    Path(task_id): Path<String>,
    Json(req): Json<CommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), ApiErr> {
    let body = service::validate_comment_body(&req.body)?;
    let comment_id = Uuid::new_v4().to_string();

    let conn = db.conn();
    let (task, _) = task_access(&conn, &task_id, &user.user_id, BoardAction::Comment)?;
    exec(
        &conn,
        db::comments::insert(&comment_id, &task_id, &user.user_id, &body),
    )
    .map_err(ApiErr::from_db("create comment"))?;
    let comment = load_comment(&conn, &comment_id)?;

    let mentioned_ids = resolve_mentions(&conn, &task.board_id, &body)?;
    let notices = notify::comment_notices(&CommentEvent {
        actor_id: &user.user_id,
        actor_nickname: &user.nickname,
        task_title: &task.title,
        assignee_id: task.assignee_id.as_deref(),
        creator_id: task.created_by.as_deref(),
        mentioned_ids: &mentioned_ids,
    });
    store_notices(
        &conn,
        &notices,
        Some(&task.board_id),
        Some(&task.id),
        &user.user_id,
    );

    Ok((StatusCode::CREATED, Json(comment)))
}

/// PUT /api/comments/{id} — author only.
pub async fn update_comment(
    State(db): State<Db>,
    user: AuthUser,
    Path(comment_id): Path<String>,
    Json(req): Json<CommentRequest>,
) -> Result<Json<CommentResponse>, ApiErr> {
    let body = service::validate_comment_body(&req.body)?;

    let conn = db.conn();
    let (comment, _, _) = comment_access(&conn, &comment_id, &user.user_id)?;
    if !permissions::can_edit_comment(&user.user_id, &comment.author_id) {
        return Err(ApiErr::forbidden("only the author can edit a comment"));
    }
    exec(&conn, db::comments::update_body(&comment_id, &body))
        .map_err(ApiErr::from_db("update comment"))?;

    load_comment(&conn, &comment_id).map(Json)
}

/// DELETE /api/comments/{id} — author or board admin.
pub async fn delete_comment(
    State(db): State<Db>,
    user: AuthUser,
    Path(comment_id): Path<String>,
) -> Result<StatusCode, ApiErr> {
    let conn = db.conn();
    let (comment, _, access) = comment_access(&conn, &comment_id, &user.user_id)?;
    if !permissions::can_delete_comment(&user.user_id, &comment.author_id, access.role) {
        return Err(ApiErr::forbidden("cannot delete this comment"));
    }
    exec(&conn, db::comments::delete(&comment_id)).map_err(ApiErr::from_db("delete comment"))?;
    Ok(StatusCode::NO_CONTENT)
}
