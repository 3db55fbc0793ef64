use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use rusqlite::Connection;
use uuid::Uuid;

use taskboard_api::permissions::BoardAction;
use taskboard_api::{
    CreateLabelRequest, LabelResponse, ListLabelsResponse, UpdateLabelRequest, db, service,
};

use crate::error::ApiErr;
use crate::extract::Json;
use crate::routes::access::{BoardAccess, board_access, board_role};
use crate::routes::auth::AuthUser;
use crate::storage::{Db, exec, is_constraint_violation, label_from_row, query_all, query_i64, query_opt};

fn load_label(conn: &Connection, label_id: &str) -> Result<LabelResponse, ApiErr> {
    query_opt(conn, db::labels::get_by_id(label_id), label_from_row)
        .map_err(ApiErr::from_db("load label"))?
        .ok_or_else(|| ApiErr::not_found("label not found"))
}

/// A label plus edit access to its board.
fn label_access(
    conn: &Connection,
    label_id: &str,
    user_id: &str,
) -> Result<(LabelResponse, BoardAccess), ApiErr> {
    let label = load_label(conn, label_id)?;
    let access = board_role(conn, &label.board_id, user_id)?
        .ok_or_else(|| ApiErr::not_found("label not found"))?;
    access.require(BoardAction::EditContent)?;
    Ok((label, access))
}

fn ensure_name_free(
    conn: &Connection,
    board_id: &str,
    name: &str,
    exclude: Option<&str>,
) -> Result<(), ApiErr> {
    let taken = query_i64(conn, db::labels::name_count(board_id, name, exclude))
        .map_err(ApiErr::from_db("label name check"))?;
    if taken > 0 {
        return Err(ApiErr::conflict("a label with this name already exists"));
    }
    Ok(())
}

/// POST /api/boards/{id}/labels
pub async fn create_label(
    State(db): State<Db>,
    user: AuthUser,
    Path(board_id): Path<String>,
    Json(req): Json<CreateLabelRequest>,
) -> Result<(StatusCode, Json<LabelResponse>), ApiErr> {
    let name = service::validate_label_name(&req.name)?;
    let color = service::validate_color(&req.color)?;
    let label_id = Uuid::new_v4().to_string();

    let conn = db.conn();
    board_access(&conn, &board_id, &user.user_id, BoardAction::EditContent)?;
    ensure_name_free(&conn, &board_id, &name, None)?;

    match exec(&conn, db::labels::insert(&label_id, &board_id, &name, &color)) {
        Ok(_) => {}
        Err(e) if is_constraint_violation(&e) => {
            return Err(ApiErr::conflict("a label with this name already exists"));
        }
        Err(e) => return Err(ApiErr::from_db("create label")(e)),
    }

    Ok((
        StatusCode::CREATED,
        Json(LabelResponse {
            id: label_id,
            board_id,
            name,
            color,
        }),
    ))
}

/// GET /api/boards/{id}/labels
pub async fn list_labels(
    State(db): State<Db>,
    user: AuthUser,
    Path(board_id): Path<String>,
) -> Result<Json<ListLabelsResponse>, ApiErr> {
    let conn = db.conn();
    board_access(&conn, &board_id, &user.user_id, BoardAction::View)?;
    let labels = query_all(&conn, db::labels::list_by_board(&board_id), label_from_row)
        .map_err(ApiErr::from_db("list labels"))?;
    Ok(Json(ListLabelsResponse { labels }))
}

/// PUT /api/labels/{id} — rename and/or recolour.
pub async fn update_label(
    State(db): State<Db>,
    user: AuthUser,
    Path(label_id): Path<String>,
    Json(req): Json<UpdateLabelRequest>,
) -> Result<Json<LabelResponse>, ApiErr> {
    let name = req
        .name
        .as_deref()
        .map(service::validate_label_name)
        .transpose()?;
    let color = req
        .color
        .as_deref()
        .map(service::validate_color)
        .transpose()?;

    let conn = db.conn();
    let (label, _) = label_access(&conn, &label_id, &user.user_id)?;

    if let Some(name) = &name {
        ensure_name_free(&conn, &label.board_id, name, Some(&label_id))?;
        exec(&conn, db::labels::update_name(&label_id, name))
            .map_err(ApiErr::from_db("rename label"))?;
    }
    if let Some(color) = &color {
        exec(&conn, db::labels::update_color(&label_id, color))
            .map_err(ApiErr::from_db("recolour label"))?;
    }

    load_label(&conn, &label_id).map(Json)
}

/// DELETE /api/labels/{id} — also detaches it from every task.
pub async fn delete_label(
    State(db): State<Db>,
    user: AuthUser,
    Path(label_id): Path<String>,
) -> Result<StatusCode, ApiErr> {
    let conn = db.conn();
    label_access(&conn, &label_id, &user.user_id)?;
    exec(&conn, db::labels::delete(&label_id)).map_err(ApiErr::from_db("delete label"))?;
    Ok(StatusCode::NO_CONTENT)
}
