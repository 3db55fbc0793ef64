use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use taskboard_api::permissions::BoardAction;
use taskboard_api::{
    CreateListRequest, ListResponse, MoveListRequest, UpdateListRequest, db, service,
};

use crate::error::ApiErr;
use crate::extract::Json;
use crate::routes::access::{board_access, list_access, load_list};
use crate::routes::auth::AuthUser;
use crate::storage::{Db, exec, query_i64, query_strings};

/// POST /api/boards/{id}/lists — insert a list; later lists shift right.
pub async fn create_list(
    State(db): State<Db>,
    user: AuthUser,
    Path(board_id): Path<String>,
    Json(req): Json<CreateListRequest>,
) -> Result<(StatusCode, Json<ListResponse>), ApiErr> {
    let title = service::validate_list_title(&req.title)?;
    let list_id = Uuid::new_v4().to_string();

    let mut conn = db.conn();
    board_access(&conn, &board_id, &user.user_id, BoardAction::EditContent)?;

    let tx = conn.transaction()?;
    let len = query_i64(&tx, db::lists::count(&board_id)).map_err(ApiErr::from_db("count lists"))?;
    let position = service::insert_position(req.position, len);
    exec(&tx, db::lists::shift(&board_id, position, None, 1))
        .map_err(ApiErr::from_db("shift lists"))?;
    exec(&tx, db::lists::insert(&list_id, &board_id, &title, position))
        .map_err(ApiErr::from_db("create list"))?;
    exec(&tx, db::boards::touch(&board_id)).map_err(ApiErr::from_db("touch board"))?;
    tx.commit()?;

    let list = load_list(&conn, &list_id)?;
    Ok((StatusCode::CREATED, Json(list)))
}

/// PUT /api/lists/{id} — rename.
pub async fn update_list(
    State(db): State<Db>,
    user: AuthUser,
    Path(list_id): Path<String>,
    Json(req): Json<UpdateListRequest>,
) -> Result<Json<ListResponse>, ApiErr> {
    let title = service::validate_list_title(&req.title)?;

    let conn = db.conn();
    list_access(&conn, &list_id, &user.user_id, BoardAction::EditContent)?;
    exec(&conn, db::lists::update_title(&list_id, &title))
        .map_err(ApiErr::from_db("rename list"))?;

    load_list(&conn, &list_id).map(Json)
}

/// POST /api/lists/{id}/move — reorder within the board.
pub async fn move_list(
    State(db): State<Db>,
    user: AuthUser,
    Path(list_id): Path<String>,
    Json(req): Json<MoveListRequest>,
) -> Result<Json<ListResponse>, ApiErr> {
    let mut conn = db.conn();
    let (list, _) = list_access(&conn, &list_id, &user.user_id, BoardAction::EditContent)?;

    let tx = conn.transaction()?;
    let len =
        query_i64(&tx, db::lists::count(&list.board_id)).map_err(ApiErr::from_db("count lists"))?;
    let from = list.position;
    let to = service::move_position(req.position, len);

    if to < from {
        exec(&tx, db::lists::shift(&list.board_id, to, Some(from - 1), 1))
            .map_err(ApiErr::from_db("shift lists"))?;
    } else if to > from {
        exec(&tx, db::lists::shift(&list.board_id, from + 1, Some(to), -1))
            .map_err(ApiErr::from_db("shift lists"))?;
    }
    if to != from {
        exec(&tx, db::lists::set_position(&list_id, to))
            .map_err(ApiErr::from_db("move list"))?;
    }
    tx.commit()?;

    load_list(&conn, &list_id).map(Json)
}

/// DELETE /api/lists/{id} — drops its tasks; later lists shift left.
pub async fn delete_list(
    State(db): State<Db>,
    user: AuthUser,
    Path(list_id): Path<String>,
) -> Result<StatusCode, ApiErr> {
    let storage_keys = {
        let mut conn = db.conn();
        let (list, _) = list_access(&conn, &list_id, &user.user_id, BoardAction::EditContent)?;

        let tx = conn.transaction()?;
        let keys = query_strings(&tx, db::attachments::storage_keys_for_list(&list_id))
            .map_err(ApiErr::from_db("list attachments"))?;
        exec(&tx, db::lists::delete(&list_id)).map_err(ApiErr::from_db("delete list"))?;
        exec(
            &tx,
            db::lists::shift(&list.board_id, list.position + 1, None, -1),
        )
        .map_err(ApiErr::from_db("shift lists"))?;
        tx.commit()?;
        keys
    };
    db.remove_attachments(&storage_keys).await;
    Ok(StatusCode::NO_CONTENT)
}
