use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use rusqlite::Connection;
use uuid::Uuid;

use taskboard_api::permissions::{self, BoardAction};
use taskboard_api::{
    BoardDetailResponse, BoardResponse, BoardRole, BoardSummary, CreateBoardRequest,
    ListBoardsResponse, ListMembersResponse, ListWithTasks, TeamRole, UpdateBoardRequest,
    UpdateMemberRoleRequest, db, service,
};

use crate::error::ApiErr;
use crate::extract::Json;
use crate::routes::access::{
    attach_label_ids, board_access, board_label_pairs, board_role, team_role,
};
use crate::routes::auth::AuthUser;
use crate::storage::{
    Db, board_from_row, board_role_col, exec, label_from_row, list_from_row, member_from_row,
    query_all, query_opt, query_strings, task_from_row, team_role_col,
};

pub const BOARD_DESCRIPTION_MAX: usize = 5000;

fn load_board(conn: &Connection, board_id: &str) -> Result<BoardResponse, ApiErr> {
    query_opt(conn, db::boards::get_by_id(board_id), board_from_row)
        .map_err(ApiErr::from_db("load board"))?
        .ok_or_else(|| ApiErr::not_found("board not found"))
}

/// Attaching a board to a team takes team admin rights.
fn require_team_admin(conn: &Connection, team_id: &str, user_id: &str) -> Result<(), ApiErr> {
    if team_role(conn, team_id, user_id)? < TeamRole::Admin {
        return Err(ApiErr::forbidden(
            "adding a board to a team requires the team admin role",
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Create / list
// ---------------------------------------------------------------------------

/// POST /api/boards — create a board, optionally inside a team.
pub async fn create_board(
    State(db): State<Db>,
    user: AuthUser,
    Json(req): Json<CreateBoardRequest>,
) -> Result<(StatusCode, Json<BoardResponse>), ApiErr> {
    let title = service::validate_board_title(&req.title)?;
    let description =
        service::normalize_description(req.description.as_deref(), BOARD_DESCRIPTION_MAX)?;
    let team_id = req.team_id.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let board_id = Uuid::new_v4().to_string();

    let mut conn = db.conn();
    if let Some(team_id) = team_id {
        require_team_admin(&conn, team_id, &user.user_id)?;
    }

    let tx = conn.transaction()?;
    exec(
        &tx,
        db::boards::insert(
            &board_id,
            &title,
            description.as_deref(),
            &user.user_id,
            team_id,
        ),
    )
    .map_err(ApiErr::from_db("create board"))?;
    exec(
        &tx,
        db::boards::member_insert(&board_id, &user.user_id, BoardRole::Owner.as_str()),
    )
    .map_err(ApiErr::from_db("add board owner"))?;
    tx.commit()?;

    let board = load_board(&conn, &board_id)?;
    Ok((StatusCode::CREATED, Json(board)))
}

/// GET /api/boards — every board the caller can see, with their role.
pub async fn list_boards(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<ListBoardsResponse>, ApiErr> {
    let conn = db.conn();
    let rows = query_all(&conn, db::boards::list_accessible(&user.user_id), |row| {
        Ok((
            board_from_row(row)?,
            board_role_col(row, 7)?,
            team_role_col(row, 8)?,
        ))
    })
    .map_err(ApiErr::from_db("list boards"))?;

    let boards = rows
        .into_iter()
        .filter_map(|(board, direct, team)| {
            permissions::effective_board_role(&user.user_id, &board.owner_id, direct, team)
                .map(|role| BoardSummary { board, role })
        })
        .collect();
    Ok(Json(ListBoardsResponse { boards }))
}

// ---------------------------------------------------------------------------
// Detail / update / delete
// ---------------------------------------------------------------------------

/// GET /api/boards/{id} — board with its lists, tasks and labels.
pub async fn get_board(
    State(db): State<Db>,
    user: AuthUser,
    Path(board_id): Path<String>,
) -> Result<Json<BoardDetailResponse>, ApiErr> {
    let conn = db.conn();
    let access = board_access(&conn, &board_id, &user.user_id, BoardAction::View)?;
    let board = load_board(&conn, &board_id)?;

    let lists = query_all(&conn, db::lists::list_by_board(&board_id), list_from_row)
        .map_err(ApiErr::from_db("board lists"))?;
    let mut tasks = query_all(&conn, db::tasks::list_by_board(&board_id), task_from_row)
        .map_err(ApiErr::from_db("board tasks"))?;
    attach_label_ids(&mut tasks, board_label_pairs(&conn, &board_id)?);
    let labels = query_all(&conn, db::labels::list_by_board(&board_id), label_from_row)
        .map_err(ApiErr::from_db("board labels"))?;

    // Tasks arrive ordered by (list_id, position); keep that order per list.
    let lists = lists
        .into_iter()
        .map(|list| {
            let (mine, rest): (Vec<_>, Vec<_>) =
                std::mem::take(&mut tasks).into_iter().partition(|t| t.list_id == list.id);
            tasks = rest;
            ListWithTasks { list, tasks: mine }
        })
        .collect();

    Ok(Json(BoardDetailResponse {
        board,
        role: access.role,
        lists,
        labels,
    }))
}

/// PUT /api/boards/{id} — title, description, team (admin+).
pub async fn update_board(
    State(db): State<Db>,
    user: AuthUser,
    Path(board_id): Path<String>,
    Json(req): Json<UpdateBoardRequest>,
) -> Result<Json<BoardResponse>, ApiErr> {
    let title = req
        .title
        .as_deref()
        .map(service::validate_board_title)
        .transpose()?;
    let description = req
        .description
        .as_deref()
        .map(|d| service::normalize_description(Some(d), BOARD_DESCRIPTION_MAX))
        .transpose()?;
    let team_id = req.team_id.as_deref().map(str::trim);

    let conn = db.conn();
    board_access(&conn, &board_id, &user.user_id, BoardAction::ManageSettings)?;

    if let Some(team_id) = team_id.filter(|t| !t.is_empty()) {
        require_team_admin(&conn, team_id, &user.user_id)?;
    }

    if let Some(title) = &title {
        exec(&conn, db::boards::update_title(&board_id, title))
            .map_err(ApiErr::from_db("update board title"))?;
    }
    if let Some(description) = &description {
        exec(
            &conn,
            db::boards::update_description(&board_id, description.as_deref()),
        )
        .map_err(ApiErr::from_db("update board description"))?;
    }
    if let Some(team_id) = team_id {
        let team_id = Some(team_id).filter(|t| !t.is_empty());
        exec(&conn, db::boards::update_team(&board_id, team_id))
            .map_err(ApiErr::from_db("update board team"))?;
    }

    load_board(&conn, &board_id).map(Json)
}

/// DELETE /api/boards/{id} — owner only; removes attachment files too.
pub async fn delete_board(
    State(db): State<Db>,
    user: AuthUser,
    Path(board_id): Path<String>,
) -> Result<StatusCode, ApiErr> {
    let storage_keys = {
        let mut conn = db.conn();
        board_access(&conn, &board_id, &user.user_id, BoardAction::Delete)?;

        let tx = conn.transaction()?;
        let keys = query_strings(&tx, db::attachments::storage_keys_for_board(&board_id))
            .map_err(ApiErr::from_db("board attachments"))?;
        exec(&tx, db::invitations::delete_for_target("board", &board_id))
            .map_err(ApiErr::from_db("delete board invitations"))?;
        exec(&tx, db::boards::delete(&board_id)).map_err(ApiErr::from_db("delete board"))?;
        tx.commit()?;
        keys
    };
    db.remove_attachments(&storage_keys).await;

    tracing::info!("board {board_id} deleted by {}", user.user_id);
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

/// GET /api/boards/{id}/members — direct board members.
pub async fn list_members(
    State(db): State<Db>,
    user: AuthUser,
    Path(board_id): Path<String>,
) -> Result<Json<ListMembersResponse>, ApiErr> {
    let conn = db.conn();
    board_access(&conn, &board_id, &user.user_id, BoardAction::View)?;
    let members = query_all(&conn, db::boards::member_list(&board_id), member_from_row)
        .map_err(ApiErr::from_db("list board members"))?;
    Ok(Json(ListMembersResponse { members }))
}

fn member_role(conn: &Connection, board_id: &str, user_id: &str) -> Result<BoardRole, ApiErr> {
    query_opt(conn, db::boards::member_role(board_id, user_id), |row| {
        board_role_col(row, 0)
    })
    .map_err(ApiErr::from_db("board member role"))?
    .flatten()
    .ok_or_else(|| ApiErr::not_found("member not found"))
}

/// PUT /api/boards/{id}/members/{user_id} — change a member's role.
pub async fn update_member_role(
    State(db): State<Db>,
    user: AuthUser,
    Path((board_id, member_id)): Path<(String, String)>,
    Json(req): Json<UpdateMemberRoleRequest>,
) -> Result<Json<ListMembersResponse>, ApiErr> {
    let target = BoardRole::parse(&req.role)
        .ok_or_else(|| ApiErr::bad_request("role must be viewer, editor, admin or owner"))?;

    let conn = db.conn();
    let access = board_role(&conn, &board_id, &user.user_id)?
        .ok_or_else(|| ApiErr::not_found("board not found"))?;
    let subject = member_role(&conn, &board_id, &member_id)?;

    if member_id == user.user_id
        || !permissions::can_manage_board_member(access.role, subject)
        || !permissions::can_grant_board_role(access.role, target)
    {
        return Err(ApiErr::forbidden("cannot change this member's role"));
    }

    exec(
        &conn,
        db::boards::member_update_role(&board_id, &member_id, target.as_str()),
    )
    .map_err(ApiErr::from_db("update board member role"))?;

    let members = query_all(&conn, db::boards::member_list(&board_id), member_from_row)
        .map_err(ApiErr::from_db("list board members"))?;
    Ok(Json(ListMembersResponse { members }))
}

/// DELETE /api/boards/{id}/members/{user_id} — leave, or remove a member.
pub async fn remove_member(
    State(db): State<Db>,
    user: AuthUser,
    Path((board_id, member_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiErr> {
    let conn = db.conn();
    let access = board_role(&conn, &board_id, &user.user_id)?
        .ok_or_else(|| ApiErr::not_found("board not found"))?;
    let subject = member_role(&conn, &board_id, &member_id)?;

    if member_id == user.user_id {
        if !permissions::can_leave_board(access.role) {
            return Err(ApiErr::forbidden("the owner cannot leave the board"));
        }
    } else if !permissions::can_manage_board_member(access.role, subject) {
        return Err(ApiErr::forbidden("cannot remove this member"));
    }

    exec(&conn, db::boards::member_delete(&board_id, &member_id))
        .map_err(ApiErr::from_db("remove board member"))?;
    Ok(StatusCode::NO_CONTENT)
}
