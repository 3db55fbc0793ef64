use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use taskboard_api::permissions::{self, TeamAction};
use taskboard_api::{
    CreateTeamRequest, ListMembersResponse, ListTeamsResponse, TeamDetailResponse, TeamResponse,
    TeamRole, TeamSummary, UpdateMemberRoleRequest, UpdateTeamRequest, db, service,
};

use crate::error::ApiErr;
use crate::extract::Json;
use crate::routes::access::team_role;
use crate::routes::auth::AuthUser;
use crate::storage::{
    Db, board_from_row, exec, member_from_row, query_all, query_i64, query_opt, team_from_row,
    team_role_col,
};

const TEAM_DESCRIPTION_MAX: usize = 1000;

fn load_team(conn: &rusqlite::Connection, team_id: &str) -> Result<TeamResponse, ApiErr> {
    query_opt(conn, db::teams::get_by_id(team_id), team_from_row)
        .map_err(ApiErr::from_db("load team"))?
        .ok_or_else(|| ApiErr::not_found("team not found"))
}

// ---------------------------------------------------------------------------
// Create / list
// ---------------------------------------------------------------------------

/// POST /api/teams — create a team. The creator becomes its owner.
pub async fn create_team(
    State(db): State<Db>,
    user: AuthUser,
    Json(req): Json<CreateTeamRequest>,
) -> Result<(StatusCode, Json<TeamResponse>), ApiErr> {
    let name = service::validate_team_name(&req.name)?;
    let description =
        service::normalize_description(req.description.as_deref(), TEAM_DESCRIPTION_MAX)?;
    let team_id = Uuid::new_v4().to_string();

    let mut conn = db.conn();
    let tx = conn.transaction()?;
    exec(
        &tx,
        db::teams::insert(&team_id, &name, description.as_deref(), &user.user_id),
    )
    .map_err(ApiErr::from_db("create team"))?;
    exec(
        &tx,
        db::teams::member_insert(&team_id, &user.user_id, TeamRole::Owner.as_str()),
    )
    .map_err(ApiErr::from_db("add team owner"))?;
    tx.commit()?;

    let team = load_team(&conn, &team_id)?;
    Ok((StatusCode::CREATED, Json(team)))
}

/// GET /api/teams — teams the caller belongs to, with the caller's role.
pub async fn list_my_teams(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<ListTeamsResponse>, ApiErr> {
    let conn = db.conn();
    let rows = query_all(&conn, db::teams::list_for_user(&user.user_id), |row| {
        Ok((team_from_row(row)?, team_role_col(row, 5)?))
    })
    .map_err(ApiErr::from_db("list teams"))?;

    let teams = rows
        .into_iter()
        .filter_map(|(team, role)| role.map(|role| TeamSummary { team, role }))
        .collect();
    Ok(Json(ListTeamsResponse { teams }))
}

// ---------------------------------------------------------------------------
// Detail / update / delete
// ---------------------------------------------------------------------------

/// GET /api/teams/{id} — team detail with member count and boards.
pub async fn get_team(
    State(db): State<Db>,
    user: AuthUser,
    Path(team_id): Path<String>,
) -> Result<Json<TeamDetailResponse>, ApiErr> {
    let conn = db.conn();
    let role = team_role(&conn, &team_id, &user.user_id)?;
    let team = load_team(&conn, &team_id)?;
    let member_count = query_i64(&conn, db::teams::member_count(&team_id))
        .map_err(ApiErr::from_db("team member count"))?;
    let boards = query_all(&conn, db::boards::list_by_team(&team_id), board_from_row)
        .map_err(ApiErr::from_db("team boards"))?;

    Ok(Json(TeamDetailResponse {
        team,
        role,
        member_count,
        boards,
    }))
}

/// PUT /api/teams/{id} — rename or re-describe (admin+).
pub async fn update_team(
    State(db): State<Db>,
    user: AuthUser,
    Path(team_id): Path<String>,
    Json(req): Json<UpdateTeamRequest>,
) -> Result<Json<TeamResponse>, ApiErr> {
    let name = req
        .name
        .as_deref()
        .map(service::validate_team_name)
        .transpose()?;
    let description = req
        .description
        .as_deref()
        .map(|d| service::normalize_description(Some(d), TEAM_DESCRIPTION_MAX))
        .transpose()?;

    let conn = db.conn();
    let role = team_role(&conn, &team_id, &user.user_id)?;
    permissions::require_team(role, TeamAction::Update)?;

    if let Some(name) = &name {
        exec(&conn, db::teams::update_name(&team_id, name))
            .map_err(ApiErr::from_db("update team name"))?;
    }
    if let Some(description) = &description {
        exec(
            &conn,
            db::teams::update_description(&team_id, description.as_deref()),
        )
        .map_err(ApiErr::from_db("update team description"))?;
    }

    load_team(&conn, &team_id).map(Json)
}

/// DELETE /api/teams/{id} — owner only. Boards of the team are detached.
pub async fn delete_team(
    State(db): State<Db>,
    user: AuthUser,
    Path(team_id): Path<String>,
) -> Result<StatusCode, ApiErr> {
    let mut conn = db.conn();
    let role = team_role(&conn, &team_id, &user.user_id)?;
    permissions::require_team(role, TeamAction::Delete)?;

    let tx = conn.transaction()?;
    exec(&tx, db::invitations::delete_for_target("team", &team_id))
        .map_err(ApiErr::from_db("delete team invitations"))?;
    exec(&tx, db::teams::delete(&team_id)).map_err(ApiErr::from_db("delete team"))?;
    tx.commit()?;

    tracing::info!("team {team_id} deleted by {}", user.user_id);
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

/// GET /api/teams/{id}/members
pub async fn list_members(
    State(db): State<Db>,
    user: AuthUser,
    Path(team_id): Path<String>,
) -> Result<Json<ListMembersResponse>, ApiErr> {
    let conn = db.conn();
    team_role(&conn, &team_id, &user.user_id)?;
    let members = query_all(&conn, db::teams::member_list(&team_id), member_from_row)
        .map_err(ApiErr::from_db("list team members"))?;
    Ok(Json(ListMembersResponse { members }))
}

fn subject_role(
    conn: &rusqlite::Connection,
    team_id: &str,
    user_id: &str,
) -> Result<TeamRole, ApiErr> {
    query_opt(conn, db::teams::member_role(team_id, user_id), |row| {
        team_role_col(row, 0)
    })
    .map_err(ApiErr::from_db("team member role"))?
    .flatten()
    .ok_or_else(|| ApiErr::not_found("member not found"))
}

/// PUT /api/teams/{id}/members/{user_id} — change a member's role.
pub async fn update_member_role(
    State(db): State<Db>,
    user: AuthUser,
    Path((team_id, member_id)): Path<(String, String)>,
    Json(req): Json<UpdateMemberRoleRequest>,
) -> Result<Json<ListMembersResponse>, ApiErr> {
    let target = TeamRole::parse(&req.role)
        .ok_or_else(|| ApiErr::bad_request("role must be member, admin or owner"))?;

    let conn = db.conn();
    let actor = team_role(&conn, &team_id, &user.user_id)?;
    let subject = subject_role(&conn, &team_id, &member_id)?;

    if member_id == user.user_id
        || !permissions::can_manage_team_member(actor, subject)
        || !permissions::can_grant_team_role(actor, target)
    {
        return Err(ApiErr::forbidden("cannot change this member's role"));
    }

    exec(
        &conn,
        db::teams::member_update_role(&team_id, &member_id, target.as_str()),
    )
    .map_err(ApiErr::from_db("update team member role"))?;

    let members = query_all(&conn, db::teams::member_list(&team_id), member_from_row)
        .map_err(ApiErr::from_db("list team members"))?;
    Ok(Json(ListMembersResponse { members }))
}

/// DELETE /api/teams/{id}/members/{user_id} — leave, or remove a member.
pub async fn remove_member(
    State(db): State<Db>,
    user: AuthUser,
    Path((team_id, member_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiErr> {
    let conn = db.conn();
    let actor = team_role(&conn, &team_id, &user.user_id)?;

    if member_id == user.user_id {
        if !permissions::can_leave_team(actor) {
            return Err(ApiErr::forbidden("the owner cannot leave the team"));
        }
    } else {
        let subject = subject_role(&conn, &team_id, &member_id)?;
        if !permissions::can_manage_team_member(actor, subject) {
            return Err(ApiErr::forbidden("cannot remove this member"));
        }
    }

    exec(&conn, db::teams::member_delete(&team_id, &member_id))
        .map_err(ApiErr::from_db("remove team member"))?;
    Ok(StatusCode::NO_CONTENT)
}
