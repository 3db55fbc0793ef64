use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use rusqlite::Connection;
use uuid::Uuid;

use taskboard_api::db::invitations::NewInvitation;
use taskboard_api::permissions::{self, BoardAction, TeamAction};
use taskboard_api::{
    AcceptInvitationResponse, BoardRole, CreateInvitationRequest, InvitationResponse,
    InvitationStatus, InvitationTarget, ListInvitationsResponse, OkResponse, TeamRole, db, notify,
    service,
};
use taskboard_config::ServerConfig;

use crate::error::ApiErr;
use crate::extract::Json;
use crate::routes::access::{board_access, board_role, store_notices, team_role};
use crate::routes::auth::AuthUser;
use crate::storage::{
    Db, board_role_col, exec, invitation_from_row, query_all, query_i64, query_opt,
    team_role_col,
};

fn load_invitation(conn: &Connection, invitation_id: &str) -> Result<InvitationResponse, ApiErr> {
    query_opt(conn, db::invitations::get_by_id(invitation_id), invitation_from_row)
        .map_err(ApiErr::from_db("load invitation"))?
        .ok_or_else(|| ApiErr::not_found("invitation not found"))
}

fn direct_board_role(
    conn: &Connection,
    board_id: &str,
    user_id: &str,
) -> Result<Option<BoardRole>, ApiErr> {
    query_opt(conn, db::boards::member_role(board_id, user_id), |row| {
        board_role_col(row, 0)
    })
    .map(Option::flatten)
    .map_err(ApiErr::from_db("board member role"))
}

fn team_member_role(
    conn: &Connection,
    team_id: &str,
    user_id: &str,
) -> Result<Option<TeamRole>, ApiErr> {
    query_opt(conn, db::teams::member_role(team_id, user_id), |row| {
        team_role_col(row, 0)
    })
    .map(Option::flatten)
    .map_err(ApiErr::from_db("team member role"))
}

/// Whether `user_id` already belongs to the invitation target.
fn is_member(
    conn: &Connection,
    target: InvitationTarget,
    target_id: &str,
    user_id: &str,
) -> Result<bool, ApiErr> {
    match target {
        InvitationTarget::Board => {
            let owner = query_opt(conn, db::boards::get_by_id(target_id), |row| {
                row.get::<_, String>(3)
            })
            .map_err(ApiErr::from_db("board owner"))?;
            Ok(owner.as_deref() == Some(user_id)
                || direct_board_role(conn, target_id, user_id)?.is_some())
        }
        InvitationTarget::Team => Ok(team_member_role(conn, target_id, user_id)?.is_some()),
    }
}

/// Check the move to `next` is allowed. A pending invitation past its
/// expiry is persisted as `expired` and rejected.
fn ensure_transition(
    conn: &Connection,
    invitation: &InvitationResponse,
    next: InvitationStatus,
) -> Result<(), ApiErr> {
    invitation.status.transition(next)?;
    let now = service::now_sqlite();
    if invitation.expires_at <= now {
        exec(
            conn,
            db::invitations::update_status(
                &invitation.id,
                InvitationStatus::Expired.as_str(),
                &now,
            ),
        )
        .map_err(ApiErr::from_db("expire invitation"))?;
        return Err(ApiErr::bad_request("invitation has expired"));
    }
    Ok(())
}

fn set_status(
    conn: &Connection,
    invitation_id: &str,
    status: InvitationStatus,
) -> Result<(), ApiErr> {
    let updated = exec(
        conn,
        db::invitations::update_status(invitation_id, status.as_str(), &service::now_sqlite()),
    )
    .map_err(ApiErr::from_db("update invitation"))?;
    if updated == 0 {
        return Err(ApiErr::bad_request("invitation is no longer pending"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// Insert a validated invitation and notify an existing invitee.
fn create_invitation(
    conn: &Connection,
    config: &ServerConfig,
    user: &AuthUser,
    target: InvitationTarget,
    target_id: &str,
    email: &str,
    role: &str,
) -> Result<InvitationResponse, ApiErr> {
    let invitee_id = query_opt(conn, db::users::id_by_email(email), |row| {
        row.get::<_, String>(0)
    })
    .map_err(ApiErr::from_db("invitee lookup"))?;

    if let Some(invitee_id) = &invitee_id {
        if is_member(conn, target, target_id, invitee_id)? {
            return Err(ApiErr::conflict("user is already a member"));
        }
    }

    let now = chrono::Utc::now();
    let now_sql = service::format_sqlite(now);
    let pending = query_i64(
        conn,
        db::invitations::pending_count(target.as_str(), target_id, email, &now_sql),
    )
    .map_err(ApiErr::from_db("pending invitation check"))?;
    if pending > 0 {
        return Err(ApiErr::conflict(
            "a pending invitation already exists for this email",
        ));
    }

    let invitation_id = Uuid::new_v4().to_string();
    let expires_at = service::expiry_sqlite(now, config.invitations.ttl_days)?;
    exec(
        conn,
        db::invitations::insert(&NewInvitation {
            id: &invitation_id,
            target_type: target.as_str(),
            target_id,
            email,
            role,
            invited_by: &user.user_id,
            expires_at: &expires_at,
        }),
    )
    .map_err(ApiErr::from_db("create invitation"))?;

    let invitation = load_invitation(conn, &invitation_id)?;
    if let Some(invitee_id) = &invitee_id {
        let notice = notify::invitation_received_notice(
            invitee_id,
            &user.nickname,
            target,
            &invitation.target_name,
            role,
        );
        let board_id = (target == InvitationTarget::Board).then_some(target_id);
        store_notices(conn, &[notice], board_id, None, &user.user_id);
    }

    tracing::info!("{} invited {email} to {target} {target_id}", user.user_id);
    Ok(invitation)
}

/// POST /api/boards/{id}/invitations
pub async fn invite_to_board(
    State(db): State<Db>,
    State(config): State<Arc<ServerConfig>>,
    user: AuthUser,
    Path(board_id): Path<String>,
    Json(req): Json<CreateInvitationRequest>,
) -> Result<(StatusCode, Json<InvitationResponse>), ApiErr> {
    let email = service::validate_email(&req.email)?;
    let role = match req.role.as_deref() {
        None | Some("") => BoardRole::Viewer,
        Some(r) => BoardRole::parse(r)
            .ok_or_else(|| ApiErr::bad_request("role must be viewer, editor or admin"))?,
    };

    let conn = db.conn();
    let access = board_access(&conn, &board_id, &user.user_id, BoardAction::ManageMembers)?;
    if !permissions::can_grant_board_role(access.role, role) {
        return Err(ApiErr::forbidden(format!("cannot invite as {role}")));
    }

    let invitation = create_invitation(
        &conn,
        &config,
        &user,
        InvitationTarget::Board,
        &board_id,
        &email,
        role.as_str(),
    )?;
    Ok((StatusCode::CREATED, Json(invitation)))
}

/// POST /api/teams/{id}/invitations
pub async fn invite_to_team(
    State(db): State<Db>,
    State(config): State<Arc<ServerConfig>>,
    user: AuthUser,
    Path(team_id): Path<String>,
    Json(req): Json<CreateInvitationRequest>,
) -> Result<(StatusCode, Json<InvitationResponse>), ApiErr> {
    let email = service::validate_email(&req.email)?;
    let role = match req.role.as_deref() {
        None | Some("") => TeamRole::Member,
        Some(r) => TeamRole::parse(r)
            .ok_or_else(|| ApiErr::bad_request("role must be member or admin"))?,
    };

    let conn = db.conn();
    let actor = team_role(&conn, &team_id, &user.user_id)?;
    permissions::require_team(actor, TeamAction::Invite)?;
    if !permissions::can_grant_team_role(actor, role) {
        return Err(ApiErr::forbidden(format!("cannot invite as {role}")));
    }

    let invitation = create_invitation(
        &conn,
        &config,
        &user,
        InvitationTarget::Team,
        &team_id,
        &email,
        role.as_str(),
    )?;
    Ok((StatusCode::CREATED, Json(invitation)))
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// GET /api/boards/{id}/invitations — pending only (admin+).
pub async fn list_board_invitations(
    State(db): State<Db>,
    user: AuthUser,
    Path(board_id): Path<String>,
) -> Result<Json<ListInvitationsResponse>, ApiErr> {
    let conn = db.conn();
    board_access(&conn, &board_id, &user.user_id, BoardAction::ManageMembers)?;
    let invitations = query_all(
        &conn,
        db::invitations::list_for_target("board", &board_id, &service::now_sqlite()),
        invitation_from_row,
    )
    .map_err(ApiErr::from_db("list board invitations"))?;
    Ok(Json(ListInvitationsResponse { invitations }))
}

/// GET /api/teams/{id}/invitations — pending only (admin+).
pub async fn list_team_invitations(
    State(db): State<Db>,
    user: AuthUser,
    Path(team_id): Path<String>,
) -> Result<Json<ListInvitationsResponse>, ApiErr> {
    let conn = db.conn();
    let role = team_role(&conn, &team_id, &user.user_id)?;
    permissions::require_team(role, TeamAction::Invite)?;
    let invitations = query_all(
        &conn,
        db::invitations::list_for_target("team", &team_id, &service::now_sqlite()),
        invitation_from_row,
    )
    .map_err(ApiErr::from_db("list team invitations"))?;
    Ok(Json(ListInvitationsResponse { invitations }))
}

/// GET /api/invitations — pending invitations addressed to the caller.
pub async fn list_my_invitations(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<ListInvitationsResponse>, ApiErr> {
    let conn = db.conn();
    let invitations = query_all(
        &conn,
        db::invitations::list_for_email(&user.email, &service::now_sqlite()),
        invitation_from_row,
    )
    .map_err(ApiErr::from_db("list my invitations"))?;
    Ok(Json(ListInvitationsResponse { invitations }))
}

// ---------------------------------------------------------------------------
// Respond
// ---------------------------------------------------------------------------

fn addressed_to(invitation: &InvitationResponse, user: &AuthUser) -> Result<(), ApiErr> {
    if invitation.email != user.email {
        return Err(ApiErr::forbidden(
            "this invitation is addressed to another email",
        ));
    }
    Ok(())
}

/// POST /api/invitations/{id}/accept — join the board or team.
pub async fn accept_invitation(
    State(db): State<Db>,
    user: AuthUser,
    Path(invitation_id): Path<String>,
) -> Result<Json<AcceptInvitationResponse>, ApiErr> {
    let mut conn = db.conn();
    let invitation = load_invitation(&conn, &invitation_id)?;
    addressed_to(&invitation, &user)?;
    ensure_transition(&conn, &invitation, InvitationStatus::Accepted)?;

    let target = invitation.target_type;
    let target_id = invitation.target_id.as_str();
    let target_exists = match target {
        InvitationTarget::Board => {
            query_opt(&conn, db::boards::get_by_id(target_id), |_| Ok(()))?.is_some()
        }
        InvitationTarget::Team => {
            query_opt(&conn, db::teams::get_by_id(target_id), |_| Ok(()))?.is_some()
        }
    };
    if !target_exists {
        return Err(ApiErr::not_found(format!("{target} no longer exists")));
    }

    if is_member(&conn, target, target_id, &user.user_id)? {
        set_status(&conn, &invitation_id, InvitationStatus::Accepted)?;
        return Err(ApiErr::conflict("already a member"));
    }

    let tx = conn.transaction()?;
    set_status(&tx, &invitation_id, InvitationStatus::Accepted)?;
    let insert = match target {
        InvitationTarget::Board => {
            db::boards::member_insert(target_id, &user.user_id, &invitation.role)
        }
        InvitationTarget::Team => {
            db::teams::member_insert(target_id, &user.user_id, &invitation.role)
        }
    };
    exec(&tx, insert).map_err(ApiErr::from_db("add member"))?;
    tx.commit()?;

    if let Some(notice) = notify::invitation_accepted_notice(
        &invitation.invited_by,
        &user.user_id,
        &user.nickname,
        target,
        &invitation.target_name,
    ) {
        let board_id = (target == InvitationTarget::Board).then_some(target_id);
        store_notices(&conn, &[notice], board_id, None, &user.user_id);
    }

    tracing::info!("{} joined {target} {target_id}", user.user_id);
    Ok(Json(AcceptInvitationResponse {
        target_type: target,
        target_id: invitation.target_id.clone(),
        role: invitation.role.clone(),
    }))
}

/// POST /api/invitations/{id}/decline
pub async fn decline_invitation(
    State(db): State<Db>,
    user: AuthUser,
    Path(invitation_id): Path<String>,
) -> Result<Json<OkResponse>, ApiErr> {
    let conn = db.conn();
    let invitation = load_invitation(&conn, &invitation_id)?;
    addressed_to(&invitation, &user)?;
    ensure_transition(&conn, &invitation, InvitationStatus::Declined)?;
    set_status(&conn, &invitation_id, InvitationStatus::Declined)?;
    Ok(Json(OkResponse { ok: true }))
}

/// DELETE /api/invitations/{id} — cancel; the inviter or a target admin.
pub async fn cancel_invitation(
    State(db): State<Db>,
    user: AuthUser,
    Path(invitation_id): Path<String>,
) -> Result<StatusCode, ApiErr> {
    let conn = db.conn();
    let invitation = load_invitation(&conn, &invitation_id)?;

    if invitation.invited_by != user.user_id {
        let target_id = invitation.target_id.as_str();
        let allowed = match invitation.target_type {
            InvitationTarget::Board => board_role(&conn, target_id, &user.user_id)?
                .map(|a| permissions::board_allows(a.role, BoardAction::ManageMembers)),
            InvitationTarget::Team => team_member_role(&conn, target_id, &user.user_id)?
                .map(|r| permissions::team_allows(r, TeamAction::Invite)),
        };
        match allowed {
            None => return Err(ApiErr::not_found("invitation not found")),
            Some(false) => return Err(ApiErr::forbidden("cannot cancel this invitation")),
            Some(true) => {}
        }
    }

    ensure_transition(&conn, &invitation, InvitationStatus::Cancelled)?;
    set_status(&conn, &invitation_id, InvitationStatus::Cancelled)?;
    Ok(StatusCode::NO_CONTENT)
}
