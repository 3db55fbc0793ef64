use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{FromRef, FromRequestParts, State},
    http::{HeaderMap, StatusCode, header, request::Parts},
    response::{AppendHeaders, IntoResponse, Response},
};
use uuid::Uuid;

use taskboard_api::service::{self, TokenBundle};
use taskboard_api::{
    AuthRegisterRequest, ChangePasswordRequest, DeleteAccountRequest, LoginRequest, OkResponse,
    RefreshRequest, UpdateProfileRequest, UserResponse, crypto, db,
};
use taskboard_config::ServerConfig;

use crate::error::ApiErr;
use crate::extract::Json;
use crate::routes::optional_json;
use crate::storage::{self, Db, exec, query_i64, query_opt, query_strings, user_from_row};

pub const SESSION_COOKIE: &str = "taskboard_session";
pub const REFRESH_COOKIE: &str = "taskboard_refresh";

// ---------------------------------------------------------------------------
// Auth extractor
// ---------------------------------------------------------------------------

/// Authenticated user, from `Authorization: Bearer <jwt>` or the session
/// cookie.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
    pub nickname: String,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Db: FromRef<S>,
    Arc<ServerConfig>: FromRef<S>,
{
    type Rejection = ApiErr;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let db = Db::from_ref(state);
        let config = Arc::<ServerConfig>::from_ref(state);

        let token = bearer_token(&parts.headers)
            .or_else(|| cookie_value(&parts.headers, SESSION_COOKIE))
            .ok_or_else(|| ApiErr::unauthorized("missing credentials"))?;

        let user_id = service::resolve_access_token(token, &config.auth.jwt_secret, unix_now())?;

        let conn = db.conn();
        let user = query_opt(&conn, db::users::get_by_id(&user_id), user_from_row)
            .map_err(ApiErr::from_db("auth user lookup"))?
            .ok_or_else(|| ApiErr::unauthorized("user no longer exists"))?;

        Ok(AuthUser {
            user_id: user.id,
            email: user.email,
            nickname: user.nickname,
        })
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Value of cookie `name` from the `Cookie` header(s).
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
        .filter(|v| !v.is_empty())
}

pub fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Cookies
// ---------------------------------------------------------------------------

fn session_cookie(token: &str, max_age: u64, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!("{SESSION_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age}{secure}")
}

fn refresh_cookie(token: &str, max_age: u64, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!(
        "{REFRESH_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/api/auth; Max-Age={max_age}{secure}"
    )
}

fn token_cookies(bundle: &TokenBundle, secure: bool) -> AppendHeaders<[(header::HeaderName, String); 2]> {
    AppendHeaders([
        (
            header::SET_COOKIE,
            session_cookie(&bundle.response.access_token, crypto::JWT_EXPIRY_SECS, secure),
        ),
        (
            header::SET_COOKIE,
            refresh_cookie(
                &bundle.response.refresh_token,
                crypto::REFRESH_EXPIRY_SECS,
                secure,
            ),
        ),
    ])
}

fn cleared_cookies(secure: bool) -> AppendHeaders<[(header::HeaderName, String); 2]> {
    AppendHeaders([
        (header::SET_COOKIE, session_cookie("", 0, secure)),
        (header::SET_COOKIE, refresh_cookie("", 0, secure)),
    ])
}

/// Create a refresh token row and build the token response.
fn issue_tokens(
    conn: &rusqlite::Connection,
    config: &ServerConfig,
    user_id: &str,
    nickname: &str,
) -> Result<TokenBundle, ApiErr> {
    let bundle =
        service::prepare_token_bundle(&config.auth.jwt_secret, user_id, nickname, unix_now())?;
    exec(
        conn,
        db::users::insert_refresh_token(
            &bundle.token_id,
            user_id,
            &bundle.token_hash,
            &bundle.expires_at,
        ),
    )
    .map_err(ApiErr::from_db("insert refresh token"))?;
    Ok(bundle)
}

fn require_auth_configured(config: &ServerConfig) -> Result<(), ApiErr> {
    if config.auth_enabled() {
        Ok(())
    } else {
        Err(ApiErr::unauthorized("authentication not configured"))
    }
}

/// Refresh token from a JSON body, falling back to the refresh cookie.
fn refresh_token_from(headers: &HeaderMap, body: &Bytes) -> Result<Option<String>, ApiErr> {
    let req: RefreshRequest = optional_json(body)?;
    Ok(req
        .refresh_token
        .filter(|t| !t.is_empty())
        .or_else(|| cookie_value(headers, REFRESH_COOKIE).map(str::to_string)))
}

// ---------------------------------------------------------------------------
// Register / login
// ---------------------------------------------------------------------------

/// POST /api/auth/register — create an account and sign in.
pub async fn register(
    State(db): State<Db>,
    State(config): State<Arc<ServerConfig>>,
    Json(req): Json<AuthRegisterRequest>,
) -> Result<Response, ApiErr> {
    if !config.auth.registration_open {
        return Err(ApiErr::forbidden("registration is currently closed"));
    }
    require_auth_configured(&config)?;

    let email = service::validate_email(&req.email)?;
    let nickname = service::validate_nickname(&req.nickname)?;
    service::validate_password(&req.password)?;
    let password_hash = crypto::hash_password(&req.password, config.auth.password_iterations)?;

    let user_id = Uuid::new_v4().to_string();
    let conn = db.conn();

    if query_i64(&conn, db::users::email_count(&email)).map_err(ApiErr::from_db("email check"))? > 0
    {
        return Err(ApiErr::conflict("email already registered"));
    }
    if query_i64(&conn, db::users::nickname_count(&nickname, None))
        .map_err(ApiErr::from_db("nickname check"))?
        > 0
    {
        return Err(ApiErr::conflict("nickname already taken"));
    }

    match exec(
        &conn,
        db::users::insert(&user_id, &email, &nickname, &password_hash),
    ) {
        Ok(_) => {}
        Err(e) if storage::is_constraint_violation(&e) => {
            return Err(ApiErr::conflict("email or nickname already taken"));
        }
        Err(e) => return Err(ApiErr::from_db("register")(e)),
    }

    let bundle = issue_tokens(&conn, &config, &user_id, &nickname)?;
    tracing::info!("registered user {user_id}");

    Ok((
        StatusCode::CREATED,
        token_cookies(&bundle, config.auth.cookie_secure),
        Json(bundle.response),
    )
        .into_response())
}

/// POST /api/auth/login — email + password.
pub async fn login(
    State(db): State<Db>,
    State(config): State<Arc<ServerConfig>>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, ApiErr> {
    require_auth_configured(&config)?;
    let invalid = || ApiErr::unauthorized("invalid email or password");

    let email = service::validate_email(&req.email).map_err(|_| invalid())?;
    let (user_id, nickname, password_hash) = {
        let conn = db.conn();
        query_opt(&conn, db::users::get_by_email_for_login(&email), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })
        .map_err(ApiErr::from_db("login lookup"))?
        .ok_or_else(invalid)?
    };

    if !crypto::verify_password(&req.password, &password_hash) {
        return Err(invalid());
    }

    let conn = db.conn();
    let bundle = issue_tokens(&conn, &config, &user_id, &nickname)?;

    Ok((
        token_cookies(&bundle, config.auth.cookie_secure),
        Json(bundle.response),
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Refresh / logout
// ---------------------------------------------------------------------------

/// POST /api/auth/refresh — rotate the refresh token.
pub async fn refresh(
    State(db): State<Db>,
    State(config): State<Arc<ServerConfig>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiErr> {
    require_auth_configured(&config)?;
    let token = refresh_token_from(&headers, &body)?
        .ok_or_else(|| ApiErr::unauthorized("missing refresh token"))?;
    let token_hash = crypto::hash_token(&token);

    let conn = db.conn();
    let (token_id, user_id, expires_at, nickname) =
        query_opt(&conn, db::users::lookup_refresh_token(&token_hash), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })
        .map_err(ApiErr::from_db("refresh lookup"))?
        .ok_or_else(|| ApiErr::unauthorized("invalid refresh token"))?;

    exec(&conn, db::users::delete_refresh_token_by_id(&token_id))
        .map_err(ApiErr::from_db("delete refresh token"))?;

    if expires_at <= service::now_sqlite() {
        return Err(ApiErr::unauthorized("refresh token expired"));
    }

    let bundle = issue_tokens(&conn, &config, &user_id, &nickname)?;
    Ok((
        token_cookies(&bundle, config.auth.cookie_secure),
        Json(bundle.response),
    )
        .into_response())
}

/// POST /api/auth/logout — revoke the refresh token and clear cookies.
pub async fn logout(
    State(db): State<Db>,
    State(config): State<Arc<ServerConfig>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiErr> {
    if let Some(token) = refresh_token_from(&headers, &body)? {
        let conn = db.conn();
        exec(
            &conn,
            db::users::delete_refresh_token(&crypto::hash_token(&token)),
        )
        .map_err(ApiErr::from_db("logout"))?;
    }
    Ok((
        cleared_cookies(config.auth.cookie_secure),
        Json(OkResponse { ok: true }),
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

fn load_user(conn: &rusqlite::Connection, user_id: &str) -> Result<UserResponse, ApiErr> {
    query_opt(conn, db::users::get_by_id(user_id), user_from_row)
        .map_err(ApiErr::from_db("load user"))?
        .ok_or_else(|| ApiErr::not_found("user not found"))
}

/// GET /api/auth/me
pub async fn me(State(db): State<Db>, user: AuthUser) -> Result<Json<UserResponse>, ApiErr> {
    let conn = db.conn();
    load_user(&conn, &user.user_id).map(Json)
}

/// PUT /api/auth/me — change nickname and/or avatar.
pub async fn update_me(
    State(db): State<Db>,
    user: AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiErr> {
    let nickname = req
        .nickname
        .as_deref()
        .map(service::validate_nickname)
        .transpose()?;
    let avatar = req
        .avatar_url
        .as_deref()
        .map(service::normalize_avatar_url)
        .transpose()?;

    let conn = db.conn();
    if let Some(nickname) = &nickname {
        let taken = query_i64(
            &conn,
            db::users::nickname_count(nickname, Some(&user.user_id)),
        )
        .map_err(ApiErr::from_db("nickname check"))?;
        if taken > 0 {
            return Err(ApiErr::conflict("nickname already taken"));
        }
        exec(&conn, db::users::update_nickname(&user.user_id, nickname))
            .map_err(ApiErr::from_db("update nickname"))?;
    }
    if let Some(avatar) = avatar {
        exec(
            &conn,
            db::users::update_avatar(&user.user_id, avatar.as_deref()),
        )
        .map_err(ApiErr::from_db("update avatar"))?;
    }

    load_user(&conn, &user.user_id).map(Json)
}

fn current_password_hash(db: &Db, user_id: &str) -> Result<String, ApiErr> {
    let conn = db.conn();
    query_opt(&conn, db::users::get_password_hash(user_id), |row| row.get(0))
        .map_err(ApiErr::from_db("password lookup"))?
        .ok_or_else(|| ApiErr::not_found("user not found"))
}

/// PUT /api/auth/password — change password and revoke refresh tokens.
pub async fn change_password(
    State(db): State<Db>,
    State(config): State<Arc<ServerConfig>>,
    user: AuthUser,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<OkResponse>, ApiErr> {
    let current_hash = current_password_hash(&db, &user.user_id)?;
    if !crypto::verify_password(&req.current_password, &current_hash) {
        return Err(ApiErr::unauthorized("current password is incorrect"));
    }
    service::validate_password(&req.new_password)?;
    let new_hash = crypto::hash_password(&req.new_password, config.auth.password_iterations)?;

    let conn = db.conn();
    exec(&conn, db::users::update_password(&user.user_id, &new_hash))
        .map_err(ApiErr::from_db("update password"))?;
    exec(&conn, db::users::delete_refresh_tokens_for_user(&user.user_id))
        .map_err(ApiErr::from_db("revoke refresh tokens"))?;

    Ok(Json(OkResponse { ok: true }))
}

/// DELETE /api/auth/me — delete the account, its boards and its teams.
pub async fn delete_me(
    State(db): State<Db>,
    State(config): State<Arc<ServerConfig>>,
    user: AuthUser,
    Json(req): Json<DeleteAccountRequest>,
) -> Result<Response, ApiErr> {
    let current_hash = current_password_hash(&db, &user.user_id)?;
    if !crypto::verify_password(&req.password, &current_hash) {
        return Err(ApiErr::unauthorized("password is incorrect"));
    }

    let storage_keys = {
        let mut conn = db.conn();
        delete_account(&mut conn, &user.user_id).map_err(ApiErr::from_db("delete account"))?
    };
    db.remove_attachments(&storage_keys).await;
    tracing::info!("deleted user {}", user.user_id);

    Ok((
        StatusCode::NO_CONTENT,
        cleared_cookies(config.auth.cookie_secure),
    )
        .into_response())
}

/// Remove owned boards, owned teams, then the user, in one transaction.
/// Returns the storage keys of attachments that lost their rows.
fn delete_account(conn: &mut rusqlite::Connection, user_id: &str) -> rusqlite::Result<Vec<String>> {
    let tx = conn.transaction()?;

    let storage_keys = query_strings(&tx, db::attachments::storage_keys_for_owner(user_id))?;

    for board_id in query_strings(&tx, db::boards::owned_by(user_id))? {
        exec(&tx, db::invitations::delete_for_target("board", &board_id))?;
        exec(&tx, db::boards::delete(&board_id))?;
    }
    for team_id in query_strings(&tx, db::teams::owned_by(user_id))? {
        exec(&tx, db::invitations::delete_for_target("team", &team_id))?;
        exec(&tx, db::teams::delete(&team_id))?;
    }
    exec(&tx, db::users::delete(user_id))?;

    // Dropping `tx` without commit rolls back.
    tx.commit()?;
    Ok(storage_keys)
}
