use axum::{
    extract::{Path, State},
    http::StatusCode,
};

use taskboard_api::{
    ListNotificationsResponse, NotificationQuery, OkResponse, UnreadCountResponse, db,
};

use crate::error::ApiErr;
use crate::extract::{Json, Query};
use crate::routes::auth::AuthUser;
use crate::storage::{Db, exec, notification_from_row, query_all, query_i64};

const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 200;

/// GET /api/notifications?unread_only&limit — newest first.
pub async fn list_notifications(
    State(db): State<Db>,
    user: AuthUser,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<ListNotificationsResponse>, ApiErr> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let unread_only = query.unread_only.unwrap_or(false);

    let conn = db.conn();
    let notifications = query_all(
        &conn,
        db::notifications::list_for_user(&user.user_id, unread_only, u64::from(limit)),
        notification_from_row,
    )
    .map_err(ApiErr::from_db("list notifications"))?;
    Ok(Json(ListNotificationsResponse { notifications }))
}

/// GET /api/notifications/unread-count
pub async fn unread_count(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<UnreadCountResponse>, ApiErr> {
    let conn = db.conn();
    let count = query_i64(&conn, db::notifications::unread_count(&user.user_id))
        .map_err(ApiErr::from_db("unread count"))?;
    Ok(Json(UnreadCountResponse { count }))
}

/// POST /api/notifications/{id}/read
pub async fn mark_read(
    State(db): State<Db>,
    user: AuthUser,
    Path(notification_id): Path<String>,
) -> Result<Json<OkResponse>, ApiErr> {
    let conn = db.conn();
    let updated = exec(
        &conn,
        db::notifications::mark_read(&notification_id, &user.user_id),
    )
    .map_err(ApiErr::from_db("mark notification read"))?;
    if updated == 0 {
        return Err(ApiErr::not_found("notification not found"));
    }
    Ok(Json(OkResponse { ok: true }))
}

/// POST /api/notifications/read-all
pub async fn mark_all_read(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<OkResponse>, ApiErr> {
    let conn = db.conn();
    exec(&conn, db::notifications::mark_all_read(&user.user_id))
        .map_err(ApiErr::from_db("mark all read"))?;
    Ok(Json(OkResponse { ok: true }))
}

/// DELETE /api/notifications/{id}
pub async fn delete_notification(
    State(db): State<Db>,
    user: AuthUser,
    Path(notification_id): Path<String>,
) -> Result<StatusCode, ApiErr> {
    let conn = db.conn();
    let deleted = exec(
        &conn,
        db::notifications::delete(&notification_id, &user.user_id),
    )
    .map_err(ApiErr::from_db("delete notification"))?;
    if deleted == 0 {
        return Err(ApiErr::not_found("notification not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
