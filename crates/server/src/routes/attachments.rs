use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Multipart, Path, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use uuid::Uuid;

use taskboard_api::db::attachments::NewAttachment;
use taskboard_api::permissions::{self, BoardAction};
use taskboard_api::{AttachmentResponse, ListAttachmentsResponse, db, service};
use taskboard_config::ServerConfig;

use crate::error::ApiErr;
use crate::extract::Json;
use crate::routes::access::{BoardAccess, board_role, load_task, task_access};
use crate::routes::auth::AuthUser;
use crate::storage::{Db, attachment_from_row, exec, query_all, query_opt};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

fn multipart_err(e: MultipartError) -> ApiErr {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiErr::payload_too_large("attachment is too large")
    } else {
        ApiErr::bad_request(format!("invalid multipart body: {e}"))
    }
}

/// Attachment row, its storage key and the caller's role on the board.
fn attachment_access(
    conn: &Connection,
    attachment_id: &str,
    user_id: &str,
) -> Result<(AttachmentResponse, String, BoardAccess), ApiErr> {
    let (attachment, storage_key) =
        query_opt(conn, db::attachments::get_by_id(attachment_id), attachment_from_row)
            .map_err(ApiErr::from_db("load attachment"))?
            .ok_or_else(|| ApiErr::not_found("attachment not found"))?;
    let task = load_task(conn, &attachment.task_id)?;
    let access = board_role(conn, &task.board_id, user_id)?
        .ok_or_else(|| ApiErr::not_found("attachment not found"))?;
    Ok((attachment, storage_key, access))
}

/// `Content-Disposition` value with an ASCII-only filename.
fn content_disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() && c != '"' && c != '\\' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("attachment; filename=\"{safe}\"")
}

/// POST /api/tasks/{id}/attachments — multipart upload, field `file`.
pub async fn upload(
    State(db): State<Db>,
    State(config): State<Arc<ServerConfig>>,
    user: AuthUser,
    Path(task_id): Path<String>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<AttachmentResponse>), ApiErr> {
    {
        let conn = db.conn();
        task_access(&conn, &task_id, &user.user_id, BoardAction::EditContent)?;
    }

    let mut upload: Option<(String, String, Bytes)> = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_err)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = service::sanitize_filename(field.file_name().unwrap_or_default());
        let content_type = field
            .content_type()
            .filter(|ct| !ct.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let bytes = field.bytes().await.map_err(multipart_err)?;
        upload = Some((filename, content_type, bytes));
    }

    let (filename, content_type, bytes) =
        upload.ok_or_else(|| ApiErr::bad_request("missing 'file' field"))?;
    if bytes.is_empty() {
        return Err(ApiErr::bad_request("file is empty"));
    }
    if bytes.len() as u64 > config.storage.max_upload_bytes {
        return Err(ApiErr::payload_too_large(format!(
            "attachment exceeds {} bytes",
            config.storage.max_upload_bytes
        )));
    }

    let attachment_id = Uuid::new_v4().to_string();
    let storage_key = attachment_id.clone();
    db.write_attachment(&storage_key, &bytes)
        .await
        .map_err(ApiErr::from_db("write attachment"))?;

    let size_bytes = i64::try_from(bytes.len()).unwrap_or(i64::MAX);
    let inserted = exec(
        &db.conn(),
        db::attachments::insert(&NewAttachment {
            id: &attachment_id,
            task_id: &task_id,
            uploaded_by: &user.user_id,
            filename: &filename,
            content_type: &content_type,
            size_bytes,
            storage_key: &storage_key,
        }),
    );
    if let Err(e) = inserted {
        // The task may have been deleted while the body was streaming.
        db.remove_attachments(std::slice::from_ref(&storage_key))
            .await;
        return Err(ApiErr::from_db("insert attachment")(e));
    }

    let (attachment, _) = query_opt(
        &db.conn(),
        db::attachments::get_by_id(&attachment_id),
        attachment_from_row,
    )
    .map_err(ApiErr::from_db("load attachment"))?
    .ok_or_else(|| ApiErr::internal("attachment vanished after insert"))?;
    tracing::info!(
        "attachment {attachment_id} ({size_bytes} bytes) added to task {task_id}"
    );
    Ok((StatusCode::CREATED, Json(attachment)))
}

/// GET /api/tasks/{id}/attachments — newest first.
pub async fn list(
    State(db): State<Db>,
    user: AuthUser,
    Path(task_id): Path<String>,
) -> Result<Json<ListAttachmentsResponse>, ApiErr> {
    let conn = db.conn();
    task_access(&conn, &task_id, &user.user_id, BoardAction::View)?;
    let attachments = query_all(&conn, db::attachments::list_by_task(&task_id), |row| {
        attachment_from_row(row).map(|(attachment, _)| attachment)
    })
    .map_err(ApiErr::from_db("list attachments"))?;
    Ok(Json(ListAttachmentsResponse { attachments }))
}

/// GET /api/attachments/{id}/download
pub async fn download(
    State(db): State<Db>,
    user: AuthUser,
    Path(attachment_id): Path<String>,
) -> Result<Response, ApiErr> {
    let (attachment, storage_key) = {
        let conn = db.conn();
        let (attachment, storage_key, access) =
            attachment_access(&conn, &attachment_id, &user.user_id)?;
        access.require(BoardAction::View)?;
        (attachment, storage_key)
    };

    let bytes = db.read_attachment(&storage_key).await.map_err(|e| {
        tracing::error!("read attachment {storage_key}: {e:#}");
        ApiErr::not_found("attachment file is missing")
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, attachment.content_type.clone()),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(&attachment.filename),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// DELETE /api/attachments/{id} — uploader (editor+) or board admin.
pub async fn delete(
    State(db): State<Db>,
    user: AuthUser,
    Path(attachment_id): Path<String>,
) -> Result<StatusCode, ApiErr> {
    let storage_key = {
        let conn = db.conn();
        let (attachment, storage_key, access) =
            attachment_access(&conn, &attachment_id, &user.user_id)?;
        access.require(BoardAction::EditContent)?;
        if !permissions::can_delete_owned(
            &user.user_id,
            attachment.uploaded_by.as_deref(),
            access.role,
        ) {
            return Err(ApiErr::forbidden("cannot delete this attachment"));
        }
        exec(&conn, db::attachments::delete(&attachment_id))
            .map_err(ApiErr::from_db("delete attachment"))?;
        storage_key
    };
    db.remove_attachments(&[storage_key]).await;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_keeps_ascii_and_masks_the_rest() {
        assert_eq!(
            content_disposition("report 2026.pdf"),
            "attachment; filename=\"report 2026.pdf\""
        );
        assert_eq!(
            content_disposition("na\"me\\é.txt"),
            "attachment; filename=\"na_me__.txt\""
        );
    }
}
