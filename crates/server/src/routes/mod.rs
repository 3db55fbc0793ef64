pub mod access;
pub mod attachments;
pub mod auth;
pub mod boards;
pub mod comments;
pub mod health;
pub mod invitations;
pub mod labels;
pub mod lists;
pub mod notifications;
pub mod tasks;
pub mod teams;
pub mod time_entries;

use axum::body::Bytes;
use serde::de::DeserializeOwned;

use crate::error::ApiErr;

/// Parse a JSON body that clients may omit entirely.
pub(crate) fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiErr> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiErr::bad_request(format!("invalid JSON body: {e}")))
}
