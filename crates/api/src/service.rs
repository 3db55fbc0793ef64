//! Shared business logic: framework-agnostic pure functions.
//!
//! Route handlers stay thin adapters: they call these for validation and
//! token bookkeeping and only run SQL themselves.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

use crate::{AuthTokenResponse, ServiceError};

/// SQLite `datetime('now')` text format.
pub const SQLITE_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ─── Validation ─────────────────────────────────────────────────────────────

/// Validate and normalize an email address. Returns the lowercased, trimmed email.
pub fn validate_email(email: &str) -> Result<String, ServiceError> {
    let email = email.trim().to_lowercase();
    let valid_shape = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if !valid_shape || email.len() > 254 || email.chars().any(char::is_whitespace) {
        return Err(ServiceError::BadRequest("invalid email address".into()));
    }
    Ok(email)
}

/// Validate a password (8-128 bytes).
pub fn validate_password(password: &str) -> Result<(), ServiceError> {
    if password.len() < 8 {
        return Err(ServiceError::BadRequest(
            "password must be at least 8 characters".into(),
        ));
    }
    if password.len() > 128 {
        return Err(ServiceError::BadRequest(
            "password must be at most 128 characters".into(),
        ));
    }
    Ok(())
}

/// Validate and normalize a user nickname. Returns the trimmed nickname.
pub fn validate_nickname(nickname: &str) -> Result<String, ServiceError> {
    let trimmed = nickname.trim().to_string();
    let len = trimmed.chars().count();
    if len == 0 || len > 64 {
        return Err(ServiceError::BadRequest(
            "nickname must be 1-64 characters".into(),
        ));
    }
    if trimmed.contains('@') || trimmed.chars().any(char::is_whitespace) {
        return Err(ServiceError::BadRequest(
            "nickname must not contain '@' or whitespace".into(),
        ));
    }
    Ok(trimmed)
}

/// Trim `value` and require 1..=`max` characters. `what` names the field in
/// the error message.
pub fn validate_name(value: &str, what: &str, max: usize) -> Result<String, ServiceError> {
    let trimmed = value.trim().to_string();
    let len = trimmed.chars().count();
    if len == 0 || len > max {
        return Err(ServiceError::BadRequest(format!(
            "{what} must be 1-{max} characters"
        )));
    }
    Ok(trimmed)
}

pub fn validate_team_name(name: &str) -> Result<String, ServiceError> {
    validate_name(name, "team name", 100)
}

pub fn validate_board_title(title: &str) -> Result<String, ServiceError> {
    validate_name(title, "board title", 200)
}

pub fn validate_list_title(title: &str) -> Result<String, ServiceError> {
    validate_name(title, "list title", 200)
}

pub fn validate_task_title(title: &str) -> Result<String, ServiceError> {
    validate_name(title, "task title", 500)
}

pub fn validate_label_name(name: &str) -> Result<String, ServiceError> {
    validate_name(name, "label name", 50)
}

pub fn validate_comment_body(body: &str) -> Result<String, ServiceError> {
    validate_name(body, "comment", 10_000)
}

/// Optional free text: blank becomes `None`, otherwise at most `max` characters.
pub fn normalize_description(
    value: Option<&str>,
    max: usize,
) -> Result<Option<String>, ServiceError> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if value.chars().count() > max {
        return Err(ServiceError::BadRequest(format!(
            "description must be at most {max} characters"
        )));
    }
    Ok(Some(value.to_string()))
}

/// Validate a `#rrggbb` colour. Returns it lowercased.
pub fn validate_color(color: &str) -> Result<String, ServiceError> {
    let color = color.trim().to_lowercase();
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(ServiceError::BadRequest(
            "color must be a hex value like #1a2b3c".into(),
        ));
    }
    Ok(color)
}

/// Validate a `YYYY-MM-DD` due date.
pub fn validate_due_date(date: &str) -> Result<String, ServiceError> {
    let date = date.trim();
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| ServiceError::BadRequest("due_date must be YYYY-MM-DD".into()))
}

/// Avatar URLs must be http(s). Empty clears the avatar.
pub fn normalize_avatar_url(url: &str) -> Result<Option<String>, ServiceError> {
    let url = url.trim();
    if url.is_empty() {
        return Ok(None);
    }
    if !(url.starts_with("https://") || url.starts_with("http://")) || url.len() > 2048 {
        return Err(ServiceError::BadRequest(
            "avatar_url must be an http(s) URL".into(),
        ));
    }
    Ok(Some(url.to_string()))
}

/// Strip path components and control characters from an uploaded filename.
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control())
        .take(255)
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

// ─── Positions ──────────────────────────────────────────────────────────────

/// Clamp a requested insert position into `0..=len`. `None` appends.
pub fn insert_position(requested: Option<i64>, len: i64) -> i64 {
    requested.map_or(len, |p| p.clamp(0, len))
}

/// Clamp a move target into `0..=len-1` for a sequence of `len` items that
/// already contains the item being moved.
pub fn move_position(requested: i64, len: i64) -> i64 {
    requested.clamp(0, (len - 1).max(0))
}

// ─── Mentions ───────────────────────────────────────────────────────────────

static MENTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^A-Za-z0-9_.@-])@([A-Za-z0-9_.-]{1,64})").expect("valid mention regex")
});

/// Nicknames mentioned as `@nickname`, first occurrence order, de-duplicated
/// case-insensitively. Email addresses are not mentions.
pub fn extract_mentions(body: &str) -> Vec<String> {
    let mut seen = Vec::<String>::new();
    for cap in MENTION_RE.captures_iter(body) {
        let nick = cap[1].trim_end_matches(['.', '-']).to_string();
        if nick.is_empty() {
            continue;
        }
        if !seen.iter().any(|s| s.eq_ignore_ascii_case(&nick)) {
            seen.push(nick);
        }
    }
    seen
}

// ─── Time ───────────────────────────────────────────────────────────────────

/// Longest accepted manual time entry.
pub const MAX_TIME_ENTRY_SECS: i64 = 7 * 24 * 3600;

pub fn format_sqlite(ts: DateTime<Utc>) -> String {
    ts.format(SQLITE_DATETIME_FORMAT).to_string()
}

pub fn now_sqlite() -> String {
    format_sqlite(Utc::now())
}

/// `now + days` in SQLite datetime format.
pub fn expiry_sqlite(now: DateTime<Utc>, days: u32) -> Result<String, ServiceError> {
    chrono::Duration::try_days(i64::from(days))
        .and_then(|d| now.checked_add_signed(d))
        .map(format_sqlite)
        .ok_or_else(|| ServiceError::Internal(format!("expiry of {days} days is out of range")))
}

/// Parse a timestamp stored by SQLite (`YYYY-MM-DD HH:MM:SS`, UTC).
pub fn parse_sqlite(ts: &str) -> Result<DateTime<Utc>, ServiceError> {
    NaiveDateTime::parse_from_str(ts, SQLITE_DATETIME_FORMAT)
        .map(|n| n.and_utc())
        .map_err(|e| ServiceError::Internal(format!("bad stored timestamp {ts:?}: {e}")))
}

/// Validate a manual time entry. Returns `(started_at, ended_at, seconds)`
/// with the timestamps in SQLite format.
pub fn validate_time_range(
    started_at: &str,
    ended_at: &str,
) -> Result<(String, String, i64), ServiceError> {
    let parse = |s: &str, field: &str| {
        DateTime::parse_from_rfc3339(s.trim())
            .map(|d| d.with_timezone(&Utc))
            .map_err(|_| ServiceError::BadRequest(format!("{field} must be an RFC 3339 timestamp")))
    };
    let start = parse(started_at, "started_at")?;
    let end = parse(ended_at, "ended_at")?;
    let seconds = (end - start).num_seconds();
    if seconds <= 0 {
        return Err(ServiceError::BadRequest(
            "ended_at must be after started_at".into(),
        ));
    }
    if seconds > MAX_TIME_ENTRY_SECS {
        return Err(ServiceError::BadRequest(
            "time entry must be at most 7 days".into(),
        ));
    }
    Ok((format_sqlite(start), format_sqlite(end), seconds))
}

/// Elapsed whole seconds between a stored start and `now`, never negative.
pub fn elapsed_seconds(started_at: &str, now: DateTime<Utc>) -> Result<i64, ServiceError> {
    let start = parse_sqlite(started_at)?;
    Ok((now - start).num_seconds().max(0))
}

// ─── Auth Token Resolution ──────────────────────────────────────────────────

/// Resolve an access token into a user id.
///
/// Each backend only needs to extract the token string from the
/// `Authorization` header or the session cookie and call this.
pub fn resolve_access_token(
    token: &str,
    jwt_secret: &str,
    now: u64,
) -> Result<String, ServiceError> {
    if jwt_secret.is_empty() {
        return Err(ServiceError::Unauthorized(
            "authentication not configured".into(),
        ));
    }
    crate::crypto::verify_jwt(token, jwt_secret, now)
}

// ─── Token Bundle ───────────────────────────────────────────────────────────

/// Pre-computed token bundle returned by [`prepare_token_bundle`].
///
/// Contains everything needed to insert a refresh token and return the auth
/// response. The caller only needs to perform the DB INSERT.
pub struct TokenBundle {
    /// SHA-256 hash of the refresh token (stored in DB).
    pub token_hash: String,
    /// UUID primary key for the refresh_tokens row.
    pub token_id: String,
    /// `datetime` string for the refresh token expiry (DB column value).
    pub expires_at: String,
    /// Ready-to-return API response.
    pub response: AuthTokenResponse,
}

/// Build a [`TokenBundle`] containing a JWT, refresh token, and the auth response.
pub fn prepare_token_bundle(
    jwt_secret: &str,
    user_id: &str,
    nickname: &str,
    now_unix: u64,
) -> Result<TokenBundle, ServiceError> {
    use crate::crypto;

    if jwt_secret.is_empty() {
        return Err(ServiceError::Unauthorized(
            "authentication not configured".into(),
        ));
    }

    let access_token = crypto::sign_jwt(user_id, jwt_secret, now_unix);
    let refresh_token = crypto::generate_token()?;
    let token_hash = crypto::hash_token(&refresh_token);
    let token_id = uuid::Uuid::new_v4().to_string();

    let base = DateTime::from_timestamp(now_unix as i64, 0)
        .ok_or_else(|| ServiceError::Internal("invalid timestamp".into()))?;
    let expires_at = base
        .checked_add_signed(chrono::Duration::seconds(
            crypto::REFRESH_EXPIRY_SECS as i64,
        ))
        .ok_or_else(|| ServiceError::Internal("timestamp overflow".into()))
        .map(format_sqlite)?;

    Ok(TokenBundle {
        token_hash,
        token_id,
        expires_at,
        response: AuthTokenResponse {
            access_token,
            refresh_token,
            expires_in: crypto::JWT_EXPIRY_SECS,
            user_id: user_id.to_string(),
            nickname: nickname.to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_nickname() {
        assert!(validate_nickname("alice").is_ok());
        assert_eq!(validate_nickname("  bob  ").unwrap(), "bob");
        assert!(validate_nickname("").is_err());
        assert!(validate_nickname("   ").is_err());
        assert!(validate_nickname("a b").is_err());
        assert!(validate_nickname("a@b").is_err());
        assert!(validate_nickname(&"x".repeat(65)).is_err());
        assert!(validate_nickname(&"x".repeat(64)).is_ok());
    }

    #[test]
    fn test_validate_email() {
        assert_eq!(
            validate_email("  Alice@Example.COM ").unwrap(),
            "alice@example.com"
        );
        assert!(validate_email("alice").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("alice@").is_err());
        assert!(validate_email("al ice@example.com").is_err());
    }

    #[test]
    fn test_validate_password_bounds() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("exactly8").is_ok());
        assert!(validate_password(&"p".repeat(128)).is_ok());
        assert!(validate_password(&"p".repeat(129)).is_err());
    }

    #[test]
    fn test_validate_names() {
        assert_eq!(validate_board_title("  Roadmap ").unwrap(), "Roadmap");
        let err = validate_label_name(&"l".repeat(51)).unwrap_err();
        assert_eq!(err.message(), "label name must be 1-50 characters");
        assert!(validate_comment_body("   ").is_err());
    }

    #[test]
    fn test_normalize_description() {
        assert_eq!(normalize_description(None, 10).unwrap(), None);
        assert_eq!(normalize_description(Some("   "), 10).unwrap(), None);
        assert_eq!(
            normalize_description(Some(" hi "), 10).unwrap(),
            Some("hi".to_string())
        );
        assert!(normalize_description(Some("01234567890"), 10).is_err());
    }

    #[test]
    fn test_validate_color() {
        assert_eq!(validate_color("#A1B2C3").unwrap(), "#a1b2c3");
        assert!(validate_color("a1b2c3").is_err());
        assert!(validate_color("#a1b2c").is_err());
        assert!(validate_color("#zzzzzz").is_err());
    }

    #[test]
    fn test_validate_due_date() {
        assert_eq!(validate_due_date("2025-02-28").unwrap(), "2025-02-28");
        assert!(validate_due_date("2025-02-30").is_err());
        assert!(validate_due_date("28/02/2025").is_err());
    }

    #[test]
    fn test_normalize_avatar_url() {
        assert_eq!(normalize_avatar_url("").unwrap(), None);
        assert_eq!(
            normalize_avatar_url("https://cdn.example.com/a.png").unwrap(),
            Some("https://cdn.example.com/a.png".to_string())
        );
        assert!(normalize_avatar_url("javascript:alert(1)").is_err());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\notes.txt"), "notes.txt");
        assert_eq!(sanitize_filename("a\u{0}b\nc.txt"), "abc.txt");
        assert_eq!(sanitize_filename(".."), "file");
        assert_eq!(sanitize_filename(""), "file");
        assert_eq!(sanitize_filename(&"x".repeat(300)).len(), 255);
    }

    #[test]
    fn test_positions() {
        assert_eq!(insert_position(None, 3), 3);
        assert_eq!(insert_position(Some(-5), 3), 0);
        assert_eq!(insert_position(Some(1), 3), 1);
        assert_eq!(insert_position(Some(99), 3), 3);
        assert_eq!(insert_position(None, 0), 0);

        assert_eq!(move_position(99, 3), 2);
        assert_eq!(move_position(-1, 3), 0);
        assert_eq!(move_position(1, 3), 1);
        assert_eq!(move_position(5, 1), 0);
    }

    #[test]
    fn test_extract_mentions() {
        assert_eq!(
            extract_mentions("hey @alice and @bob, also @Alice again"),
            vec!["alice".to_string(), "bob".to_string()]
        );
        assert_eq!(
            extract_mentions("@carol: ping. mail me at dave@example.com"),
            vec!["carol".to_string()]
        );
        assert_eq!(extract_mentions("see @eve."), vec!["eve".to_string()]);
        assert!(extract_mentions("no mentions here").is_empty());
    }

    #[test]
    fn test_validate_time_range() {
        let (start, end, secs) =
            validate_time_range("2025-01-01T09:00:00Z", "2025-01-01T10:30:00+00:00").unwrap();
        assert_eq!(start, "2025-01-01 09:00:00");
        assert_eq!(end, "2025-01-01 10:30:00");
        assert_eq!(secs, 5400);

        assert!(validate_time_range("2025-01-01T10:00:00Z", "2025-01-01T10:00:00Z").is_err());
        assert!(validate_time_range("2025-01-01T10:00:00Z", "2025-01-01T09:00:00Z").is_err());
        assert!(validate_time_range("2025-01-01T00:00:00Z", "2025-01-09T00:00:00Z").is_err());
        assert!(validate_time_range("yesterday", "2025-01-01T00:00:00Z").is_err());
    }

    #[test]
    fn test_elapsed_seconds() {
        let now = parse_sqlite("2025-01-01 10:00:30").unwrap();
        assert_eq!(elapsed_seconds("2025-01-01 10:00:00", now).unwrap(), 30);
        assert_eq!(elapsed_seconds("2025-01-01 11:00:00", now).unwrap(), 0);
        assert!(elapsed_seconds("garbage", now).is_err());
    }

    #[test]
    fn test_expiry_sqlite() {
        let now = parse_sqlite("2025-01-01 00:00:00").unwrap();
        assert_eq!(expiry_sqlite(now, 7).unwrap(), "2025-01-08 00:00:00");
    }

    #[test]
    fn test_expiry_sqlite_out_of_range() {
        let now = parse_sqlite("2025-01-01 00:00:00").unwrap();
        let err = expiry_sqlite(now, u32::MAX).unwrap_err();
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_token_bundle() {
        let bundle = prepare_token_bundle("secret", "u1", "alice", 1_700_000_000).unwrap();
        assert_eq!(bundle.response.user_id, "u1");
        assert_eq!(bundle.response.expires_in, crate::crypto::JWT_EXPIRY_SECS);
        assert_eq!(
            bundle.token_hash,
            crate::crypto::hash_token(&bundle.response.refresh_token)
        );
        assert_eq!(
            resolve_access_token(&bundle.response.access_token, "secret", 1_700_000_001).unwrap(),
            "u1"
        );
        assert!(prepare_token_bundle("", "u1", "alice", 0).is_err());
        assert!(resolve_access_token("x", "", 0).is_err());
    }
}
