//! User / auth query builders.

use sea_query::{Alias, Asterisk, Expr, Func, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::{RefreshTokens, Users};

// ── User lookups ───────────────────────────────────────────────────────────

/// Profile columns: id, email, nickname, avatar_url, created_at.
pub fn get_by_id(user_id: &str) -> Built {
    Query::select()
        .columns([
            Users::Id,
            Users::Email,
            Users::Nickname,
            Users::AvatarUrl,
            Users::CreatedAt,
        ])
        .from(Users::Table)
        .and_where(Expr::col(Users::Id).eq(user_id))
        .build(SqliteQueryBuilder)
}

/// Find user by email for login (returns id, nickname, password_hash).
pub fn get_by_email_for_login(email: &str) -> Built {
    Query::select()
        .columns([Users::Id, Users::Nickname, Users::PasswordHash])
        .from(Users::Table)
        .and_where(Expr::col(Users::Email).eq(email))
        .build(SqliteQueryBuilder)
}

/// Find a user id by email.
pub fn id_by_email(email: &str) -> Built {
    Query::select()
        .column(Users::Id)
        .from(Users::Table)
        .and_where(Expr::col(Users::Email).eq(email))
        .build(SqliteQueryBuilder)
}

/// Count users with this email.
pub fn email_count(email: &str) -> Built {
    Query::select()
        .expr_as(Func::count(Expr::col(Asterisk)), Alias::new("count"))
        .from(Users::Table)
        .and_where(Expr::col(Users::Email).eq(email))
        .build(SqliteQueryBuilder)
}

/// Count other users holding this nickname (case-insensitive).
pub fn nickname_count(nickname: &str, exclude_user_id: Option<&str>) -> Built {
    let mut q = Query::select();
    q.expr_as(Func::count(Expr::col(Asterisk)), Alias::new("count"))
        .from(Users::Table)
        .and_where(Expr::expr(Func::lower(Expr::col(Users::Nickname))).eq(nickname.to_lowercase()));
    if let Some(id) = exclude_user_id {
        q.and_where(Expr::col(Users::Id).ne(id));
    }
    q.build(SqliteQueryBuilder)
}

/// Resolve nicknames (case-insensitive) to `(id, nickname)` rows.
pub fn ids_by_nicknames(nicknames: &[String]) -> Built {
    let lowered: Vec<String> = nicknames.iter().map(|n| n.to_lowercase()).collect();
    Query::select()
        .columns([Users::Id, Users::Nickname])
        .from(Users::Table)
        .and_where(Expr::expr(Func::lower(Expr::col(Users::Nickname))).is_in(lowered))
        .build(SqliteQueryBuilder)
}

/// Get the password hash of a user.
pub fn get_password_hash(user_id: &str) -> Built {
    Query::select()
        .column(Users::PasswordHash)
        .from(Users::Table)
        .and_where(Expr::col(Users::Id).eq(user_id))
        .build(SqliteQueryBuilder)
}

// ── User writes ────────────────────────────────────────────────────────────

/// Insert user with email/password.
pub fn insert(id: &str, email: &str, nickname: &str, password_hash: &str) -> Built {
    Query::insert()
        .into_table(Users::Table)
        .columns([Users::Id, Users::Email, Users::Nickname, Users::PasswordHash])
        .values_panic([
            id.into(),
            email.into(),
            nickname.into(),
            password_hash.into(),
        ])
        .build(SqliteQueryBuilder)
}

pub fn update_nickname(user_id: &str, nickname: &str) -> Built {
    Query::update()
        .table(Users::Table)
        .value(Users::Nickname, nickname)
        .and_where(Expr::col(Users::Id).eq(user_id))
        .build(SqliteQueryBuilder)
}

pub fn update_avatar(user_id: &str, avatar_url: Option<&str>) -> Built {
    Query::update()
        .table(Users::Table)
        .value(Users::AvatarUrl, avatar_url.map(str::to_string))
        .and_where(Expr::col(Users::Id).eq(user_id))
        .build(SqliteQueryBuilder)
}

pub fn update_password(user_id: &str, password_hash: &str) -> Built {
    Query::update()
        .table(Users::Table)
        .value(Users::PasswordHash, password_hash)
        .and_where(Expr::col(Users::Id).eq(user_id))
        .build(SqliteQueryBuilder)
}

/// Delete the user row. Foreign keys cascade the rest.
pub fn delete(user_id: &str) -> Built {
    Query::delete()
        .from_table(Users::Table)
        .and_where(Expr::col(Users::Id).eq(user_id))
        .build(SqliteQueryBuilder)
}

// ── Refresh tokens ─────────────────────────────────────────────────────────

/// Insert refresh token.
pub fn insert_refresh_token(id: &str, user_id: &str, token_hash: &str, expires_at: &str) -> Built {
    Query::insert()
        .into_table(RefreshTokens::Table)
        .columns([
            RefreshTokens::Id,
            RefreshTokens::UserId,
            RefreshTokens::TokenHash,
            RefreshTokens::ExpiresAt,
        ])
        .values_panic([
            id.into(),
            user_id.into(),
            token_hash.into(),
            expires_at.into(),
        ])
        .build(SqliteQueryBuilder)
}

/// Lookup refresh token with user join: id, user_id, expires_at, nickname.
pub fn lookup_refresh_token(token_hash: &str) -> Built {
    Query::select()
        .column((RefreshTokens::Table, RefreshTokens::Id))
        .column((RefreshTokens::Table, RefreshTokens::UserId))
        .column((RefreshTokens::Table, RefreshTokens::ExpiresAt))
        .column((Users::Table, Users::Nickname))
        .from(RefreshTokens::Table)
        .inner_join(
            Users::Table,
            Expr::col((Users::Table, Users::Id))
                .equals((RefreshTokens::Table, RefreshTokens::UserId)),
        )
        .and_where(Expr::col((RefreshTokens::Table, RefreshTokens::TokenHash)).eq(token_hash))
        .build(SqliteQueryBuilder)
}

/// Delete refresh token by hash.
pub fn delete_refresh_token(token_hash: &str) -> Built {
    Query::delete()
        .from_table(RefreshTokens::Table)
        .and_where(Expr::col(RefreshTokens::TokenHash).eq(token_hash))
        .build(SqliteQueryBuilder)
}

/// Delete refresh token by id.
pub fn delete_refresh_token_by_id(id: &str) -> Built {
    Query::delete()
        .from_table(RefreshTokens::Table)
        .and_where(Expr::col(RefreshTokens::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// Revoke every refresh token of a user.
pub fn delete_refresh_tokens_for_user(user_id: &str) -> Built {
    Query::delete()
        .from_table(RefreshTokens::Table)
        .and_where(Expr::col(RefreshTokens::UserId).eq(user_id))
        .build(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nickname_lookup_is_case_insensitive() {
        let (sql, values) = ids_by_nicknames(&["Alice".to_string(), "BOB".to_string()]);
        assert!(sql.contains("LOWER(\"nickname\") IN (?, ?)"), "{sql}");
        assert_eq!(values.0.len(), 2);
        assert_eq!(values.0[0], "alice".into());
    }

    #[test]
    fn nickname_count_can_exclude_self() {
        let (sql, values) = nickname_count("Alice", Some("u1"));
        assert!(sql.contains("\"id\" <> ?"), "{sql}");
        assert_eq!(values.0.len(), 2);
        let (_, values) = nickname_count("Alice", None);
        assert_eq!(values.0.len(), 1);
    }
}
