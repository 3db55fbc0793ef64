//! Invitation query builders.

use sea_query::{Alias, Asterisk, Expr, Func, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::Invitations;

/// Fields of a new invitation.
#[derive(Debug, Clone, Copy)]
pub struct NewInvitation<'a> {
    pub id: &'a str,
    pub target_type: &'a str,
    pub target_id: &'a str,
    pub email: &'a str,
    pub role: &'a str,
    pub invited_by: &'a str,
    pub expires_at: &'a str,
}

/// INSERT a new invitation.
pub fn insert(inv: &NewInvitation<'_>) -> Built {
    Query::insert()
        .into_table(Invitations::Table)
        .columns([
            Invitations::Id,
            Invitations::TargetType,
            Invitations::TargetId,
            Invitations::Email,
            Invitations::Role,
            Invitations::InvitedBy,
            Invitations::ExpiresAt,
        ])
        .values_panic([
            inv.id.into(),
            inv.target_type.into(),
            inv.target_id.into(),
            inv.email.into(),
            inv.role.into(),
            inv.invited_by.into(),
            inv.expires_at.into(),
        ])
        .build(SqliteQueryBuilder)
}

/// Invitation columns with the target's display name and the inviter's
/// nickname: id, target_type, target_id, target_name, email, role,
/// invited_by, invited_by_nickname, status, created_at, expires_at.
const INVITATION_SELECT: &str = concat!(
    "SELECT i.\"id\", i.\"target_type\", i.\"target_id\", ",
    "COALESCE(b.\"title\", t.\"name\", '') AS \"target_name\", ",
    "i.\"email\", i.\"role\", i.\"invited_by\", ",
    "COALESCE(u.\"nickname\", '') AS \"invited_by_nickname\", ",
    "i.\"status\", i.\"created_at\", i.\"expires_at\" ",
    "FROM \"invitations\" i ",
    "LEFT JOIN \"boards\" b ON i.\"target_type\" = 'board' AND b.\"id\" = i.\"target_id\" ",
    "LEFT JOIN \"teams\" t ON i.\"target_type\" = 'team' AND t.\"id\" = i.\"target_id\" ",
    "LEFT JOIN \"users\" u ON u.\"id\" = i.\"invited_by\" "
);

/// SELECT one invitation by id.
pub fn get_by_id(id: &str) -> Built {
    let sql = format!("{INVITATION_SELECT}WHERE i.\"id\" = ?");
    (sql, sea_query::Values(vec![id.into()]))
}

/// Pending, unexpired invitations addressed to an email.
/// Params: email, now.
pub fn list_for_email(email: &str, now: &str) -> Built {
    let sql = format!(
        "{INVITATION_SELECT}WHERE i.\"email\" = ? AND i.\"status\" = 'pending' \
         AND i.\"expires_at\" > ? ORDER BY i.\"created_at\" DESC"
    );
    (sql, sea_query::Values(vec![email.into(), now.into()]))
}

/// Pending, unexpired invitations of a board or team.
/// Params: target_type, target_id, now.
pub fn list_for_target(target_type: &str, target_id: &str, now: &str) -> Built {
    let sql = format!(
        "{INVITATION_SELECT}WHERE i.\"target_type\" = ? AND i.\"target_id\" = ? \
         AND i.\"status\" = 'pending' AND i.\"expires_at\" > ? ORDER BY i.\"created_at\" DESC"
    );
    (
        sql,
        sea_query::Values(vec![target_type.into(), target_id.into(), now.into()]),
    )
}

/// COUNT live pending invitations for the same target and email.
pub fn pending_count(target_type: &str, target_id: &str, email: &str, now: &str) -> Built {
    Query::select()
        .expr_as(Func::count(Expr::col(Asterisk)), Alias::new("count"))
        .from(Invitations::Table)
        .and_where(Expr::col(Invitations::TargetType).eq(target_type))
        .and_where(Expr::col(Invitations::TargetId).eq(target_id))
        .and_where(Expr::col(Invitations::Email).eq(email))
        .and_where(Expr::col(Invitations::Status).eq("pending"))
        .and_where(Expr::col(Invitations::ExpiresAt).gt(now))
        .build(SqliteQueryBuilder)
}

/// Move a pending invitation to `status`. Matches nothing if it already
/// left `pending`.
pub fn update_status(id: &str, status: &str, responded_at: &str) -> Built {
    Query::update()
        .table(Invitations::Table)
        .value(Invitations::Status, status)
        .value(Invitations::RespondedAt, responded_at)
        .and_where(Expr::col(Invitations::Id).eq(id))
        .and_where(Expr::col(Invitations::Status).eq("pending"))
        .build(SqliteQueryBuilder)
}

/// Drop every invitation to a board or team that is being deleted.
pub fn delete_for_target(target_type: &str, target_id: &str) -> Built {
    Query::delete()
        .from_table(Invitations::Table)
        .and_where(Expr::col(Invitations::TargetType).eq(target_type))
        .and_where(Expr::col(Invitations::TargetId).eq(target_id))
        .build(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_queries_bind_every_placeholder() {
        for (sql, values) in [
            get_by_id("i1"),
            list_for_email("a@x.io", "2026-01-01 00:00:00"),
            list_for_target("board", "b1", "2026-01-01 00:00:00"),
        ] {
            assert_eq!(sql.matches('?').count(), values.0.len(), "{sql}");
        }
    }

    #[test]
    fn status_change_requires_pending() {
        let (sql, values) = update_status("i1", "accepted", "2026-01-01 00:00:00");
        assert!(sql.contains("\"status\" = ?"), "{sql}");
        assert_eq!(values.0.last(), Some(&"pending".into()));
    }
}
