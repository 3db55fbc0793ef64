//! Board + board member query builders.

use sea_query::{Expr, Order, Query, SqliteQueryBuilder};

use super::tables::{BoardMembers, Boards, Users};
use super::{Built, now_expr};

/// Column list for board SELECT queries:
/// id, title, description, owner_id, team_id, created_at, updated_at.
fn board_columns(q: &mut sea_query::SelectStatement) -> &mut sea_query::SelectStatement {
    q.column((Boards::Table, Boards::Id))
        .column((Boards::Table, Boards::Title))
        .column((Boards::Table, Boards::Description))
        .column((Boards::Table, Boards::OwnerId))
        .column((Boards::Table, Boards::TeamId))
        .column((Boards::Table, Boards::CreatedAt))
        .column((Boards::Table, Boards::UpdatedAt))
}

const BOARD_COLUMNS_RAW: &str = "b.\"id\", b.\"title\", b.\"description\", b.\"owner_id\", \
     b.\"team_id\", b.\"created_at\", b.\"updated_at\"";

// ── Boards ────────────────────────────────────────────────────────────────

/// INSERT a new board.
pub fn insert(
    id: &str,
    title: &str,
    description: Option<&str>,
    owner_id: &str,
    team_id: Option<&str>,
) -> Built {
    Query::insert()
        .into_table(Boards::Table)
        .columns([
            Boards::Id,
            Boards::Title,
            Boards::Description,
            Boards::OwnerId,
            Boards::TeamId,
        ])
        .values_panic([
            id.into(),
            title.into(),
            description.map(|s| s.to_string()).into(),
            owner_id.into(),
            team_id.map(|s| s.to_string()).into(),
        ])
        .build(SqliteQueryBuilder)
}

/// SELECT a single board by id.
pub fn get_by_id(id: &str) -> Built {
    let mut q = Query::select().to_owned();
    board_columns(&mut q);
    q.from(Boards::Table)
        .and_where(Expr::col((Boards::Table, Boards::Id)).eq(id))
        .build(SqliteQueryBuilder)
}

/// Everything needed to compute a user's effective role on a board:
/// owner_id, direct board role (nullable), team role (nullable).
/// Params: user_id, user_id, board_id.
pub fn access_row(board_id: &str, user_id: &str) -> Built {
    let sql = concat!(
        "SELECT b.\"owner_id\", ",
        "(SELECT bm.\"role\" FROM \"board_members\" bm ",
        "WHERE bm.\"board_id\" = b.\"id\" AND bm.\"user_id\" = ?) AS \"direct_role\", ",
        "(SELECT tm.\"role\" FROM \"team_members\" tm ",
        "WHERE tm.\"team_id\" = b.\"team_id\" AND tm.\"user_id\" = ?) AS \"team_role\" ",
        "FROM \"boards\" b WHERE b.\"id\" = ?"
    )
    .to_string();
    (
        sql,
        sea_query::Values(vec![user_id.into(), user_id.into(), board_id.into()]),
    )
}

/// Boards visible to a user: board columns + direct role + team role.
/// Params: user_id (×3).
pub fn list_accessible(user_id: &str) -> Built {
    let sql = format!(
        "SELECT {BOARD_COLUMNS_RAW}, bm.\"role\" AS \"direct_role\", tm.\"role\" AS \"team_role\" \
         FROM \"boards\" b \
         LEFT JOIN \"board_members\" bm ON bm.\"board_id\" = b.\"id\" AND bm.\"user_id\" = ? \
         LEFT JOIN \"team_members\" tm ON tm.\"team_id\" = b.\"team_id\" AND tm.\"user_id\" = ? \
         WHERE b.\"owner_id\" = ? OR bm.\"user_id\" IS NOT NULL OR tm.\"user_id\" IS NOT NULL \
         ORDER BY b.\"updated_at\" DESC, b.\"id\""
    );
    (
        sql,
        sea_query::Values(vec![user_id.into(), user_id.into(), user_id.into()]),
    )
}

/// Boards attached to a team, newest first.
pub fn list_by_team(team_id: &str) -> Built {
    let mut q = Query::select().to_owned();
    board_columns(&mut q);
    q.from(Boards::Table)
        .and_where(Expr::col((Boards::Table, Boards::TeamId)).eq(team_id))
        .order_by((Boards::Table, Boards::CreatedAt), Order::Desc)
        .build(SqliteQueryBuilder)
}

/// Ids of boards owned by the user.
pub fn owned_by(user_id: &str) -> Built {
    Query::select()
        .column(Boards::Id)
        .from(Boards::Table)
        .and_where(Expr::col(Boards::OwnerId).eq(user_id))
        .build(SqliteQueryBuilder)
}

pub fn update_title(id: &str, title: &str) -> Built {
    Query::update()
        .table(Boards::Table)
        .value(Boards::Title, title)
        .value(Boards::UpdatedAt, now_expr())
        .and_where(Expr::col(Boards::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn update_description(id: &str, description: Option<&str>) -> Built {
    Query::update()
        .table(Boards::Table)
        .value(Boards::Description, description.map(|s| s.to_string()))
        .value(Boards::UpdatedAt, now_expr())
        .and_where(Expr::col(Boards::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// Move a board into a team, or detach it with `None`.
pub fn update_team(id: &str, team_id: Option<&str>) -> Built {
    Query::update()
        .table(Boards::Table)
        .value(Boards::TeamId, team_id.map(|s| s.to_string()))
        .value(Boards::UpdatedAt, now_expr())
        .and_where(Expr::col(Boards::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// Bump `updated_at` after a change to board content.
pub fn touch(id: &str) -> Built {
    Query::update()
        .table(Boards::Table)
        .value(Boards::UpdatedAt, now_expr())
        .and_where(Expr::col(Boards::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// DELETE a board; lists, tasks, labels and memberships cascade.
pub fn delete(id: &str) -> Built {
    Query::delete()
        .from_table(Boards::Table)
        .and_where(Expr::col(Boards::Id).eq(id))
        .build(SqliteQueryBuilder)
}

// ── Members ───────────────────────────────────────────────────────────────

/// The user's direct role on a board, if any.
pub fn member_role(board_id: &str, user_id: &str) -> Built {
    Query::select()
        .column(BoardMembers::Role)
        .from(BoardMembers::Table)
        .and_where(Expr::col(BoardMembers::BoardId).eq(board_id))
        .and_where(Expr::col(BoardMembers::UserId).eq(user_id))
        .build(SqliteQueryBuilder)
}

pub fn member_insert(board_id: &str, user_id: &str, role: &str) -> Built {
    Query::insert()
        .into_table(BoardMembers::Table)
        .columns([BoardMembers::BoardId, BoardMembers::UserId, BoardMembers::Role])
        .values_panic([board_id.into(), user_id.into(), role.into()])
        .build(SqliteQueryBuilder)
}

pub fn member_delete(board_id: &str, user_id: &str) -> Built {
    Query::delete()
        .from_table(BoardMembers::Table)
        .and_where(Expr::col(BoardMembers::BoardId).eq(board_id))
        .and_where(Expr::col(BoardMembers::UserId).eq(user_id))
        .build(SqliteQueryBuilder)
}

pub fn member_update_role(board_id: &str, user_id: &str, role: &str) -> Built {
    Query::update()
        .table(BoardMembers::Table)
        .value(BoardMembers::Role, role)
        .and_where(Expr::col(BoardMembers::BoardId).eq(board_id))
        .and_where(Expr::col(BoardMembers::UserId).eq(user_id))
        .build(SqliteQueryBuilder)
}

/// Direct members: user_id, nickname, email, role, joined_at.
pub fn member_list(board_id: &str) -> Built {
    Query::select()
        .column((BoardMembers::Table, BoardMembers::UserId))
        .column((Users::Table, Users::Nickname))
        .column((Users::Table, Users::Email))
        .column((BoardMembers::Table, BoardMembers::Role))
        .column((BoardMembers::Table, BoardMembers::JoinedAt))
        .from(BoardMembers::Table)
        .inner_join(
            Users::Table,
            Expr::col((Users::Table, Users::Id))
                .equals((BoardMembers::Table, BoardMembers::UserId)),
        )
        .and_where(Expr::col((BoardMembers::Table, BoardMembers::BoardId)).eq(board_id))
        .order_by((BoardMembers::Table, BoardMembers::JoinedAt), Order::Asc)
        .build(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_row_binds_user_twice_then_board() {
        let (sql, values) = access_row("b1", "u1");
        assert_eq!(sql.matches('?').count(), 3);
        assert_eq!(values.0, vec!["u1".into(), "u1".into(), "b1".into()]);
    }

    #[test]
    fn list_accessible_covers_owner_member_and_team() {
        let (sql, values) = list_accessible("u1");
        assert_eq!(sql.matches('?').count(), values.0.len());
        assert!(sql.contains("LEFT JOIN \"team_members\""));
        assert!(sql.contains("b.\"owner_id\" = ?"));
    }

    #[test]
    fn update_team_with_none_binds_null() {
        let (sql, values) = update_team("b1", None);
        assert!(sql.contains("\"team_id\" = ?"), "{sql}");
        assert!(sql.contains("datetime('now')"), "{sql}");
        assert_eq!(values.0.len(), 2);
    }
}
