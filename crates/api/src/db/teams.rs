//! Team + member query builders.

use sea_query::{Alias, Asterisk, Expr, Func, Order, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::{TeamMembers, Teams, Users};

// ── Team columns helper ───────────────────────────────────────────────────

/// Column list for team SELECT queries:
/// id, name, description, created_by, created_at.
fn team_columns(q: &mut sea_query::SelectStatement) -> &mut sea_query::SelectStatement {
    q.column((Teams::Table, Teams::Id))
        .column((Teams::Table, Teams::Name))
        .column((Teams::Table, Teams::Description))
        .column((Teams::Table, Teams::CreatedBy))
        .column((Teams::Table, Teams::CreatedAt))
}

// ── Team queries ──────────────────────────────────────────────────────────

/// INSERT a new team.
pub fn insert(id: &str, name: &str, description: Option<&str>, created_by: &str) -> Built {
    Query::insert()
        .into_table(Teams::Table)
        .columns([Teams::Id, Teams::Name, Teams::Description, Teams::CreatedBy])
        .values_panic([
            id.into(),
            name.into(),
            description.map(|s| s.to_string()).into(),
            created_by.into(),
        ])
        .build(SqliteQueryBuilder)
}

/// SELECT a single team by id.
pub fn get_by_id(id: &str) -> Built {
    let mut q = Query::select().to_owned();
    team_columns(&mut q);
    q.from(Teams::Table)
        .and_where(Expr::col((Teams::Table, Teams::Id)).eq(id))
        .build(SqliteQueryBuilder)
}

/// Teams the user belongs to: team columns + the user's role.
pub fn list_for_user(user_id: &str) -> Built {
    let mut q = Query::select().to_owned();
    team_columns(&mut q);
    q.column((TeamMembers::Table, TeamMembers::Role))
        .from(Teams::Table)
        .inner_join(
            TeamMembers::Table,
            Expr::col((TeamMembers::Table, TeamMembers::TeamId)).equals((Teams::Table, Teams::Id)),
        )
        .and_where(Expr::col((TeamMembers::Table, TeamMembers::UserId)).eq(user_id))
        .order_by((Teams::Table, Teams::CreatedAt), Order::Desc)
        .build(SqliteQueryBuilder)
}

/// Ids of teams created by (owned by) the user.
pub fn owned_by(user_id: &str) -> Built {
    Query::select()
        .column((TeamMembers::Table, TeamMembers::TeamId))
        .from(TeamMembers::Table)
        .and_where(Expr::col(TeamMembers::UserId).eq(user_id))
        .and_where(Expr::col(TeamMembers::Role).eq("owner"))
        .build(SqliteQueryBuilder)
}

/// UPDATE team name.
pub fn update_name(id: &str, name: &str) -> Built {
    Query::update()
        .table(Teams::Table)
        .value(Teams::Name, name)
        .and_where(Expr::col(Teams::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// UPDATE team description (NULL clears it).
pub fn update_description(id: &str, description: Option<&str>) -> Built {
    Query::update()
        .table(Teams::Table)
        .value(Teams::Description, description.map(|s| s.to_string()))
        .and_where(Expr::col(Teams::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// DELETE a team. Boards in it are detached by `ON DELETE SET NULL`.
pub fn delete(id: &str) -> Built {
    Query::delete()
        .from_table(Teams::Table)
        .and_where(Expr::col(Teams::Id).eq(id))
        .build(SqliteQueryBuilder)
}

// ── Member queries ────────────────────────────────────────────────────────

/// The user's role in a team, if any.
pub fn member_role(team_id: &str, user_id: &str) -> Built {
    Query::select()
        .column(TeamMembers::Role)
        .from(TeamMembers::Table)
        .and_where(Expr::col(TeamMembers::TeamId).eq(team_id))
        .and_where(Expr::col(TeamMembers::UserId).eq(user_id))
        .build(SqliteQueryBuilder)
}

/// INSERT a team member.
pub fn member_insert(team_id: &str, user_id: &str, role: &str) -> Built {
    Query::insert()
        .into_table(TeamMembers::Table)
        .columns([TeamMembers::TeamId, TeamMembers::UserId, TeamMembers::Role])
        .values_panic([team_id.into(), user_id.into(), role.into()])
        .build(SqliteQueryBuilder)
}

/// DELETE a team member.
pub fn member_delete(team_id: &str, user_id: &str) -> Built {
    Query::delete()
        .from_table(TeamMembers::Table)
        .and_where(Expr::col(TeamMembers::TeamId).eq(team_id))
        .and_where(Expr::col(TeamMembers::UserId).eq(user_id))
        .build(SqliteQueryBuilder)
}

/// UPDATE a member's role.
pub fn member_update_role(team_id: &str, user_id: &str, role: &str) -> Built {
    Query::update()
        .table(TeamMembers::Table)
        .value(TeamMembers::Role, role)
        .and_where(Expr::col(TeamMembers::TeamId).eq(team_id))
        .and_where(Expr::col(TeamMembers::UserId).eq(user_id))
        .build(SqliteQueryBuilder)
}

/// List members with user info: user_id, nickname, email, role, joined_at.
pub fn member_list(team_id: &str) -> Built {
    Query::select()
        .column((TeamMembers::Table, TeamMembers::UserId))
        .column((Users::Table, Users::Nickname))
        .column((Users::Table, Users::Email))
        .column((TeamMembers::Table, TeamMembers::Role))
        .column((TeamMembers::Table, TeamMembers::JoinedAt))
        .from(TeamMembers::Table)
        .inner_join(
            Users::Table,
            Expr::col((Users::Table, Users::Id)).equals((TeamMembers::Table, TeamMembers::UserId)),
        )
        .and_where(Expr::col((TeamMembers::Table, TeamMembers::TeamId)).eq(team_id))
        .order_by((TeamMembers::Table, TeamMembers::JoinedAt), Order::Asc)
        .build(SqliteQueryBuilder)
}

/// COUNT members of a team.
pub fn member_count(team_id: &str) -> Built {
    Query::select()
        .expr_as(Func::count(Expr::col(Asterisk)), Alias::new("count"))
        .from(TeamMembers::Table)
        .and_where(Expr::col(TeamMembers::TeamId).eq(team_id))
        .build(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_for_user_selects_role_last() {
        let (sql, values) = list_for_user("u1");
        assert!(
            sql.starts_with("SELECT \"teams\".\"id\", \"teams\".\"name\""),
            "{sql}"
        );
        assert!(sql.contains("\"team_members\".\"role\" FROM"), "{sql}");
        assert_eq!(values.0.len(), 1);
    }

    #[test]
    fn member_update_binds_in_order() {
        let (sql, values) = member_update_role("t1", "u1", "admin");
        assert!(sql.starts_with("UPDATE \"team_members\" SET \"role\" = ?"));
        assert_eq!(
            values.0,
            vec!["admin".into(), "t1".into(), "u1".into()]
        );
    }
}
