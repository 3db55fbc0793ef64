//! Board and team authorization rules.
//!
//! Handlers load the raw membership rows, then ask these functions what the
//! caller may do. Nothing here touches the database.

use crate::{BoardRole, ServiceError, TeamRole};

/// Something a user may want to do on a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardAction {
    View,
    Comment,
    EditContent,
    ManageMembers,
    ManageSettings,
    Delete,
}

impl BoardAction {
    /// Lowest role allowed to perform the action.
    pub fn min_role(self) -> BoardRole {
        match self {
            Self::View | Self::Comment => BoardRole::Viewer,
            Self::EditContent => BoardRole::Editor,
            Self::ManageMembers | Self::ManageSettings => BoardRole::Admin,
            Self::Delete => BoardRole::Owner,
        }
    }
}

/// Something a user may want to do on a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamAction {
    View,
    Invite,
    ManageMembers,
    Update,
    Delete,
}

impl TeamAction {
    pub fn min_role(self) -> TeamRole {
        match self {
            Self::View => TeamRole::Member,
            Self::Invite | Self::ManageMembers | Self::Update => TeamRole::Admin,
            Self::Delete => TeamRole::Owner,
        }
    }
}

/// Board role granted through membership of the board's team.
pub fn team_derived_board_role(team_role: TeamRole) -> BoardRole {
    match team_role {
        TeamRole::Owner | TeamRole::Admin => BoardRole::Admin,
        TeamRole::Member => BoardRole::Editor,
    }
}

/// Effective role of `user_id` on a board.
///
/// The board owner is always `Owner`. Otherwise the strongest of the direct
/// board membership and the team-derived role wins. `None` means no access.
pub fn effective_board_role(
    user_id: &str,
    owner_id: &str,
    direct: Option<BoardRole>,
    team_role: Option<TeamRole>,
) -> Option<BoardRole> {
    if user_id == owner_id {
        return Some(BoardRole::Owner);
    }
    let direct = direct.filter(|r| *r != BoardRole::Owner);
    let via_team = team_role.map(team_derived_board_role);
    direct.max(via_team)
}

pub fn board_allows(role: BoardRole, action: BoardAction) -> bool {
    role >= action.min_role()
}

/// `Forbidden` unless `role` permits `action`.
pub fn require_board(role: BoardRole, action: BoardAction) -> Result<(), ServiceError> {
    if board_allows(role, action) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "requires {} role on this board",
            action.min_role()
        )))
    }
}

pub fn team_allows(role: TeamRole, action: TeamAction) -> bool {
    role >= action.min_role()
}

/// `Forbidden` unless `role` permits `action`.
pub fn require_team(role: TeamRole, action: TeamAction) -> Result<(), ServiceError> {
    if team_allows(role, action) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "requires {} role in this team",
            action.min_role()
        )))
    }
}

/// Whether `actor` may hand out `target` on a board (invite or re-role).
/// Ownership is never granted this way.
pub fn can_grant_board_role(actor: BoardRole, target: BoardRole) -> bool {
    board_allows(actor, BoardAction::ManageMembers)
        && target != BoardRole::Owner
        && target <= actor
}

/// Whether `actor` may hand out `target` in a team.
pub fn can_grant_team_role(actor: TeamRole, target: TeamRole) -> bool {
    team_allows(actor, TeamAction::ManageMembers) && target != TeamRole::Owner && target <= actor
}

/// Whether `actor` may remove or re-role a board member holding `subject`.
/// Self-removal is handled by [`can_leave_board`].
pub fn can_manage_board_member(actor: BoardRole, subject: BoardRole) -> bool {
    match subject {
        BoardRole::Owner => false,
        BoardRole::Admin => actor == BoardRole::Owner,
        BoardRole::Editor | BoardRole::Viewer => board_allows(actor, BoardAction::ManageMembers),
    }
}

pub fn can_manage_team_member(actor: TeamRole, subject: TeamRole) -> bool {
    match subject {
        TeamRole::Owner => false,
        TeamRole::Admin => actor == TeamRole::Owner,
        TeamRole::Member => team_allows(actor, TeamAction::ManageMembers),
    }
}

/// Everyone but the owner may leave.
pub fn can_leave_board(role: BoardRole) -> bool {
    role != BoardRole::Owner
}

pub fn can_leave_team(role: TeamRole) -> bool {
    role != TeamRole::Owner
}

/// Only the author edits a comment.
pub fn can_edit_comment(user_id: &str, author_id: &str) -> bool {
    user_id == author_id
}

/// The author, or a board admin, deletes a comment.
pub fn can_delete_comment(user_id: &str, author_id: &str, role: BoardRole) -> bool {
    user_id == author_id || board_allows(role, BoardAction::ManageMembers)
}

/// Time entries and attachments: the owner of the record, or a board admin.
pub fn can_delete_owned(user_id: &str, owner_id: Option<&str>, role: BoardRole) -> bool {
    owner_id == Some(user_id) || role >= BoardRole::Admin
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_always_wins() {
        assert_eq!(
            effective_board_role("u1", "u1", None, None),
            Some(BoardRole::Owner)
        );
        assert_eq!(
            effective_board_role("u1", "u1", Some(BoardRole::Viewer), Some(TeamRole::Member)),
            Some(BoardRole::Owner)
        );
    }

    #[test]
    fn no_membership_means_no_access() {
        assert_eq!(effective_board_role("u2", "u1", None, None), None);
    }

    #[test]
    fn strongest_of_direct_and_team_role() {
        assert_eq!(
            effective_board_role("u2", "u1", Some(BoardRole::Viewer), Some(TeamRole::Member)),
            Some(BoardRole::Editor)
        );
        assert_eq!(
            effective_board_role("u2", "u1", Some(BoardRole::Admin), Some(TeamRole::Member)),
            Some(BoardRole::Admin)
        );
        assert_eq!(
            effective_board_role("u2", "u1", None, Some(TeamRole::Owner)),
            Some(BoardRole::Admin)
        );
        assert_eq!(
            effective_board_role("u2", "u1", Some(BoardRole::Viewer), None),
            Some(BoardRole::Viewer)
        );
    }

    #[test]
    fn stray_owner_row_does_not_grant_ownership() {
        assert_eq!(
            effective_board_role("u2", "u1", Some(BoardRole::Owner), None),
            None
        );
        assert_eq!(
            effective_board_role("u2", "u1", Some(BoardRole::Owner), Some(TeamRole::Member)),
            Some(BoardRole::Editor)
        );
    }

    #[test]
    fn board_action_matrix() {
        use BoardAction::*;
        let matrix = [
            (BoardRole::Viewer, [true, true, false, false, false, false]),
            (BoardRole::Editor, [true, true, true, false, false, false]),
            (BoardRole::Admin, [true, true, true, true, true, false]),
            (BoardRole::Owner, [true, true, true, true, true, true]),
        ];
        let actions = [View, Comment, EditContent, ManageMembers, ManageSettings, Delete];
        for (role, expected) in matrix {
            for (action, allowed) in actions.iter().zip(expected) {
                assert_eq!(
                    board_allows(role, *action),
                    allowed,
                    "{role} / {action:?}"
                );
            }
        }
    }

    #[test]
    fn require_board_reports_needed_role() {
        let err = require_board(BoardRole::Viewer, BoardAction::EditContent).unwrap_err();
        assert_eq!(err.status_code(), 403);
        assert_eq!(err.message(), "requires editor role on this board");
        assert!(require_board(BoardRole::Owner, BoardAction::Delete).is_ok());
    }

    #[test]
    fn team_action_matrix() {
        assert!(team_allows(TeamRole::Member, TeamAction::View));
        assert!(!team_allows(TeamRole::Member, TeamAction::Invite));
        assert!(team_allows(TeamRole::Admin, TeamAction::Update));
        assert!(!team_allows(TeamRole::Admin, TeamAction::Delete));
        assert!(team_allows(TeamRole::Owner, TeamAction::Delete));
        assert!(require_team(TeamRole::Member, TeamAction::ManageMembers).is_err());
    }

    #[test]
    fn granting_roles() {
        assert!(can_grant_board_role(BoardRole::Admin, BoardRole::Editor));
        assert!(can_grant_board_role(BoardRole::Admin, BoardRole::Admin));
        assert!(!can_grant_board_role(BoardRole::Admin, BoardRole::Owner));
        assert!(!can_grant_board_role(BoardRole::Owner, BoardRole::Owner));
        assert!(!can_grant_board_role(BoardRole::Editor, BoardRole::Viewer));

        assert!(can_grant_team_role(TeamRole::Owner, TeamRole::Admin));
        assert!(can_grant_team_role(TeamRole::Admin, TeamRole::Member));
        assert!(!can_grant_team_role(TeamRole::Member, TeamRole::Member));
        assert!(!can_grant_team_role(TeamRole::Owner, TeamRole::Owner));
    }

    #[test]
    fn managing_members() {
        assert!(!can_manage_board_member(BoardRole::Owner, BoardRole::Owner));
        assert!(can_manage_board_member(BoardRole::Owner, BoardRole::Admin));
        assert!(!can_manage_board_member(BoardRole::Admin, BoardRole::Admin));
        assert!(can_manage_board_member(BoardRole::Admin, BoardRole::Editor));
        assert!(!can_manage_board_member(BoardRole::Editor, BoardRole::Viewer));

        assert!(can_manage_team_member(TeamRole::Owner, TeamRole::Admin));
        assert!(!can_manage_team_member(TeamRole::Admin, TeamRole::Admin));
        assert!(can_manage_team_member(TeamRole::Admin, TeamRole::Member));
        assert!(!can_manage_team_member(TeamRole::Admin, TeamRole::Owner));

        assert!(can_leave_board(BoardRole::Viewer));
        assert!(!can_leave_board(BoardRole::Owner));
        assert!(can_leave_team(TeamRole::Admin));
        assert!(!can_leave_team(TeamRole::Owner));
    }

    #[test]
    fn comment_and_record_ownership() {
        assert!(can_edit_comment("u1", "u1"));
        assert!(!can_edit_comment("u2", "u1"));
        assert!(can_delete_comment("u2", "u1", BoardRole::Admin));
        assert!(!can_delete_comment("u2", "u1", BoardRole::Editor));

        assert!(can_delete_owned("u1", Some("u1"), BoardRole::Viewer));
        assert!(!can_delete_owned("u1", None, BoardRole::Editor));
        assert!(can_delete_owned("u1", Some("u2"), BoardRole::Admin));
    }
}
