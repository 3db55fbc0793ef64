//! Notification fan-out.
//!
//! Given who did what, decide which users get which notification. The
//! server persists the returned [`Notice`]s; nothing here does I/O.

use crate::{InvitationTarget, NotificationKind};

/// A notification about to be stored for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub user_id: String,
    pub kind: NotificationKind,
    pub message: String,
}

/// Recipients from `candidates` with the actor removed and duplicates
/// dropped, keeping first-seen order.
pub fn fan_out<'a>(actor_id: &str, candidates: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for id in candidates {
        if id.is_empty() || id == actor_id || out.iter().any(|o| o == id) {
            continue;
        }
        out.push(id.to_string());
    }
    out
}

/// Facts about a new comment needed to notify people.
#[derive(Debug, Clone, Copy)]
pub struct CommentEvent<'a> {
    pub actor_id: &'a str,
    pub actor_nickname: &'a str,
    pub task_title: &'a str,
    pub assignee_id: Option<&'a str>,
    pub creator_id: Option<&'a str>,
    /// Users resolved from `@nickname` mentions that can see the board.
    pub mentioned_ids: &'a [String],
}

/// Mentioned users get `mentioned`; the assignee and creator get
/// `comment_added` unless they were already mentioned.
pub fn comment_notices(event: &CommentEvent<'_>) -> Vec<Notice> {
    let mentioned = fan_out(
        event.actor_id,
        event.mentioned_ids.iter().map(String::as_str),
    );
    let watchers = fan_out(
        event.actor_id,
        event.assignee_id.into_iter().chain(event.creator_id),
    );

    let mut notices: Vec<Notice> = mentioned
        .iter()
        .map(|user_id| Notice {
            user_id: user_id.clone(),
            kind: NotificationKind::Mentioned,
            message: format!(
                "{} mentioned you on \"{}\"",
                event.actor_nickname, event.task_title
            ),
        })
        .collect();

    notices.extend(
        watchers
            .into_iter()
            .filter(|w| !mentioned.contains(w))
            .map(|user_id| Notice {
                user_id,
                kind: NotificationKind::CommentAdded,
                message: format!(
                    "{} commented on \"{}\"",
                    event.actor_nickname, event.task_title
                ),
            }),
    );
    notices
}

/// Notify a new assignee, unless they assigned themselves.
pub fn assignment_notice(
    actor_id: &str,
    actor_nickname: &str,
    assignee_id: &str,
    task_title: &str,
) -> Option<Notice> {
    (actor_id != assignee_id).then(|| Notice {
        user_id: assignee_id.to_string(),
        kind: NotificationKind::TaskAssigned,
        message: format!("{actor_nickname} assigned you to \"{task_title}\""),
    })
}

/// Tell an existing account about an invitation addressed to its email.
pub fn invitation_received_notice(
    invitee_id: &str,
    inviter_nickname: &str,
    target: InvitationTarget,
    target_name: &str,
    role: &str,
) -> Notice {
    Notice {
        user_id: invitee_id.to_string(),
        kind: NotificationKind::InvitationReceived,
        message: format!(
            "{inviter_nickname} invited you to the {target} \"{target_name}\" as {role}"
        ),
    }
}

/// Tell the inviter that their invitation was accepted.
pub fn invitation_accepted_notice(
    inviter_id: &str,
    accepter_id: &str,
    accepter_nickname: &str,
    target: InvitationTarget,
    target_name: &str,
) -> Option<Notice> {
    (inviter_id != accepter_id).then(|| Notice {
        user_id: inviter_id.to_string(),
        kind: NotificationKind::InvitationAccepted,
        message: format!("{accepter_nickname} joined the {target} \"{target_name}\""),
    })
}
