mod common;

use axum::http::StatusCode;
use serde_json::{Value, json};

use common::{TestApp, TestUser};

fn kinds(notes: &Value) -> Vec<String> {
    notes["notifications"]
        .as_array()
        .expect("notifications")
        .iter()
        .map(|n| n["kind"].as_str().expect("kind").to_string())
        .collect()
}

async fn clear_inbox(app: &TestApp, user: &TestUser) {
    let (status, _) = app
        .call("POST", "/api/notifications/read-all", Some(&user.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn comments_notify_creator_and_mentions() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let carol = app.register("carol").await;
    let outsider = app.register("outsider").await;
    let board_id = app.create_board(&alice, "Board").await;
    let list = app.create_list(&alice, &board_id, "Todo").await;
    app.add_board_member(&alice, &board_id, &bob, "viewer").await;
    app.add_board_member(&alice, &board_id, &carol, "editor").await;
    let task = app.create_task(&alice, &list, "Ship it").await;
    clear_inbox(&app, &alice).await;
    clear_inbox(&app, &carol).await;

    // Viewers may comment.
    let (status, comment) = app
        .post(
            &format!("/api/tasks/{task}/comments"),
            &bob.token,
            json!({ "body": "@carol @outsider looks good to me" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{comment}");
    assert_eq!(comment["author_nickname"], "bob");

    let (_, alice_notes) = app
        .get("/api/notifications?unread_only=true", &alice.token)
        .await;
    assert_eq!(kinds(&alice_notes), ["comment_added"]);

    let (_, carol_notes) = app
        .get("/api/notifications?unread_only=true", &carol.token)
        .await;
    assert_eq!(kinds(&carol_notes), ["mentioned"]);

    // No board access, no notification.
    let (_, outsider_count) = app
        .get("/api/notifications/unread-count", &outsider.token)
        .await;
    assert_eq!(outsider_count["count"], 0);

    let (_, listed) = app.get(&format!("/api/tasks/{task}/comments"), &alice.token).await;
    assert_eq!(listed["comments"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn only_author_edits_and_admins_delete() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let board_id = app.create_board(&alice, "Board").await;
    let list = app.create_list(&alice, &board_id, "Todo").await;
    app.add_board_member(&alice, &board_id, &bob, "editor").await;
    let task = app.create_task(&alice, &list, "Task").await;

    let (_, comment) = app
        .post(&format!("/api/tasks/{task}/comments"), &bob.token, json!({ "body": "first" }))
        .await;
    let comment_id = comment["id"].as_str().expect("comment id").to_string();

    let (status, _) = app
        .put(&format!("/api/comments/{comment_id}"), &alice.token, json!({ "body": "hijack" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, edited) = app
        .put(&format!("/api/comments/{comment_id}"), &bob.token, json!({ "body": "second" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["body"], "second");

    let (status, _) = app
        .put(&format!("/api/comments/{comment_id}"), &bob.token, json!({ "body": "  " }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // The board owner outranks the author.
    let (status, _) = app.delete(&format!("/api/comments/{comment_id}"), &alice.token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.delete(&format!("/api/comments/{comment_id}"), &alice.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn notification_read_state_is_per_user() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let board_id = app.create_board(&alice, "Board").await;
    app.add_board_member(&alice, &board_id, &bob, "viewer").await;

    let (_, notes) = app.get("/api/notifications", &alice.token).await;
    assert_eq!(kinds(&notes), ["invitation_accepted"]);
    let note_id = notes["notifications"][0]["id"].as_str().expect("id").to_string();
    assert_eq!(notes["notifications"][0]["is_read"], false);

    // Someone else's notification is invisible.
    let (status, _) = app
        .call("POST", &format!("/api/notifications/{note_id}/read"), Some(&bob.token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .call("POST", &format!("/api/notifications/{note_id}/read"), Some(&alice.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, count) = app.get("/api/notifications/unread-count", &alice.token).await;
    assert_eq!(count["count"], 0);

    let (status, _) = app
        .delete(&format!("/api/notifications/{note_id}"), &alice.token)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, notes) = app.get("/api/notifications?limit=0", &alice.token).await;
    assert_eq!(notes["notifications"].as_array().map(Vec::len), Some(0));
}
