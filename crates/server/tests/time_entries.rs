mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn one_running_timer_per_user() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let board_id = app.create_board(&alice, "Board").await;
    let list = app.create_list(&alice, &board_id, "Todo").await;
    let first = app.create_task(&alice, &list, "First").await;
    let second = app.create_task(&alice, &list, "Second").await;

    // The body is optional.
    let (status, entry) = app
        .call("POST", &format!("/api/tasks/{first}/time-entries/start"), Some(&alice.token), None)
        .await;
    assert_eq!(status, StatusCode::CREATED, "{entry}");
    assert_eq!(entry["running"], true);
    let entry_id = entry["id"].as_str().expect("id").to_string();

    let (status, _) = app
        .post(
            &format!("/api/tasks/{second}/time-entries/start"),
            &alice.token,
            json!({ "note": "parallel" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, running) = app.get("/api/time-entries/running", &alice.token).await;
    assert_eq!(running["entry"]["id"], entry_id.as_str());

    let (status, stopped) = app
        .call("POST", &format!("/api/time-entries/{entry_id}/stop"), Some(&alice.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stopped["running"], false);
    assert!(stopped["ended_at"].is_string());
    assert!(stopped["duration_seconds"].as_i64().expect("duration") >= 0);

    let (status, _) = app
        .call("POST", &format!("/api/time-entries/{entry_id}/stop"), Some(&alice.token), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, running) = app.get("/api/time-entries/running", &alice.token).await;
    assert!(running["entry"].is_null());
}

#[tokio::test]
async fn manual_entries_add_up() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let board_id = app.create_board(&alice, "Board").await;
    let list = app.create_list(&alice, &board_id, "Todo").await;
    let task = app.create_task(&alice, &list, "Billable").await;

    let (status, entry) = app
        .post(
            &format!("/api/tasks/{task}/time-entries"),
            &alice.token,
            json!({
                "started_at": "2026-03-01T09:00:00Z",
                "ended_at": "2026-03-01T10:30:00Z",
                "note": "pairing",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{entry}");
    assert_eq!(entry["duration_seconds"], 5400);

    app.post(
        &format!("/api/tasks/{task}/time-entries"),
        &alice.token,
        json!({ "started_at": "2026-03-02T09:00:00Z", "ended_at": "2026-03-02T09:10:00Z" }),
    )
    .await;

    let (status, _) = app
        .post(
            &format!("/api/tasks/{task}/time-entries"),
            &alice.token,
            json!({ "started_at": "2026-03-02T10:00:00Z", "ended_at": "2026-03-02T09:00:00Z" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, listed) = app.get(&format!("/api/tasks/{task}/time-entries"), &alice.token).await;
    assert_eq!(listed["entries"].as_array().map(Vec::len), Some(2));
    assert_eq!(listed["total_seconds"], 6000);

    let (_, detail) = app.get(&format!("/api/tasks/{task}"), &alice.token).await;
    assert_eq!(detail["tracked_seconds"], 6000);
}

#[tokio::test]
async fn only_the_owner_stops_and_admins_delete() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let board_id = app.create_board(&alice, "Board").await;
    let list = app.create_list(&alice, &board_id, "Todo").await;
    app.add_board_member(&alice, &board_id, &bob, "editor").await;
    let task = app.create_task(&alice, &list, "Shared").await;

    let (_, entry) = app
        .call("POST", &format!("/api/tasks/{task}/time-entries/start"), Some(&bob.token), None)
        .await;
    let entry_id = entry["id"].as_str().expect("id").to_string();

    let (status, _) = app
        .call("POST", &format!("/api/time-entries/{entry_id}/stop"), Some(&alice.token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .delete(&format!("/api/time-entries/{entry_id}"), &alice.token)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, running) = app.get("/api/time-entries/running", &bob.token).await;
    assert!(running["entry"].is_null());
}

#[tokio::test]
async fn removed_member_can_still_stop_their_timer() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let board_id = app.create_board(&alice, "Shared").await;
    app.add_board_member(&alice, &board_id, &bob, "editor").await;
    let list = app.create_list(&alice, &board_id, "Todo").await;
    let task = app.create_task(&alice, &list, "Shared work").await;

    let (status, entry) = app
        .call("POST", &format!("/api/tasks/{task}/time-entries/start"), Some(&bob.token), None)
        .await;
    assert_eq!(status, StatusCode::CREATED, "{entry}");
    let entry_id = entry["id"].as_str().expect("id").to_string();

    let (status, _) = app
        .delete(&format!("/api/boards/{board_id}/members/{}", bob.id), &alice.token)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // The task is hidden now, but the timer still belongs to bob.
    let (status, _) = app.get(&format!("/api/tasks/{task}"), &bob.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, stopped) = app
        .call("POST", &format!("/api/time-entries/{entry_id}/stop"), Some(&bob.token), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{stopped}");
    assert_eq!(stopped["running"], false);

    let (_, running) = app.get("/api/time-entries/running", &bob.token).await;
    assert!(running["entry"].is_null());

    let own_board = app.create_board(&bob, "Own").await;
    let own_list = app.create_list(&bob, &own_board, "Todo").await;
    let own_task = app.create_task(&bob, &own_list, "Solo").await;
    let (status, _) = app
        .call("POST", &format!("/api/tasks/{own_task}/time-entries/start"), Some(&bob.token), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // Bob may drop his own entry; a stranger still sees nothing.
    let carol = app.register("carol").await;
    let (status, _) = app.delete(&format!("/api/time-entries/{entry_id}"), &carol.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete(&format!("/api/time-entries/{entry_id}"), &bob.token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}
