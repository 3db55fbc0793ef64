mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn invitee_sees_and_accepts_board_invitation() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let board_id = app.create_board(&alice, "Launch").await;

    let (status, invitation) = app
        .post(
            &format!("/api/boards/{board_id}/invitations"),
            &alice.token,
            json!({ "email": "  BOB@example.test " }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{invitation}");
    assert_eq!(invitation["email"], "bob@example.test");
    assert_eq!(invitation["role"], "viewer");
    assert_eq!(invitation["status"], "pending");
    assert_eq!(invitation["target_name"], "Launch");
    assert_eq!(invitation["invited_by_nickname"], "alice");
    let id = invitation["id"].as_str().expect("id").to_string();

    let (_, inbox) = app.get("/api/invitations", &bob.token).await;
    assert_eq!(inbox["invitations"][0]["id"], id.as_str());
    let (_, notes) = app.get("/api/notifications", &bob.token).await;
    assert_eq!(notes["notifications"][0]["kind"], "invitation_received");

    let (_, pending) = app
        .get(&format!("/api/boards/{board_id}/invitations"), &alice.token)
        .await;
    assert_eq!(pending["invitations"].as_array().map(Vec::len), Some(1));

    let (status, accepted) = app
        .call("POST", &format!("/api/invitations/{id}/accept"), Some(&bob.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["target_type"], "board");
    assert_eq!(accepted["target_id"], board_id.as_str());

    let (status, board) = app.get(&format!("/api/boards/{board_id}"), &bob.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(board["role"], "viewer");

    // Accepted invitations leave every pending list.
    let (_, inbox) = app.get("/api/invitations", &bob.token).await;
    assert_eq!(inbox["invitations"].as_array().map(Vec::len), Some(0));
    let (status, _) = app
        .call("POST", &format!("/api/invitations/{id}/accept"), Some(&bob.token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, notes) = app.get("/api/notifications", &alice.token).await;
    assert_eq!(notes["notifications"][0]["kind"], "invitation_accepted");
}

#[tokio::test]
async fn invitations_can_target_unregistered_emails() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let board_id = app.create_board(&alice, "Early").await;

    let (status, _) = app
        .post(
            &format!("/api/boards/{board_id}/invitations"),
            &alice.token,
            json!({ "email": "newcomer@example.test", "role": "editor" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let newcomer = app.register("newcomer").await;
    let (_, inbox) = app.get("/api/invitations", &newcomer.token).await;
    assert_eq!(inbox["invitations"][0]["role"], "editor");
}

#[tokio::test]
async fn duplicates_and_existing_members_conflict() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let carol = app.register("carol").await;
    let board_id = app.create_board(&alice, "Board").await;
    app.add_board_member(&alice, &board_id, &bob, "editor").await;

    let invite = |email: String| {
        let app = &app;
        let token = alice.token.clone();
        let uri = format!("/api/boards/{board_id}/invitations");
        async move { app.post(&uri, &token, json!({ "email": email })).await }
    };

    let (status, _) = invite(bob.email.clone()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = invite(alice.email.clone()).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = invite(carol.email.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = invite(carol.email.clone()).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = invite("not-an-email".to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn roles_cap_what_can_be_granted() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let eddie = app.register("eddie").await;
    let ada = app.register("ada").await;
    let board_id = app.create_board(&alice, "Board").await;
    app.add_board_member(&alice, &board_id, &eddie, "editor").await;
    app.add_board_member(&alice, &board_id, &ada, "admin").await;

    let (status, _) = app
        .post(
            &format!("/api/boards/{board_id}/invitations"),
            &eddie.token,
            json!({ "email": "x@example.test" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .post(
            &format!("/api/boards/{board_id}/invitations"),
            &alice.token,
            json!({ "email": "x@example.test", "role": "owner" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .post(
            &format!("/api/boards/{board_id}/invitations"),
            &alice.token,
            json!({ "email": "x@example.test", "role": "superuser" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            &format!("/api/boards/{board_id}/invitations"),
            &ada.token,
            json!({ "email": "x@example.test", "role": "admin" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn only_the_addressee_responds() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let mallory = app.register("mallory").await;
    let board_id = app.create_board(&alice, "Board").await;
    let (_, invitation) = app
        .post(
            &format!("/api/boards/{board_id}/invitations"),
            &alice.token,
            json!({ "email": bob.email }),
        )
        .await;
    let id = invitation["id"].as_str().expect("id").to_string();

    let (status, _) = app
        .call("POST", &format!("/api/invitations/{id}/accept"), Some(&mallory.token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call("POST", &format!("/api/invitations/{id}/decline"), Some(&bob.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let (status, _) = app.get(&format!("/api/boards/{board_id}"), &bob.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Declining frees the email for a fresh invitation.
    let (status, _) = app
        .post(
            &format!("/api/boards/{board_id}/invitations"),
            &alice.token,
            json!({ "email": bob.email }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn inviter_or_admin_cancels() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let vic = app.register("vic").await;
    let mallory = app.register("mallory").await;
    let board_id = app.create_board(&alice, "Board").await;
    app.add_board_member(&alice, &board_id, &vic, "viewer").await;
    let (_, invitation) = app
        .post(
            &format!("/api/boards/{board_id}/invitations"),
            &alice.token,
            json!({ "email": bob.email }),
        )
        .await;
    let id = invitation["id"].as_str().expect("id").to_string();

    let (status, _) = app.delete(&format!("/api/invitations/{id}"), &mallory.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete(&format!("/api/invitations/{id}"), &vic.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.delete(&format!("/api/invitations/{id}"), &alice.token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .call("POST", &format!("/api/invitations/{id}/accept"), Some(&bob.token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn expired_invitations_cannot_be_accepted() {
    let mut config = common::test_config();
    config.invitations.ttl_days = 0;
    let app = TestApp::with_config(config);
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let board_id = app.create_board(&alice, "Board").await;

    let (status, invitation) = app
        .post(
            &format!("/api/boards/{board_id}/invitations"),
            &alice.token,
            json!({ "email": bob.email }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = invitation["id"].as_str().expect("id").to_string();

    let (_, inbox) = app.get("/api/invitations", &bob.token).await;
    assert_eq!(inbox["invitations"].as_array().map(Vec::len), Some(0));

    let (status, body) = app
        .call("POST", &format!("/api/invitations/{id}/accept"), Some(&bob.token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invitation has expired");
}
