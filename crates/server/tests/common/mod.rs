#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use taskboard_config::ServerConfig;
use taskboard_server::{AppState, build_router, storage::Db};

/// Router over an in-memory database plus the directory holding attachments.
pub struct TestApp {
    pub router: Router,
    pub dir: tempfile::TempDir,
}

/// A registered account and its bearer token.
pub struct TestUser {
    pub id: String,
    pub email: String,
    pub nickname: String,
    pub token: String,
}

pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.auth.jwt_secret = "integration-test-secret".into();
    config.auth.password_iterations = 1_000;
    config.storage.max_upload_bytes = 1024;
    config
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(mut config: ServerConfig) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        config.storage.data_dir = dir.path().display().to_string();
        config.server.web_dir = dir.path().join("no-web").display().to_string();
        let db = Db::open_in_memory(dir.path()).expect("open db");
        let router = build_router(AppState::new(db, config));
        Self { router, dir }
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.router.clone().oneshot(req).await.expect("request");
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }

    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");
        self.send(req).await
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call("GET", uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call("POST", uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call("PUT", uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call("DELETE", uri, Some(token), None).await
    }

    pub async fn register(&self, nickname: &str) -> TestUser {
        let email = format!("{nickname}@example.test");
        let (status, body) = self
            .call(
                "POST",
                "/api/auth/register",
                None,
                Some(json!({
                    "email": email,
                    "password": "correct-horse",
                    "nickname": nickname,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register {nickname}: {body}");
        TestUser {
            id: body["user_id"].as_str().expect("user_id").to_string(),
            email,
            nickname: nickname.to_string(),
            token: body["access_token"].as_str().expect("access_token").to_string(),
        }
    }

    pub async fn create_board(&self, owner: &TestUser, title: &str) -> String {
        let (status, body) = self
            .post("/api/boards", &owner.token, json!({ "title": title }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create board: {body}");
        body["id"].as_str().expect("board id").to_string()
    }

    pub async fn create_list(&self, user: &TestUser, board_id: &str, title: &str) -> String {
        let (status, body) = self
            .post(
                &format!("/api/boards/{board_id}/lists"),
                &user.token,
                json!({ "title": title }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create list: {body}");
        body["id"].as_str().expect("list id").to_string()
    }

    pub async fn create_task(&self, user: &TestUser, list_id: &str, title: &str) -> String {
        let (status, body) = self
            .post(
                &format!("/api/lists/{list_id}/tasks"),
                &user.token,
                json!({ "title": title }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create task: {body}");
        body["id"].as_str().expect("task id").to_string()
    }

    /// Invite `invitee` to the board with `role` and accept on their behalf.
    pub async fn add_board_member(
        &self,
        owner: &TestUser,
        board_id: &str,
        invitee: &TestUser,
        role: &str,
    ) {
        let (status, body) = self
            .post(
                &format!("/api/boards/{board_id}/invitations"),
                &owner.token,
                json!({ "email": invitee.email, "role": role }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "invite: {body}");
        let invitation_id = body["id"].as_str().expect("invitation id").to_string();
        let (status, body) = self
            .call(
                "POST",
                &format!("/api/invitations/{invitation_id}/accept"),
                Some(&invitee.token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "accept: {body}");
    }
}

/// Titles of the tasks in `list_id`, in position order, as seen on the board.
pub fn list_task_titles(board: &Value, list_id: &str) -> Vec<String> {
    board["lists"]
        .as_array()
        .expect("lists")
        .iter()
        .find(|l| l["id"] == list_id)
        .expect("list present")["tasks"]
        .as_array()
        .expect("tasks")
        .iter()
        .map(|t| t["title"].as_str().expect("title").to_string())
        .collect()
}
