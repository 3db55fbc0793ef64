//! Taskboard HTTP server: Axum routes over a SQLite store.

pub mod error;
pub mod extract;
pub mod routes;
pub mod storage;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef},
    routing::{delete, get, post, put},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use storage::Db;
use taskboard_config::ServerConfig;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(db: Db, config: ServerConfig) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }
}

impl FromRef<AppState> for Db {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for Arc<ServerConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

/// Multipart overhead allowed on top of the configured attachment size.
const MULTIPART_SLACK_BYTES: usize = 64 * 1024;

/// Build the full application router.
pub fn build_router(state: AppState) -> Router {
    let upload_limit = usize::try_from(state.config.storage.max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_SLACK_BYTES);

    // Uploads get their own body limit; everything else keeps Axum's default.
    let uploads = Router::new()
        .route(
            "/tasks/{id}/attachments",
            post(routes::attachments::upload).get(routes::attachments::list),
        )
        .layer(DefaultBodyLimit::max(upload_limit));

    let api = Router::new()
        // Health
        .route("/health", get(routes::health::health))
        // Auth
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/refresh", post(routes::auth::refresh))
        .route("/auth/logout", post(routes::auth::logout))
        .route(
            "/auth/me",
            get(routes::auth::me)
                .put(routes::auth::update_me)
                .delete(routes::auth::delete_me),
        )
        .route("/auth/password", put(routes::auth::change_password))
        // Teams
        .route(
            "/teams",
            post(routes::teams::create_team).get(routes::teams::list_my_teams),
        )
        .route(
            "/teams/{id}",
            get(routes::teams::get_team)
                .put(routes::teams::update_team)
                .delete(routes::teams::delete_team),
        )
        .route("/teams/{id}/members", get(routes::teams::list_members))
        .route(
            "/teams/{id}/members/{user_id}",
            put(routes::teams::update_member_role).delete(routes::teams::remove_member),
        )
        .route(
            "/teams/{id}/invitations",
            post(routes::invitations::invite_to_team).get(routes::invitations::list_team_invitations),
        )
        // Boards
        .route(
            "/boards",
            post(routes::boards::create_board).get(routes::boards::list_boards),
        )
        .route(
            "/boards/{id}",
            get(routes::boards::get_board)
                .put(routes::boards::update_board)
                .delete(routes::boards::delete_board),
        )
        .route("/boards/{id}/members", get(routes::boards::list_members))
        .route(
            "/boards/{id}/members/{user_id}",
            put(routes::boards::update_member_role).delete(routes::boards::remove_member),
        )
        .route(
            "/boards/{id}/invitations",
            post(routes::invitations::invite_to_board)
                .get(routes::invitations::list_board_invitations),
        )
        .route("/boards/{id}/tasks", get(routes::tasks::list_board_tasks))
        .route(
            "/boards/{id}/lists",
            post(routes::lists::create_list),
        )
        .route(
            "/boards/{id}/labels",
            post(routes::labels::create_label).get(routes::labels::list_labels),
        )
        // Lists
        .route(
            "/lists/{id}",
            put(routes::lists::update_list).delete(routes::lists::delete_list),
        )
        .route("/lists/{id}/move", post(routes::lists::move_list))
        .route("/lists/{id}/tasks", post(routes::tasks::create_task))
        // Tasks
        .route("/tasks/mine", get(routes::tasks::my_tasks))
        .route(
            "/tasks/{id}",
            get(routes::tasks::get_task)
                .put(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route("/tasks/{id}/move", post(routes::tasks::move_task))
        .route(
            "/tasks/{id}/labels/{label_id}",
            put(routes::tasks::add_label).delete(routes::tasks::remove_label),
        )
        // Labels
        .route(
            "/labels/{id}",
            put(routes::labels::update_label).delete(routes::labels::delete_label),
        )
        // Comments
        .route(
            "/tasks/{id}/comments",
            get(routes::comments::list_comments).post(routes::comments::create_comment),
        )
        .route(
            "/comments/{id}",
            put(routes::comments::update_comment).delete(routes::comments::delete_comment),
        )
        // Attachments
        .merge(uploads)
        .route(
            "/attachments/{id}/download",
            get(routes::attachments::download),
        )
        .route("/attachments/{id}", delete(routes::attachments::delete))
        // Time entries
        .route(
            "/tasks/{id}/time-entries",
            get(routes::time_entries::list_entries).post(routes::time_entries::log_manual),
        )
        .route(
            "/tasks/{id}/time-entries/start",
            post(routes::time_entries::start_timer),
        )
        .route("/time-entries/running", get(routes::time_entries::running))
        .route("/time-entries/{id}/stop", post(routes::time_entries::stop_timer))
        .route("/time-entries/{id}", delete(routes::time_entries::delete_entry))
        // Notifications
        .route(
            "/notifications",
            get(routes::notifications::list_notifications),
        )
        .route(
            "/notifications/unread-count",
            get(routes::notifications::unread_count),
        )
        .route(
            "/notifications/read-all",
            post(routes::notifications::mark_all_read),
        )
        .route(
            "/notifications/{id}/read",
            post(routes::notifications::mark_read),
        )
        .route(
            "/notifications/{id}",
            delete(routes::notifications::delete_notification),
        )
        // Invitations
        .route("/invitations", get(routes::invitations::list_my_invitations))
        .route(
            "/invitations/{id}/accept",
            post(routes::invitations::accept_invitation),
        )
        .route(
            "/invitations/{id}/decline",
            post(routes::invitations::decline_invitation),
        )
        .route(
            "/invitations/{id}",
            delete(routes::invitations::cancel_invitation),
        );

    let mut app = Router::new().nest("/api", api);

    // Serve the pre-built web app if present
    let web_dir = PathBuf::from(&state.config.server.web_dir);
    if web_dir.exists() {
        tracing::info!("serving static files from {}", web_dir.display());
        let index_html = web_dir.join("index.html");
        app = app.fallback_service(ServeDir::new(&web_dir).fallback(ServeFile::new(index_html)));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
