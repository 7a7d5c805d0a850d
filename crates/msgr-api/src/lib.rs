pub mod auth;
pub mod chats;
pub mod error;
pub mod guard;
pub mod inbox;
pub mod middleware;
pub mod sync;
pub mod users;

use std::sync::Arc;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use msgr_db::Database;

use crate::error::ChatError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub limits: ChatLimits,
}

#[derive(Debug, Clone, Copy)]
pub struct ChatLimits {
    /// Longest accepted message, in characters.
    pub max_message_len: usize,
    pub history_page_size: u32,
}

impl Default for ChatLimits {
    fn default() -> Self {
        Self {
            max_message_len: 1000,
            history_page_size: 20,
        }
    }
}

/// Build the full HTTP surface. Everything except `/auth/*` requires a
/// bearer token.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/chats", get(chats::list_chats))
        .route("/chats/delete-message", post(chats::delete_message))
        .route("/chats/{chat_id}", get(chats::get_chat).post(chats::post_chat))
        .route("/chats/{chat_id}/messages", get(chats::get_history))
        .route("/users", get(users::search))
        .route("/users/{profile_id}", get(users::profile).post(users::start_chat))
        .layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run blocking store work off the async runtime.
pub(crate) async fn run_blocking<F, T>(state: &AppState, f: F) -> Result<T, ChatError>
where
    F: FnOnce(&Database) -> Result<T, ChatError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ChatError::Store(anyhow::anyhow!("blocking task failed: {}", e))
        })?
}
