mod error;
mod handlers;
mod middleware;

pub use error::{ApiError, ApiJson};
pub use middleware::AuthUser;

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::db::Database;

/// Boards list at most this many users.
pub const BOARD_LIMIT: u32 = 50;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<ServerConfig>,
}

pub fn create_router(db: Database) -> Router {
    create_router_with_config(db, ServerConfig::from_env())
}

pub fn create_router_with_config(db: Database, config: ServerConfig) -> Router {
    let cors = cors_layer(&config);
    let state = AppState {
        db,
        config: Arc::new(config),
    };

    let public = Router::new()
        .route("/auth/signup", post(handlers::signup))
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        .route("/board", get(handlers::board))
        .route("/config", get(handlers::config))
        .route("/health", get(handlers::health));

    let protected = Router::new()
        .route("/auth/me", get(handlers::me))
        .route("/settings", patch(handlers::update_settings))
        .route(
            "/sessions",
            get(handlers::list_sessions).post(handlers::create_session),
        )
        .route("/sessions/{day_number}", get(handlers::get_session_by_day))
        .route("/thoughts", get(handlers::list_thoughts))
        .route("/thoughts/batch", post(handlers::create_thoughts))
        .route("/history", get(handlers::history))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .nest("/api", public.merge(protected))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    match &config.cors_origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|o| match o.parse() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!("Ignoring invalid CORS origin: {}", o);
                        None
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::PATCH])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
                .allow_credentials(true)
        }
        None => CorsLayer::permissive(),
    }
}
