use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use loom_suggest::CompletionClient;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

use crate::config::ServerConfig;
use crate::handlers::{chat, export, health};
use crate::rate_limit::{limit_requests, RateLimiter};

#[derive(Clone)]
pub struct AppState {
    pub client: Arc<dyn CompletionClient>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(client: Arc<dyn CompletionClient>, config: &ServerConfig) -> Self {
        Self {
            client,
            limiter: Arc::new(RateLimiter::new(config.rate_limit_max, config.rate_limit_window)),
        }
    }
}

pub fn create_app(state: AppState, allowed_origins: &[String]) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allow_origin(allowed_origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", api_routes(state.clone()))
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(state)
}

/// Credentials are allowed, which rules out a literal `*`; a wildcard entry
/// mirrors the request origin instead.
fn allow_origin(allowed_origins: &[String]) -> AllowOrigin {
    if allowed_origins.iter().any(|o| o == "*") {
        return AllowOrigin::mirror_request();
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    AllowOrigin::list(origins)
}

fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/chat", post(chat::chat))
        .route("/export", post(export::export_code))
        .route_layer(middleware::from_fn_with_state(state, limit_requests))
}
