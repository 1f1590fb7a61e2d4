pub mod app;
pub mod config;
pub mod error;
pub mod handlers;
pub mod rate_limit;

pub use app::{create_app, AppState};
pub use config::{ConfigError, ServerConfig};
pub use error::ApiError;
