// Library root for the social media API

pub mod config;
pub mod db;
pub mod env;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
