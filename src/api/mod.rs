//! HTTP surface: channel webhooks and the operator API

pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod types;
pub mod webhooks;

pub use error::ApiError;
pub use handlers::AppState;
pub use routes::build_router;
pub use server::serve_api;
