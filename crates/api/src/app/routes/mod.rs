use axum::Router;

pub mod persons;
pub mod system;

/// Router for all resource endpoints.
pub fn router() -> Router {
    Router::new().nest("/person", persons::router())
}
