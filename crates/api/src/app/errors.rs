use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use addressbook_core::DomainError;
use addressbook_infra::StoreError;

use crate::app::services::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> Response {
    match err {
        ServiceError::Domain(e) => domain_error_to_response(e),
        ServiceError::Store(e) => store_error_to_response(e),
    }
}

pub fn domain_error_to_response(err: DomainError) -> Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
    }
}

pub fn store_error_to_response(err: StoreError) -> Response {
    match err {
        StoreError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        StoreError::Constraint(msg) => {
            json_error(StatusCode::CONFLICT, "constraint_violation", msg)
        }
        StoreError::Unavailable(msg) => {
            tracing::error!(error = %msg, "person store unavailable");
            json_error(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", msg)
        }
        StoreError::Backend(msg) => {
            tracing::error!(error = %msg, "person store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", msg)
        }
    }
}

pub fn not_found(what: impl Into<String>) -> Response {
    json_error(StatusCode::NOT_FOUND, "not_found", what)
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn parse_person_id(raw: &str) -> Result<addressbook_core::PersonId, Response> {
    raw.parse().map_err(domain_error_to_response)
}
