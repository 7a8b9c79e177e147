use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use addressbook_people::Person;

use crate::app::services::{PersonManagementService, ServiceResult};
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_persons).post(create_person))
        .route("/count", get(count_persons))
        .route("/search/living-in-city", get(living_in_city))
        .route("/search/by-name", get(by_name))
        .route("/search/of-age", get(of_age))
        .route("/search/minors", get(minors))
        .route(
            "/:id",
            get(get_person).put(replace_person).delete(delete_person),
        )
        .route("/:id/addresses", post(add_address))
}

fn persons_response(result: ServiceResult<Vec<Person>>) -> Response {
    match result {
        Ok(persons) => (StatusCode::OK, Json(dto::persons_to_json(&persons))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_persons(Extension(svc): Extension<Arc<PersonManagementService>>) -> Response {
    persons_response(svc.find_all().await)
}

pub async fn count_persons(Extension(svc): Extension<Arc<PersonManagementService>>) -> Response {
    match svc.count().await {
        Ok(count) => (StatusCode::OK, Json(serde_json::json!({ "count": count }))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_person(
    Extension(svc): Extension<Arc<PersonManagementService>>,
    Json(body): Json<dto::PersonRequest>,
) -> Response {
    let (birth_date, addresses) = match body.validated_parts() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match svc
        .create_person(&body.first_name, &body.last_name, birth_date, addresses)
        .await
    {
        Ok(person) => (StatusCode::CREATED, Json(dto::person_to_json(&person))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_person(
    Extension(svc): Extension<Arc<PersonManagementService>>,
    Path(id): Path<String>,
) -> Response {
    let id = match errors::parse_person_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match svc.find_one_with_addresses(id).await {
        Ok(Some(person)) => (StatusCode::OK, Json(dto::person_to_json(&person))).into_response(),
        Ok(None) => errors::not_found(format!("person {id}")),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn replace_person(
    Extension(svc): Extension<Arc<PersonManagementService>>,
    Path(id): Path<String>,
    Json(body): Json<dto::PersonRequest>,
) -> Response {
    let id = match errors::parse_person_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let (birth_date, addresses) = match body.validated_parts() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match svc
        .replace_person(id, &body.first_name, &body.last_name, birth_date, addresses)
        .await
    {
        Ok(person) => (StatusCode::OK, Json(dto::person_to_json(&person))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_person(
    Extension(svc): Extension<Arc<PersonManagementService>>,
    Path(id): Path<String>,
) -> Response {
    let id = match errors::parse_person_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match svc.delete_by_id(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn add_address(
    Extension(svc): Extension<Arc<PersonManagementService>>,
    Path(id): Path<String>,
    Json(body): Json<dto::AddressRequest>,
) -> Response {
    let id = match errors::parse_person_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let address = match body.to_new_address() {
        Ok(a) => a,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match svc.add_address(id, address).await {
        Ok(person) => (StatusCode::CREATED, Json(dto::person_to_json(&person))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn living_in_city(
    Extension(svc): Extension<Arc<PersonManagementService>>,
    Query(q): Query<dto::CityQuery>,
) -> Response {
    persons_response(svc.find_all_living_in_city(&q.city).await)
}

pub async fn by_name(
    Extension(svc): Extension<Arc<PersonManagementService>>,
    Query(q): Query<dto::NameQuery>,
) -> Response {
    match svc.find_by_first_and_last_name(&q.first_name, &q.last_name).await {
        Ok(Some(person)) => (StatusCode::OK, Json(dto::person_to_json(&person))).into_response(),
        Ok(None) => errors::not_found(format!("person {} {}", q.first_name, q.last_name)),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn of_age(
    Extension(svc): Extension<Arc<PersonManagementService>>,
    Query(q): Query<dto::OfAgeQuery>,
) -> Response {
    let result = svc
        .find_all_of_age_matching(q.last_name.as_deref(), q.with_address)
        .await;
    persons_response(result)
}

pub async fn minors(Extension(svc): Extension<Arc<PersonManagementService>>) -> Response {
    persons_response(svc.find_all_minors().await)
}
