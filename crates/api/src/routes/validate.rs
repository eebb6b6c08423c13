use axum::{http::StatusCode, Json};
use sched_core::{validate, InMemoryStore, ValidationError};
use serde::Serialize;
use types::{InputError, Snapshot};

#[derive(Serialize, utoipa::ToSchema)]
pub struct ValidationReport {
    pub ok: bool,
    #[serde(default)]
    pub errors: Vec<InputError>,
}

#[utoipa::path(
    post,
    path = "/v1/validate",
    request_body = Snapshot,
    responses(
    (status = 200, description = "Validation result", body = ValidationReport)
    )
)]
pub async fn validate_handler(Json(snapshot): Json<Snapshot>) -> (StatusCode, Json<ValidationReport>) {
    let store = InMemoryStore::new(snapshot);
    match validate(&store) {
        Ok(()) => (StatusCode::OK, Json(ValidationReport { ok: true, errors: vec![] })),
        Err(ValidationError::Invalid(errors)) => (StatusCode::OK, Json(ValidationReport { ok: false, errors })),
    }
}
