use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::common::{created_response, json_body, validate_input};
use crate::{
    errors::ServiceError,
    proto::directory::{
        Cafe, CreateCafeRequest, DeleteCafeRequest, GetAllCafesRequest, UpdateCafeRequest,
        VerifyCafeCodeRequest,
    },
    AppState,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CafeView {
    pub cafe_id: i32,
    pub name: String,
    pub location: String,
    pub access_code: String,
}

impl From<Cafe> for CafeView {
    fn from(cafe: Cafe) -> Self {
        Self {
            cafe_id: cafe.cafe_id,
            name: cafe.name,
            location: cafe.location,
            access_code: cafe.access_code,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CafeListResponse {
    pub cafes: Vec<CafeView>,
}

/// Body for both creating and replacing a cafe
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct CafeRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub location: String,
    #[validate(length(min = 1, max = 64))]
    pub access_code: String,
}

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct VerifyCodeRequest {
    #[validate(length(min = 1))]
    pub access_code: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteCafeResponse {
    pub success: bool,
    pub message: String,
}

fn cafe_id_from_path(raw: &str) -> Result<i32, ServiceError> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| ServiceError::ValidationError(format!("Invalid cafe id '{}'", raw)))
}

#[utoipa::path(
    get,
    path = "/api/cafes",
    summary = "List cafes",
    responses(
        (status = 200, description = "All cafes ordered by id", body = CafeListResponse),
    ),
    tag = "Cafes"
)]
pub async fn list_cafes(
    State(state): State<AppState>,
) -> Result<Json<CafeListResponse>, ServiceError> {
    let mut client = state.clients.cafe.clone();
    let cafes = client
        .get_all_cafes(GetAllCafesRequest {})
        .await
        .map_err(ServiceError::from)?
        .into_inner()
        .cafes
        .into_iter()
        .map(CafeView::from)
        .collect();

    Ok(Json(CafeListResponse { cafes }))
}

#[utoipa::path(
    post,
    path = "/api/cafes",
    summary = "Create cafe",
    request_body = CafeRequest,
    responses(
        (status = 201, description = "Cafe created", body = CafeView),
        (status = 400, description = "Invalid cafe", body = crate::errors::ErrorResponse),
        (status = 409, description = "Access code already in use", body = crate::errors::ErrorResponse),
    ),
    tag = "Cafes"
)]
pub async fn create_cafe(
    State(state): State<AppState>,
    payload: Result<Json<CafeRequest>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let request = json_body(payload)?;
    validate_input(&request)?;

    let mut client = state.clients.cafe.clone();
    let cafe = client
        .create_cafe(CreateCafeRequest {
            name: request.name,
            location: request.location,
            access_code: request.access_code,
        })
        .await
        .map_err(ServiceError::from)?
        .into_inner();

    Ok(created_response(CafeView::from(cafe)))
}

#[utoipa::path(
    put,
    path = "/api/cafes/{id}",
    summary = "Update cafe",
    params(("id" = i32, Path, description = "Cafe identifier")),
    request_body = CafeRequest,
    responses(
        (status = 200, description = "Cafe updated", body = CafeView),
        (status = 404, description = "Unknown cafe", body = crate::errors::ErrorResponse),
        (status = 409, description = "Access code already in use", body = crate::errors::ErrorResponse),
    ),
    tag = "Cafes"
)]
pub async fn update_cafe(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<CafeRequest>, JsonRejection>,
) -> Result<Json<CafeView>, ServiceError> {
    let cafe_id = cafe_id_from_path(&id)?;
    let request = json_body(payload)?;
    validate_input(&request)?;

    let mut client = state.clients.cafe.clone();
    let cafe = client
        .update_cafe(UpdateCafeRequest {
            cafe_id,
            name: request.name,
            location: request.location,
            access_code: request.access_code,
        })
        .await
        .map_err(ServiceError::from)?
        .into_inner();

    Ok(Json(CafeView::from(cafe)))
}

/// Removes a cafe together with its inventory rows
#[utoipa::path(
    delete,
    path = "/api/cafes/{id}",
    summary = "Delete cafe",
    params(("id" = i32, Path, description = "Cafe identifier")),
    responses(
        (status = 200, description = "Cafe deleted", body = DeleteCafeResponse),
        (status = 404, description = "Unknown cafe", body = crate::errors::ErrorResponse),
    ),
    tag = "Cafes"
)]
pub async fn delete_cafe(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteCafeResponse>, ServiceError> {
    let cafe_id = cafe_id_from_path(&id)?;

    let mut client = state.clients.cafe.clone();
    let reply = client
        .delete_cafe(DeleteCafeRequest { cafe_id })
        .await
        .map_err(ServiceError::from)?
        .into_inner();

    Ok(Json(DeleteCafeResponse {
        success: reply.success,
        message: reply.message,
    }))
}

#[utoipa::path(
    post,
    path = "/api/cafes/verify",
    summary = "Resolve a cafe from its access code",
    request_body = VerifyCodeRequest,
    responses(
        (status = 200, description = "Code belongs to this cafe", body = CafeView),
        (status = 401, description = "Unknown code", body = crate::errors::ErrorResponse),
    ),
    tag = "Cafes"
)]
pub async fn verify_cafe_code(
    State(state): State<AppState>,
    payload: Result<Json<VerifyCodeRequest>, JsonRejection>,
) -> Result<Json<CafeView>, ServiceError> {
    let request = json_body(payload)?;
    validate_input(&request)?;

    let mut client = state.clients.cafe.clone();
    let cafe = client
        .verify_cafe_code(VerifyCafeCodeRequest {
            access_code: request.access_code,
        })
        .await
        .map_err(ServiceError::from)?
        .into_inner();

    Ok(Json(CafeView::from(cafe)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn path_ids_must_be_numeric() {
        assert_eq!(cafe_id_from_path(" 12").unwrap(), 12);
        assert_matches!(cafe_id_from_path("abc"), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn location_is_optional() {
        let request: CafeRequest =
            serde_json::from_str(r#"{"name": "Harbour", "access_code": "DK456"}"#).unwrap();
        assert_eq!(request.location, "");
        assert!(validate_input(&request).is_ok());
    }
}
