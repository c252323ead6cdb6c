use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::common::{flexible_i32, json_body, validate_input};
use crate::{
    errors::ServiceError,
    proto::login::{AuthenticateCafeRequest, ListCafesRequest},
    AppState,
};

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct CafeLoginRequest {
    #[serde(deserialize_with = "flexible_i32")]
    #[validate(range(min = 1))]
    pub cafe_id: i32,
    #[validate(length(min = 1))]
    pub access_code: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CafeLoginResponse {
    pub success: bool,
    pub message: String,
    pub cafe_id: i32,
    pub cafe_name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CafeSummaryView {
    pub cafe_id: i32,
    pub name: String,
    pub location: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CafeSummaryListResponse {
    pub cafes: Vec<CafeSummaryView>,
}

/// Cafe staff login
///
/// A wrong code and an unknown cafe both answer 401 with the same message.
#[utoipa::path(
    post,
    path = "/api/login",
    summary = "Cafe login",
    request_body = CafeLoginRequest,
    responses(
        (status = 200, description = "Credentials accepted", body = CafeLoginResponse),
        (status = 400, description = "Malformed request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse),
    ),
    tag = "Login"
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<CafeLoginRequest>, JsonRejection>,
) -> Result<Json<CafeLoginResponse>, ServiceError> {
    let request = json_body(payload)?;
    validate_input(&request)?;

    let mut client = state.clients.login.clone();
    let reply = client
        .authenticate_cafe(AuthenticateCafeRequest {
            cafe_id: request.cafe_id,
            access_code: request.access_code,
        })
        .await
        .map_err(ServiceError::from)?
        .into_inner();

    Ok(Json(CafeLoginResponse {
        success: reply.success,
        message: reply.message,
        cafe_id: reply.cafe_id,
        cafe_name: reply.cafe_name,
    }))
}

#[utoipa::path(
    get,
    path = "/api/login/cafes",
    summary = "Cafes offered on the login screen",
    responses(
        (status = 200, description = "Cafes ordered by name", body = CafeSummaryListResponse),
    ),
    tag = "Login"
)]
pub async fn list_login_cafes(
    State(state): State<AppState>,
) -> Result<Json<CafeSummaryListResponse>, ServiceError> {
    let mut client = state.clients.login.clone();
    let cafes = client
        .list_cafes(ListCafesRequest {})
        .await
        .map_err(ServiceError::from)?
        .into_inner()
        .cafes
        .into_iter()
        .map(|c| CafeSummaryView {
            cafe_id: c.cafe_id,
            name: c.name,
            location: c.location,
        })
        .collect();

    Ok(Json(CafeSummaryListResponse { cafes }))
}
