use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use super::common::{flexible_i32, json_body, validate_input};
use crate::{
    errors::ServiceError,
    proto::admin::{AdminLoginRequest as AdminLoginRpc, UpdateAdminInfoRequest},
    AppState,
};

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct AdminLoginRequest {
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdminLoginResponse {
    pub success: bool,
    pub message: String,
    pub admin_id: i32,
    pub username: String,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Either field may be omitted, but not both
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateAdminRequest {
    #[serde(deserialize_with = "flexible_i32")]
    #[validate(range(min = 1))]
    pub admin_id: i32,
    #[serde(default)]
    #[validate(custom = "not_blank")]
    pub username: Option<String>,
    #[serde(default)]
    #[validate(custom = "not_blank")]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateAdminResponse {
    pub success: bool,
    pub message: String,
}

#[utoipa::path(
    post,
    path = "/adminlogin",
    summary = "Admin login",
    request_body = AdminLoginRequest,
    responses(
        (status = 200, description = "Credentials accepted", body = AdminLoginResponse),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse),
    ),
    tag = "Admin"
)]
pub async fn admin_login(
    State(state): State<AppState>,
    payload: Result<Json<AdminLoginRequest>, JsonRejection>,
) -> Result<Json<AdminLoginResponse>, ServiceError> {
    let request = json_body(payload)?;
    validate_input(&request)?;

    let mut client = state.clients.admin.clone();
    let reply = client
        .login(AdminLoginRpc {
            username: request.username,
            password: request.password,
        })
        .await
        .map_err(ServiceError::from)?
        .into_inner();

    Ok(Json(AdminLoginResponse {
        success: reply.success,
        message: reply.message,
        admin_id: reply.admin_id,
        username: reply.username,
    }))
}

#[utoipa::path(
    post,
    path = "/api/admin/update",
    summary = "Change admin username or password",
    request_body = UpdateAdminRequest,
    responses(
        (status = 200, description = "Admin updated", body = UpdateAdminResponse),
        (status = 400, description = "Nothing to update or blank field", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown admin", body = crate::errors::ErrorResponse),
        (status = 409, description = "Username already taken", body = crate::errors::ErrorResponse),
    ),
    tag = "Admin"
)]
pub async fn update_admin_info(
    State(state): State<AppState>,
    payload: Result<Json<UpdateAdminRequest>, JsonRejection>,
) -> Result<Json<UpdateAdminResponse>, ServiceError> {
    let request = json_body(payload)?;
    validate_input(&request)?;
    if request.username.is_none() && request.password.is_none() {
        return Err(ServiceError::ValidationError(
            "Nothing to update".to_string(),
        ));
    }

    let mut client = state.clients.admin.clone();
    let reply = client
        .update_admin_info(UpdateAdminInfoRequest {
            admin_id: request.admin_id,
            username: request.username,
            password: request.password,
        })
        .await
        .map_err(ServiceError::from)?
        .into_inner();

    Ok(Json(UpdateAdminResponse {
        success: reply.success,
        message: reply.message,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_optional_fields_are_rejected() {
        let request = UpdateAdminRequest {
            admin_id: 1,
            username: Some("  ".into()),
            password: None,
        };
        assert!(validate_input(&request).is_err());

        let request = UpdateAdminRequest {
            admin_id: 1,
            username: None,
            password: Some("s3cret".into()),
        };
        assert!(validate_input(&request).is_ok());
    }
}
