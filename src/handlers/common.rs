use crate::errors::ServiceError;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de, Deserialize, Deserializer, Serialize};
use validator::Validate;

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(data)).into_response()
}

/// Validate request input
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ServiceError> {
    input
        .validate()
        .map_err(|e| ServiceError::ValidationError(format!("Validation failed: {}", e)))
}

/// Unwraps a JSON body, turning malformed payloads into a 400 instead of axum's 422.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ServiceError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ServiceError::ValidationError(rejection.body_text()))
}

pub fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ServiceError> {
    query
        .map(|Query(value)| value)
        .map_err(|rejection| ServiceError::ValidationError(rejection.body_text()))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawInt {
    Int(i64),
    Text(String),
}

/// Accepts `7` or `"7"`; browser forms tend to send identifiers as strings.
pub fn flexible_i32<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    match RawInt::deserialize(deserializer)? {
        RawInt::Int(value) => i32::try_from(value)
            .map_err(|_| de::Error::custom(format!("{} is out of range", value))),
        RawInt::Text(text) => text
            .trim()
            .parse::<i32>()
            .map_err(|_| de::Error::custom(format!("'{}' is not a valid integer", text))),
    }
}
