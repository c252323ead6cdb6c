use tonic::metadata::MetadataValue;
use tonic::{Code, Status};
use tracing::error;

use super::ServiceError;

/// Metadata key carrying the item that ran out of stock on a `FAILED_PRECONDITION`
pub const INSUFFICIENT_ITEM_KEY: &str = "x-insufficient-item-id";

/// Metadata key distinguishing specific conflicts on `ALREADY_EXISTS`
pub const ERROR_KIND_KEY: &str = "x-error-kind";

const DUPLICATE_ACCESS_CODE_KIND: &str = "duplicate-access-code";

/// Extension trait for converting ServiceError to gRPC Status with proper codes
pub trait IntoGrpcStatus {
    fn into_grpc_status(self) -> Status;
}

impl IntoGrpcStatus for ServiceError {
    fn into_grpc_status(self) -> Status {
        match self {
            ServiceError::NotFound(msg) => Status::not_found(msg),
            ServiceError::ValidationError(msg) => Status::invalid_argument(msg),
            ServiceError::InvalidOperation(msg) => Status::failed_precondition(msg),
            ServiceError::Unauthorized(msg) => Status::unauthenticated(msg),
            ServiceError::Conflict(msg) => Status::already_exists(msg),
            ServiceError::DuplicateAccessCode(msg) => {
                let mut status = Status::already_exists(msg);
                status.metadata_mut().insert(
                    ERROR_KIND_KEY,
                    MetadataValue::from_static(DUPLICATE_ACCESS_CODE_KIND),
                );
                status
            }
            ServiceError::InsufficientStock { item_id } => {
                let mut status = Status::failed_precondition(format!(
                    "Insufficient stock for item {}",
                    item_id
                ));
                status
                    .metadata_mut()
                    .insert(INSUFFICIENT_ITEM_KEY, MetadataValue::from(item_id));
                status
            }
            ServiceError::ServiceUnavailable(msg) => {
                error!("Upstream unavailable: {}", msg);
                Status::unavailable(msg)
            }
            ServiceError::DatabaseError(err) => {
                error!("Database error: {}", err);
                Status::internal("Database operation failed")
            }
            ServiceError::InternalError(msg) | ServiceError::HashError(msg) => {
                error!("Internal error: {}", msg);
                Status::internal("Internal server error")
            }
        }
    }
}

/// Helper function to map Result<T, ServiceError> to Result<T, Status>
pub fn map_service_error<T>(result: Result<T, ServiceError>) -> Result<T, Status> {
    result.map_err(|e| e.into_grpc_status())
}

/// Maps a status returned by a downstream service back onto the shared error type.
impl From<Status> for ServiceError {
    fn from(status: Status) -> Self {
        let message = status.message().to_string();
        match status.code() {
            Code::NotFound => ServiceError::NotFound(message),
            Code::InvalidArgument | Code::OutOfRange => ServiceError::ValidationError(message),
            Code::Unauthenticated | Code::PermissionDenied => ServiceError::Unauthorized(message),
            Code::AlreadyExists => {
                let kind = status
                    .metadata()
                    .get(ERROR_KIND_KEY)
                    .and_then(|v| v.to_str().ok());
                if kind == Some(DUPLICATE_ACCESS_CODE_KIND) {
                    ServiceError::DuplicateAccessCode(message)
                } else {
                    ServiceError::Conflict(message)
                }
            }
            Code::FailedPrecondition => {
                let item_id = status
                    .metadata()
                    .get(INSUFFICIENT_ITEM_KEY)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<i32>().ok());
                match item_id {
                    Some(item_id) => ServiceError::InsufficientStock { item_id },
                    None => ServiceError::InvalidOperation(message),
                }
            }
            Code::Unavailable | Code::DeadlineExceeded | Code::Cancelled => {
                ServiceError::ServiceUnavailable(message)
            }
            _ => ServiceError::InternalError(message),
        }
    }
}
