use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use farepool_db::DbError;

/// API-facing error: every variant carries an HTTP status and a stable
/// SCREAMING_SNAKE code, serialized as `{status, error, message}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] DbError),
    #[error("{0}")]
    Validation(String),
    #[error("authentication required")]
    Unauthorized,
    #[error("permission denied")]
    Forbidden,
    #[error("internal server error")]
    Internal,
}

#[derive(Serialize)]
struct ErrorBody {
    status: u16,
    error: &'static str,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Domain(e) => match e {
                DbError::UserNotFound
                | DbError::PostNotFound
                | DbError::GroupNotFound
                | DbError::BillNotFound
                | DbError::LocationNotFound
                | DbError::MemberNotFound
                | DbError::MemberCountInvalid => StatusCode::NOT_FOUND,
                DbError::UsernameTaken | DbError::DuplicateJoin | DbError::GroupFull => {
                    StatusCode::CONFLICT
                }
                DbError::GroupNotJoinable
                | DbError::HostCannotLeave
                | DbError::NotGroupMember
                | DbError::InvalidAmount => StatusCode::BAD_REQUEST,
                DbError::LockPoisoned | DbError::Sqlite(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Domain(e) => match e {
                DbError::UserNotFound => "USER_NOT_FOUND",
                DbError::PostNotFound => "POST_NOT_FOUND",
                DbError::GroupNotFound => "GROUP_NOT_FOUND",
                DbError::BillNotFound => "BILL_NOT_FOUND",
                DbError::LocationNotFound => "LOCATION_NOT_FOUND",
                DbError::MemberNotFound => "NOT_FOUND",
                DbError::MemberCountInvalid => "GROUP_MEMBER_COUNT_INVALID",
                DbError::UsernameTaken => "ALREADY_EXISTS",
                DbError::DuplicateJoin => "DUPLICATE_JOIN",
                DbError::GroupFull => "GROUP_FULL",
                DbError::GroupNotJoinable => "INVALID_REQUEST",
                DbError::HostCannotLeave => "HOST_CANNOT_LEAVE",
                DbError::NotGroupMember => "NOT_GROUP_MEMBER",
                DbError::InvalidAmount => "INVALID_AMOUNT",
                DbError::LockPoisoned | DbError::Sqlite(_) => "INTERNAL_ERROR",
            },
            ApiError::Validation(_) => "INVALID_INPUT_VALUE",
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::Forbidden => "FORBIDDEN",
            ApiError::Internal => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal details are logged, never returned to the caller.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("internal error: {}", self);
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorBody {
            status: status.as_u16(),
            error: self.code(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_expected_statuses() {
        let cases = [
            (DbError::UserNotFound, StatusCode::NOT_FOUND, "USER_NOT_FOUND"),
            (DbError::DuplicateJoin, StatusCode::CONFLICT, "DUPLICATE_JOIN"),
            (DbError::GroupFull, StatusCode::CONFLICT, "GROUP_FULL"),
            (
                DbError::HostCannotLeave,
                StatusCode::BAD_REQUEST,
                "HOST_CANNOT_LEAVE",
            ),
            (
                DbError::GroupNotJoinable,
                StatusCode::BAD_REQUEST,
                "INVALID_REQUEST",
            ),
            (
                DbError::MemberCountInvalid,
                StatusCode::NOT_FOUND,
                "GROUP_MEMBER_COUNT_INVALID",
            ),
        ];
        for (db_err, status, code) in cases {
            let err = ApiError::from(db_err);
            assert_eq!(err.status(), status);
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let err = ApiError::Domain(DbError::LockPoisoned);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }
}
