// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::pins::PinError;
use crate::storage::StorageError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(_) | StorageError::InvalidPath(_) => {
                ApiError::not_found("Not found")
            }
            StorageError::PermissionDenied { .. } => {
                ApiError::forbidden("You can only modify your own folder.")
            }
            other => {
                error!(error = %other, "Storage operation failed");
                ApiError::internal("Storage error")
            }
        }
    }
}

impl From<PinError> for ApiError {
    fn from(e: PinError) -> Self {
        match e {
            PinError::NotFound => ApiError::not_found(e.to_string()),
            PinError::LockedOut => ApiError::new(StatusCode::TOO_MANY_REQUESTS, e.to_string()),
            PinError::Decrypt
            | PinError::Persistence(_)
            | PinError::Filesystem(_)
            | PinError::Metadata(_)
            | PinError::Crypto(_) => {
                error!(error = %e, "PIN operation failed");
                ApiError::internal(e.to_string())
            }
            _ => ApiError::bad_request(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn constructors_set_status_and_message() {
        let nf = ApiError::not_found("missing");
        assert_eq!(nf.status, StatusCode::NOT_FOUND);
        assert_eq!(nf.message, "missing");

        let bad = ApiError::bad_request("bad");
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);

        let forbidden = ApiError::forbidden("nope");
        assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

        let internal = ApiError::internal("oops");
        assert_eq!(internal.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn pin_errors_map_to_statuses() {
        assert_eq!(
            ApiError::from(PinError::WrongPin).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(PinError::PinTooShort).message,
            "PIN must be at least 4 characters"
        );
        assert_eq!(
            ApiError::from(PinError::NotFound).status,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(PinError::Decrypt).status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(PinError::Persistence(StorageError::NotFound("pins".into()))).status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(PinError::LockedOut).status,
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn storage_errors_map_to_statuses() {
        assert_eq!(
            ApiError::from(StorageError::InvalidPath("..".into())).status,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(StorageError::PermissionDenied {
                client: "1.1.1.1".into(),
                folder: "2.2.2.2".into(),
            })
            .status,
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"bad data"}"#);
    }
}
