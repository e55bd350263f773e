use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use xposed_shared::error::{AppealError, IdentityError};
use xposed_store::StoreError;

use crate::notify::NotifyError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Instrument is not valid for type {0}")]
    InvalidInstrument(String),

    #[error("Invalid instrument type: {0:?}")]
    InvalidInstrumentType(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Invalid principal token: {0}")]
    InvalidToken(#[from] IdentityError),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("An active subscription is required")]
    SubscriptionRequired,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Notification dispatch failed: {0}")]
    Notify(#[from] NotifyError),
}

impl From<AppealError> for ServerError {
    fn from(err: AppealError) -> Self {
        ServerError::Store(StoreError::Appeal(err))
    }
}

impl ServerError {
    /// HTTP status and stable machine-readable kind.
    fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            ServerError::InvalidInstrument(_) => (StatusCode::BAD_REQUEST, "InvalidInstrument"),
            ServerError::InvalidInstrumentType(_) => {
                (StatusCode::BAD_REQUEST, "InvalidInstrumentType")
            }
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
            ServerError::Unauthenticated => (StatusCode::UNAUTHORIZED, "Unauthenticated"),
            ServerError::InvalidToken(_) => (StatusCode::UNAUTHORIZED, "InvalidToken"),
            ServerError::Forbidden(_) => (StatusCode::FORBIDDEN, "Forbidden"),
            ServerError::SubscriptionRequired => (StatusCode::FORBIDDEN, "SubscriptionRequired"),
            ServerError::Store(err) => match err {
                StoreError::ReportNotFound => (StatusCode::NOT_FOUND, "ReportNotFound"),
                StoreError::InstrumentNotFound => (StatusCode::NOT_FOUND, "InstrumentNotFound"),
                StoreError::AppealNotFound => (StatusCode::NOT_FOUND, "AppealNotFound"),
                StoreError::WatchlistEntryNotFound => {
                    (StatusCode::NOT_FOUND, "WatchlistEntryNotFound")
                }
                StoreError::NotOwner => (StatusCode::UNAUTHORIZED, "NotOwner"),
                StoreError::DuplicateReview => (StatusCode::BAD_REQUEST, "DuplicateReview"),
                StoreError::DuplicateAppeal => (StatusCode::BAD_REQUEST, "DuplicateAppeal"),
                StoreError::DuplicateWatch => (StatusCode::CONFLICT, "DuplicateWatch"),
                StoreError::InstrumentTypeMismatch { .. } => {
                    (StatusCode::CONFLICT, "InstrumentTypeMismatch")
                }
                StoreError::Appeal(AppealError::AlreadyResolved(_)) => {
                    (StatusCode::CONFLICT, "AppealAlreadyResolved")
                }
                StoreError::Appeal(AppealError::InvalidAction(_)) => {
                    (StatusCode::BAD_REQUEST, "InvalidAction")
                }
                StoreError::Sqlite(_)
                | StoreError::Io(_)
                | StoreError::Migration(_)
                | StoreError::Json(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
            },
            ServerError::Notify(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "NotificationFailed")
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, kind) = self.classify();

        let message = if status.is_server_error() {
            tracing::error!(error = %self, kind, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = serde_json::json!({
            "error": kind,
            "message": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
