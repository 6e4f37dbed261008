use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use filmswap_core::{ErrorKind, SwapError};
use filmswap_types::api::ErrorResponse;
use tracing::{error, warn};

/// Handler error. Domain errors map onto a status by kind and are returned
/// as an [`ErrorResponse`] body.
#[derive(Debug)]
pub enum ApiError {
    Swap(SwapError),
    /// The blocking task running the operation panicked or was cancelled.
    Internal,
}

impl From<SwapError> for ApiError {
    fn from(e: SwapError) -> Self {
        Self::Swap(e)
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::State | ErrorKind::InsufficientParticipants => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Configuration => StatusCode::PRECONDITION_FAILED,
        ErrorKind::Delivery => StatusCode::BAD_GATEWAY,
        ErrorKind::InvariantViolation | ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let e = match self {
            Self::Swap(e) => e,
            Self::Internal => {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: "internal",
                        message: "internal error".into(),
                        hint: None,
                    }),
                )
                    .into_response();
            }
        };

        let kind = e.kind();
        let status = status_for(kind);
        match kind {
            ErrorKind::InvariantViolation | ErrorKind::Storage => error!("{}: {:#}", kind.as_str(), e),
            ErrorKind::Delivery => warn!("{:#}", e),
            _ => {}
        }

        // Storage failures carry database detail that stays in the log.
        let message = if kind == ErrorKind::Storage {
            "storage error".to_string()
        } else {
            e.to_string()
        };

        (
            status,
            Json(ErrorResponse {
                error: kind.as_str(),
                message,
                hint: e.hint(),
            }),
        )
            .into_response()
    }
}
