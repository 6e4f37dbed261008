pub mod admin;
pub mod participants;

use axum::http::StatusCode;
use filmswap_core::{SwapError, SwapService};
use tracing::error;

use crate::AppState;
use crate::error::ApiError;

/// Run a core operation off the async runtime. Core calls block on SQLite.
pub(crate) async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&SwapService) -> Result<T, SwapError> + Send + 'static,
    T: Send + 'static,
{
    let service = state.service.clone();
    tokio::task::spawn_blocking(move || f(&service))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })?
        .map_err(ApiError::from)
}

pub async fn health() -> StatusCode {
    StatusCode::OK
}
