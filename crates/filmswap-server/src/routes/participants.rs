//! Participant commands, relayed by the chat layer. The `{id}` segment is the
//! caller's platform id; it is trusted because the request carries the
//! command token (see [`crate::middleware::require_command`]).

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use filmswap_types::ParticipantId;
use filmswap_types::api::{JoinRequest, TextRequest};
use filmswap_types::views::{GiftReceipt, GiftReview, GifteeLetter, LetterView};

use super::blocking;
use crate::AppState;
use crate::error::ApiError;

pub async fn join(
    State(state): State<AppState>,
    Path(id): Path<ParticipantId>,
    Json(req): Json<JoinRequest>,
) -> Result<StatusCode, ApiError> {
    blocking(&state, move |svc| svc.join(id, &req.display_name)).await?;
    Ok(StatusCode::CREATED)
}

pub async fn leave(
    State(state): State<AppState>,
    Path(id): Path<ParticipantId>,
) -> Result<StatusCode, ApiError> {
    blocking(&state, move |svc| svc.leave(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn check_active(
    State(state): State<AppState>,
    Path(id): Path<ParticipantId>,
) -> Result<StatusCode, ApiError> {
    blocking(&state, move |svc| svc.check_active(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn review_letter(
    State(state): State<AppState>,
    Path(id): Path<ParticipantId>,
) -> Result<Json<LetterView>, ApiError> {
    let view = blocking(&state, move |svc| svc.review_letter(id)).await?;
    Ok(Json(view))
}

pub async fn set_letter(
    State(state): State<AppState>,
    Path(id): Path<ParticipantId>,
    Json(req): Json<TextRequest>,
) -> Result<StatusCode, ApiError> {
    blocking(&state, move |svc| svc.set_letter(id, &req.text)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_letterboxd(
    State(state): State<AppState>,
    Path(id): Path<ParticipantId>,
    Json(req): Json<TextRequest>,
) -> Result<StatusCode, ApiError> {
    blocking(&state, move |svc| svc.set_letterboxd(id, &req.text)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn review_gift(
    State(state): State<AppState>,
    Path(id): Path<ParticipantId>,
) -> Result<Json<GiftReview>, ApiError> {
    let view = blocking(&state, move |svc| svc.review_gift(id)).await?;
    Ok(Json(view))
}

pub async fn set_gift(
    State(state): State<AppState>,
    Path(id): Path<ParticipantId>,
    Json(req): Json<TextRequest>,
) -> Result<StatusCode, ApiError> {
    blocking(&state, move |svc| svc.set_gift(id, &req.text)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn read_giftee_letter(
    State(state): State<AppState>,
    Path(id): Path<ParticipantId>,
) -> Result<Json<GifteeLetter>, ApiError> {
    let view = blocking(&state, move |svc| svc.read_giftee_letter(id)).await?;
    Ok(Json(view))
}

pub async fn receive_gift(
    State(state): State<AppState>,
    Path(id): Path<ParticipantId>,
) -> Result<Json<GiftReceipt>, ApiError> {
    let view = blocking(&state, move |svc| svc.receive_gift(id)).await?;
    Ok(Json(view))
}

pub async fn mark_watched(
    State(state): State<AppState>,
    Path(id): Path<ParticipantId>,
) -> Result<StatusCode, ApiError> {
    blocking(&state, move |svc| svc.mark_watched(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn message_santa(
    State(state): State<AppState>,
    Path(id): Path<ParticipantId>,
    Json(req): Json<TextRequest>,
) -> Result<StatusCode, ApiError> {
    blocking(&state, move |svc| svc.message_santa(id, &req.text)).await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn message_giftee(
    State(state): State<AppState>,
    Path(id): Path<ParticipantId>,
    Json(req): Json<TextRequest>,
) -> Result<StatusCode, ApiError> {
    blocking(&state, move |svc| svc.message_giftee(id, &req.text)).await?;
    Ok(StatusCode::ACCEPTED)
}
