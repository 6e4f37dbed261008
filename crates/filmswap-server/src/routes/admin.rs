use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use filmswap_core::NameResolver;
use filmswap_types::api::{
    BanResponse, MatchResponse, ParticipantListResponse, ParticipantSummary, PartnerResponse,
    RefreshNamesRequest, RefreshNamesResponse, SetPhaseRequest, SetRefRequest, UnmatchRequest,
    UnmatchResponse,
};
use filmswap_types::views::{BanEntry, ExchangeSummary, PhaseChange, RingReport};
use filmswap_types::{Exchange, Participant, ParticipantId};
use serde::Deserialize;

use super::blocking;
use crate::AppState;
use crate::error::ApiError;

pub async fn create_exchange(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<Exchange>), ApiError> {
    let ex = blocking(&state, |svc| svc.create_exchange()).await?;
    Ok((StatusCode::CREATED, Json(ex)))
}

pub async fn get_exchange(State(state): State<AppState>) -> Result<Json<Exchange>, ApiError> {
    let ex = blocking(&state, |svc| svc.exchange()).await?;
    Ok(Json(ex))
}

pub async fn summary(State(state): State<AppState>) -> Result<Json<ExchangeSummary>, ApiError> {
    let summary = blocking(&state, |svc| svc.summary()).await?;
    Ok(Json(summary))
}

pub async fn set_phase(
    State(state): State<AppState>,
    Json(req): Json<SetPhaseRequest>,
) -> Result<Json<PhaseChange>, ApiError> {
    let change = blocking(&state, move |svc| svc.set_phase(req.phase)).await?;
    Ok(Json(change))
}

pub async fn set_channel(
    State(state): State<AppState>,
    Json(req): Json<SetRefRequest>,
) -> Result<StatusCode, ApiError> {
    blocking(&state, move |svc| svc.set_channel(req.id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_join_message(
    State(state): State<AppState>,
    Json(req): Json<SetRefRequest>,
) -> Result<StatusCode, ApiError> {
    blocking(&state, move |svc| svc.set_join_message(req.id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn join_message(State(state): State<AppState>) -> Result<Json<Option<i64>>, ApiError> {
    let message_ref = blocking(&state, |svc| svc.join_message()).await?;
    Ok(Json(message_ref))
}

pub async fn match_now(State(state): State<AppState>) -> Result<Json<MatchResponse>, ApiError> {
    let matched = blocking(&state, |svc| svc.match_now()).await?;
    Ok(Json(MatchResponse { matched }))
}

pub async fn unmatch_all(
    State(state): State<AppState>,
    Json(req): Json<UnmatchRequest>,
) -> Result<Json<UnmatchResponse>, ApiError> {
    let cleared = blocking(&state, move |svc| svc.unmatch_all(req.force)).await?;
    Ok(Json(UnmatchResponse { cleared }))
}

pub async fn ban(
    State(state): State<AppState>,
    Path(id): Path<ParticipantId>,
) -> Result<Json<BanResponse>, ApiError> {
    let report = blocking(&state, move |svc| svc.ban(id)).await?;
    Ok(Json(BanResponse {
        participant_id: report.participant_id,
        warning: report.warning(),
        repair: report.repair,
    }))
}

pub async fn unban(
    State(state): State<AppState>,
    Path(id): Path<ParticipantId>,
) -> Result<StatusCode, ApiError> {
    blocking(&state, move |svc| svc.unban(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_banned(
    State(state): State<AppState>,
) -> Result<Json<Vec<BanEntry>>, ApiError> {
    let banned = blocking(&state, |svc| svc.list_banned()).await?;
    Ok(Json(banned))
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListFilter {
    #[default]
    All,
    WithoutLetter,
    WithoutGift,
    WithoutGiftee,
    WithoutSanta,
    NotWatched,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub filter: ListFilter,
}

pub async fn list_participants(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ParticipantListResponse>, ApiError> {
    let participants = blocking(&state, move |svc| match query.filter {
        ListFilter::All => svc.list_participants(),
        ListFilter::WithoutLetter => svc.list_without_letter(),
        ListFilter::WithoutGift => svc.list_without_gift(),
        ListFilter::WithoutGiftee => svc.list_without_giftee(),
        ListFilter::WithoutSanta => svc.list_without_santa(),
        ListFilter::NotWatched => svc.list_not_watched(),
    })
    .await?;

    let participants: Vec<ParticipantSummary> = participants
        .into_iter()
        .map(|p| ParticipantSummary {
            participant_id: p.id,
            display_name: p.display_name,
        })
        .collect();
    Ok(Json(ParticipantListResponse {
        count: participants.len(),
        participants,
    }))
}

fn partner(found: Option<Participant>) -> PartnerResponse {
    PartnerResponse {
        participant_id: found.as_ref().map(|p| p.id),
        display_name: found.map(|p| p.display_name),
    }
}

pub async fn get_santa(
    State(state): State<AppState>,
    Path(id): Path<ParticipantId>,
) -> Result<Json<PartnerResponse>, ApiError> {
    let santa = blocking(&state, move |svc| svc.get_santa(id)).await?;
    Ok(Json(partner(santa)))
}

pub async fn get_giftee(
    State(state): State<AppState>,
    Path(id): Path<ParticipantId>,
) -> Result<Json<PartnerResponse>, ApiError> {
    let giftee = blocking(&state, move |svc| svc.get_giftee(id)).await?;
    Ok(Json(partner(giftee)))
}

pub async fn mark_watched_for(
    State(state): State<AppState>,
    Path(id): Path<ParticipantId>,
) -> Result<StatusCode, ApiError> {
    blocking(&state, move |svc| svc.mark_watched_for(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Display names as pushed by the chat layer.
struct Directory(HashMap<ParticipantId, Option<String>>);

impl NameResolver for Directory {
    fn display_name(&self, id: ParticipantId) -> anyhow::Result<Option<String>> {
        Ok(self.0.get(&id).cloned().flatten())
    }
}

pub async fn refresh_display_names(
    State(state): State<AppState>,
    Json(req): Json<RefreshNamesRequest>,
) -> Result<Json<RefreshNamesResponse>, ApiError> {
    let directory = Directory(req.names);
    let report = blocking(&state, move |svc| svc.refresh_display_names(&directory)).await?;
    Ok(Json(RefreshNamesResponse {
        renamed: report.renamed,
        dropped: report.dropped,
        failed: report.failed,
    }))
}

pub async fn snapshot(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    blocking(&state, |svc| svc.snapshot()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn verify_rings(State(state): State<AppState>) -> Result<Json<RingReport>, ApiError> {
    let report = blocking(&state, |svc| svc.verify_rings()).await?;
    Ok(Json(report))
}
