use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{ParticipantId, Phase};
use crate::views::RepairOutcome;

// -- Participant --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinRequest {
    pub display_name: String,
}

/// Body for any operation that takes free text (letter, gift, relayed message).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PartnerResponse {
    pub participant_id: Option<ParticipantId>,
    pub display_name: Option<String>,
}

// -- Operator --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetPhaseRequest {
    pub phase: Phase,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetRefRequest {
    pub id: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnmatchRequest {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnmatchResponse {
    pub cleared: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MatchResponse {
    /// The new ring, in gifting order.
    pub matched: Vec<ParticipantId>,
}

/// The platform directory as the chat layer sees it. A participant missing
/// from `names`, or mapped to `null`, no longer exists there.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshNamesRequest {
    pub names: HashMap<ParticipantId, Option<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshNamesResponse {
    pub renamed: usize,
    pub dropped: Vec<ParticipantId>,
    pub failed: usize,
}

#[derive(Debug, Serialize)]
pub struct BanResponse {
    pub participant_id: ParticipantId,
    pub repair: Option<RepairOutcome>,
    pub warning: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ParticipantListResponse {
    pub count: usize,
    pub participants: Vec<ParticipantSummary>,
}

#[derive(Debug, Serialize)]
pub struct ParticipantSummary {
    pub participant_id: ParticipantId,
    pub display_name: String,
}

// -- Errors --

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
    pub hint: Option<&'static str>,
}
