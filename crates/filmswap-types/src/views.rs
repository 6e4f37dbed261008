//! Read-side results returned by exchange operations.
//!
//! These are outcomes, not errors: "your santa hasn't submitted yet" is a
//! normal answer to `receive_gift`, so it is a variant here rather than an
//! error variant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ParticipantId, Phase};

/// A participant reviewing their own letter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LetterView {
    NotSet,
    Letter { author_name: String, text: String },
}

/// A participant reviewing the gift they submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GiftReview {
    NotSet,
    NoGiftee,
    Submitted { giftee_name: String, text: String },
}

/// A santa reading their giftee's letter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GifteeLetter {
    NoGiftee,
    NotWritten,
    NotStarted,
    Letter { giftee_name: String, text: String },
}

/// A participant opening the gift from their santa.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GiftReceipt {
    NoSanta,
    /// Gifts are only revealed once the watch phase starts.
    NotRevealed { phase: Phase },
    NotSubmitted,
    Gift { recipient_name: String, text: String },
}

/// What the graph repair did when a participant was removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RepairOutcome {
    /// `santa` now gifts directly to `giftee`.
    Spliced {
        santa: ParticipantId,
        giftee: ParticipantId,
    },
    /// The removed participant was in a two-person ring. The survivor is
    /// unlinked and waits for the next match.
    Dissolved { remaining: ParticipantId },
    /// The removed participant did not have both a santa and a giftee, so
    /// there was nothing to re-link.
    NotMatched,
}

impl RepairOutcome {
    pub fn warning(&self) -> Option<String> {
        match self {
            Self::NotMatched => Some(
                "removed participant did not have both a santa and a giftee, so no connections were rerouted. \
                 This is expected during the join phase; in the exchange or watch phase a ring may be broken"
                    .to_string(),
            ),
            Self::Dissolved { remaining } => Some(format!(
                "removed participant was in a two-person ring; {remaining} is unmatched until the next match"
            )),
            Self::Spliced { .. } => None,
        }
    }
}

/// Result of a successful phase transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseChange {
    pub phase: Phase,
    /// Non-fatal problem encountered on entry, e.g. too few participants to match.
    pub warning: Option<String>,
}

/// Rings found by walking the santa/giftee links.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingReport {
    /// Each ring listed in gifting order, starting from its smallest id.
    pub rings: Vec<Vec<ParticipantId>>,
    pub unmatched: Vec<ParticipantId>,
}

/// A banned id and when the ban was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanEntry {
    pub participant_id: ParticipantId,
    pub banned_at: DateTime<Utc>,
}

/// Operator overview of the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeSummary {
    pub phase: Phase,
    pub channel_ref: Option<i64>,
    pub participants: usize,
    pub without_letter: usize,
    pub with_letter: usize,
    pub without_gift: usize,
    pub not_watched: usize,
    pub without_giftee: usize,
    pub without_santa: usize,
    pub banned: usize,
}
