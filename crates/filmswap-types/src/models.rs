use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Maximum length, in characters, of a letter or a gift.
pub const MAX_CONTENT_CHARS: usize = 1900;

/// Maximum length, in characters, of a letterboxd handle.
pub const MAX_LETTERBOXD_CHARS: usize = 64;

pub const MAX_DISPLAY_NAME_CHARS: usize = 32;

/// External identity of a participant (the chat platform's user id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub i64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ParticipantId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Phase of the exchange. Operators move it around the cycle
/// `Join -> Exchange -> Watch -> Join`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    /// Roster open, letters being written.
    Join,
    /// Rings formed, gifts being prepared.
    Exchange,
    /// Gifts revealed and being watched.
    Watch,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Join, Phase::Exchange, Phase::Watch];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Join => "JOIN",
            Self::Exchange => "EXCHANGE",
            Self::Watch => "WATCH",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a valid phase (expected join, exchange or watch)")]
pub struct ParsePhaseError(pub String);

impl FromStr for Phase {
    type Err = ParsePhaseError;

    /// Case-insensitive. `SWAP` is accepted as an alias for `EXCHANGE`,
    /// which is what older databases stored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "JOIN" => Ok(Self::Join),
            "EXCHANGE" | "SWAP" => Ok(Self::Exchange),
            "WATCH" => Ok(Self::Watch),
            _ => Err(ParsePhaseError(s.to_string())),
        }
    }
}

/// The singleton exchange record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub phase: Phase,
    /// Channel the exchange runs in. Must be set before entering `Exchange`.
    pub channel_ref: Option<i64>,
    /// Message carrying the join button, so it can be re-attached on restart.
    pub join_message_ref: Option<i64>,
}

impl Default for Exchange {
    fn default() -> Self {
        Self {
            phase: Phase::Join,
            channel_ref: None,
            join_message_ref: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
    /// What this participant would like to receive. Read by their santa.
    pub letter: Option<String>,
    /// What this participant is giving to their giftee.
    pub gift: Option<String>,
    pub watched: bool,
    /// Who gifts to this participant.
    pub santa_id: Option<ParticipantId>,
    /// Who this participant gifts to.
    pub giftee_id: Option<ParticipantId>,
    pub letterboxd: Option<String>,
}

impl Participant {
    pub fn new(id: ParticipantId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            letter: None,
            gift: None,
            watched: false,
            santa_id: None,
            giftee_id: None,
            letterboxd: None,
        }
    }

    pub fn has_letter(&self) -> bool {
        self.letter.is_some()
    }

    /// A gift that is only whitespace does not count as submitted.
    pub fn has_gift(&self) -> bool {
        self.gift.as_deref().is_some_and(|g| !g.trim().is_empty())
    }

    pub fn is_matched(&self) -> bool {
        self.santa_id.is_some() && self.giftee_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_parses_case_insensitively() {
        assert_eq!("join".parse::<Phase>().unwrap(), Phase::Join);
        assert_eq!(" Exchange ".parse::<Phase>().unwrap(), Phase::Exchange);
        assert_eq!("swap".parse::<Phase>().unwrap(), Phase::Exchange);
        assert_eq!("WATCH".parse::<Phase>().unwrap(), Phase::Watch);
        assert!("done".parse::<Phase>().is_err());
    }

    #[test]
    fn phase_string_form_round_trips() {
        for phase in Phase::ALL {
            assert_eq!(phase.as_str().parse::<Phase>().unwrap(), phase);
        }
    }

    #[test]
    fn phase_serializes_uppercase() {
        let json = serde_json::to_string(&Phase::Exchange).unwrap();
        assert_eq!(json, "\"EXCHANGE\"");
    }

    #[test]
    fn whitespace_gift_is_not_submitted() {
        let mut p = Participant::new(ParticipantId(1), "a");
        assert!(!p.has_gift());
        p.gift = Some("   ".into());
        assert!(!p.has_gift());
        p.gift = Some("Paris, Texas".into());
        assert!(p.has_gift());
    }
}
