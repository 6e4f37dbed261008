use serde::{Deserialize, Serialize};

use crate::models::ParticipantId;

/// Notifications pushed to a single participant. Delivery is best-effort.
///
/// None of these carry the santa's identity; the exchange is anonymous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Notification {
    /// Sent on entering the exchange phase: the letter of the recipient's giftee.
    GifteeLetter { giftee_name: String, letter: String },

    /// Sent on entering the watch phase: the gift the recipient's santa submitted.
    GiftDelivered { recipient_name: String, gift: String },

    /// The recipient's giftee was removed and they were given a new one.
    /// Their previous gift was cleared and must be resubmitted.
    GifteeReassigned,

    /// The recipient's santa was removed. Their gift may arrive late.
    SantaReassigned,

    /// The recipient's only partner was removed. They will be matched again.
    PartnerRemoved,

    /// Anonymous message from the recipient's giftee.
    FromGiftee { text: String },

    /// Anonymous message from the recipient's santa.
    FromSanta { text: String },
}

impl Notification {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::GifteeLetter { .. } => "giftee_letter",
            Self::GiftDelivered { .. } => "gift_delivered",
            Self::GifteeReassigned => "giftee_reassigned",
            Self::SantaReassigned => "santa_reassigned",
            Self::PartnerRemoved => "partner_removed",
            Self::FromGiftee { .. } => "from_giftee",
            Self::FromSanta { .. } => "from_santa",
        }
    }
}

/// A notification together with who it is for, as streamed over the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Addressed {
    pub to: ParticipantId,
    pub notification: Notification,
}
