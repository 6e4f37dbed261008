//! Letters, gifts and the views participants get of each other's content.
//!
//! Incoming content is always resolved through the santa/giftee links at
//! read time; nothing is copied between participants.

use filmswap_types::models::MAX_CONTENT_CHARS;
use filmswap_types::views::{GiftReceipt, GiftReview, GifteeLetter, LetterView};
use filmswap_types::{Participant, Phase};

use crate::error::ValidationError;

/// Trim `text` and check it is non-empty and at most `max` characters.
pub fn validate(field: &'static str, text: &str, max: usize) -> Result<String, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    let len = trimmed.chars().count();
    if len > max {
        return Err(ValidationError::TooLong { field, len, max });
    }
    Ok(trimmed.to_string())
}

pub fn validate_letter(text: &str) -> Result<String, ValidationError> {
    validate("letter", text, MAX_CONTENT_CHARS)
}

pub fn validate_gift(text: &str) -> Result<String, ValidationError> {
    validate("gift", text, MAX_CONTENT_CHARS)
}

pub fn validate_message(text: &str) -> Result<String, ValidationError> {
    validate("message", text, MAX_CONTENT_CHARS)
}

/// A participant's own letter.
pub fn own_letter(me: &Participant) -> LetterView {
    match &me.letter {
        None => LetterView::NotSet,
        Some(text) => LetterView::Letter {
            author_name: me.display_name.clone(),
            text: text.clone(),
        },
    }
}

/// A participant's own gift, with who it is addressed to.
pub fn own_gift(me: &Participant, giftee: Option<&Participant>) -> GiftReview {
    let Some(text) = me.gift.as_ref().filter(|_| me.has_gift()) else {
        return GiftReview::NotSet;
    };
    match giftee {
        None => GiftReview::NoGiftee,
        Some(giftee) => GiftReview::Submitted {
            giftee_name: giftee.display_name.clone(),
            text: text.clone(),
        },
    }
}

/// What a santa sees when reading their giftee's letter.
pub fn giftee_letter(phase: Phase, giftee: Option<&Participant>) -> GifteeLetter {
    let Some(giftee) = giftee else {
        return GifteeLetter::NoGiftee;
    };
    let Some(text) = &giftee.letter else {
        return GifteeLetter::NotWritten;
    };
    match phase {
        Phase::Join => GifteeLetter::NotStarted,
        Phase::Exchange | Phase::Watch => GifteeLetter::Letter {
            giftee_name: giftee.display_name.clone(),
            text: text.clone(),
        },
    }
}

/// What a participant sees when opening the gift from their santa.
/// Gifts stay sealed until the watch phase.
pub fn gift_receipt(phase: Phase, me: &Participant, santa: Option<&Participant>) -> GiftReceipt {
    let Some(santa) = santa else {
        return GiftReceipt::NoSanta;
    };
    match phase {
        Phase::Join | Phase::Exchange => GiftReceipt::NotRevealed { phase },
        Phase::Watch => match &santa.gift {
            Some(text) if santa.has_gift() => GiftReceipt::Gift {
                recipient_name: me.display_name.clone(),
                text: text.clone(),
            },
            _ => GiftReceipt::NotSubmitted,
        },
    }
}
