//! Removing a participant from a live ring.
//!
//! ```text
//! A -> B -> C      remove B      A -> C
//! ```
//!
//! B's santa inherits B's giftee, and the santa's prepared gift is dropped
//! because it was chosen for B. A two-person ring cannot be spliced without
//! linking the survivor to themselves, so it is dissolved instead and the
//! survivor waits for the next match.

use filmswap_db::Connection;
use filmswap_db::queries::participants;
use filmswap_types::events::Notification;
use filmswap_types::views::RepairOutcome;
use filmswap_types::{Participant, ParticipantId};
use tracing::{error, info, warn};

use crate::error::{RingViolation, SwapError};

/// Result of removing a participant, plus who to tell about it once the
/// transaction has committed.
#[derive(Debug)]
pub struct Removal {
    pub outcome: RepairOutcome,
    pub notices: Vec<(ParticipantId, Notification)>,
}

/// Re-link the ring around `removed`, delete them, and verify nothing still
/// points at them. Must run inside the caller's transaction: a verification
/// failure is returned as [`SwapError::InvariantViolation`] and the caller's
/// rollback undoes everything.
pub fn remove_participant(conn: &Connection, removed: &Participant) -> Result<Removal, SwapError> {
    let removal = relink_around(conn, removed)?;

    if let Some(warning) = removal.outcome.warning() {
        warn!("Removing {}: {}", removed.id, warning);
    }

    info!("Deleting {} from the roster", removed.id);
    participants::delete(conn, removed.id)?;

    if let Err(violation) = ensure_absent(conn, removed.id) {
        error!(
            "Ring still references {} after removal: {}",
            removed.id, violation
        );
        return Err(violation.into());
    }

    Ok(removal)
}

fn relink_around(conn: &Connection, removed: &Participant) -> Result<Removal, SwapError> {
    let (Some(santa_id), Some(giftee_id)) = (removed.santa_id, removed.giftee_id) else {
        return Ok(Removal {
            outcome: RepairOutcome::NotMatched,
            notices: Vec::new(),
        });
    };

    let santa = load_linked(conn, removed.id, santa_id)?;
    let giftee = load_linked(conn, removed.id, giftee_id)?;

    if santa.id == giftee.id {
        info!(
            "{} was in a two-person ring with {}; dissolving it",
            removed.id, santa.id
        );
        participants::clear_links(conn, santa.id)?;
        participants::set_gift(conn, santa.id, None)?;
        return Ok(Removal {
            outcome: RepairOutcome::Dissolved {
                remaining: santa.id,
            },
            notices: vec![(santa.id, Notification::PartnerRemoved)],
        });
    }

    participants::link(conn, santa.id, giftee.id)?;
    info!(
        "{} {} is now gifting to {} {}",
        santa.id, santa.display_name, giftee.id, giftee.display_name
    );

    info!("Removing {} {}'s gift", santa.id, santa.display_name);
    participants::set_gift(conn, santa.id, None)?;

    Ok(Removal {
        outcome: RepairOutcome::Spliced {
            santa: santa.id,
            giftee: giftee.id,
        },
        notices: vec![
            (santa.id, Notification::GifteeReassigned),
            (giftee.id, Notification::SantaReassigned),
        ],
    })
}

fn load_linked(
    conn: &Connection,
    from: ParticipantId,
    target: ParticipantId,
) -> Result<Participant, SwapError> {
    participants::get(conn, target)?
        .ok_or_else(|| RingViolation::DanglingLink { id: from, target }.into())
}

/// `id` must be neither a participant nor the santa or giftee of anyone.
pub fn ensure_absent(conn: &Connection, id: ParticipantId) -> Result<(), SwapError> {
    if participants::get(conn, id)?.is_some() {
        return Err(RingViolation::StillPresent { id }.into());
    }
    let count = participants::count_references_to(conn, id)?;
    if count > 0 {
        return Err(RingViolation::StillReferenced { id, count }.into());
    }
    Ok(())
}
