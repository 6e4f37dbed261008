//! Matching engine.
//!
//! Participants are arranged in rings: a shuffled order in which everyone
//! gifts to the next person and receives from the previous one. The two link
//! columns are only ever written through [`participants::link`], which sets
//! both sides at once, so `A.giftee == B` always implies `B.santa == A`.

use std::collections::{BTreeMap, BTreeSet};

use filmswap_db::Connection;
use filmswap_db::queries::participants;
use filmswap_types::views::RingReport;
use filmswap_types::{Participant, ParticipantId};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::info;

use crate::error::{InsufficientParticipants, RingViolation, SwapError};

/// A directed santa -> giftee edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub santa: ParticipantId,
    pub giftee: ParticipantId,
}

/// Links for a ring in the given order: each entry gifts to its successor,
/// and the last wraps around to the first.
pub fn links_in_order(order: &[ParticipantId]) -> Vec<Link> {
    let n = order.len();
    (0..n)
        .map(|i| Link {
            santa: order[i],
            giftee: order[(i + 1) % n],
        })
        .collect()
}

/// Shuffle `ids` into a uniformly random ring order.
pub fn plan<R: Rng + ?Sized>(
    mut ids: Vec<ParticipantId>,
    rng: &mut R,
) -> Result<Vec<ParticipantId>, InsufficientParticipants> {
    if ids.len() < 2 {
        return Err(InsufficientParticipants { eligible: ids.len() });
    }
    ids.shuffle(rng);
    Ok(ids)
}

/// Form a new ring out of everyone who has a letter but no santa yet.
///
/// Participants already in a ring are left alone, so calling this again
/// later folds latecomers into a separate ring of their own. Writes nothing
/// if fewer than two participants are eligible.
pub fn match_unmatched<R: Rng + ?Sized>(
    conn: &Connection,
    rng: &mut R,
) -> Result<Vec<ParticipantId>, SwapError> {
    let eligible: Vec<ParticipantId> = participants::list_unmatched_with_letter(conn)?
        .into_iter()
        .map(|p| p.id)
        .collect();
    info!("Found {} participants with letters and no santa", eligible.len());

    let order = plan(eligible, rng)?;
    info!("Shuffled ring order: {:?}", order);

    for link in links_in_order(&order) {
        participants::link(conn, link.santa, link.giftee)?;
    }

    info!("Matched a ring of {}", order.len());
    Ok(order)
}

/// Clear every santa/giftee link.
pub fn unmatch_all(conn: &Connection) -> Result<usize, SwapError> {
    let cleared = participants::clear_all_links(conn)?;
    info!("Unmatched {} participants", cleared);
    Ok(cleared)
}

/// Check the ring structure over the whole roster and list the rings.
///
/// Every link must point at an existing participant, be mirrored on the
/// other side, and never point at its owner; a participant has either both
/// links or neither. Under those rules the links form disjoint cycles of
/// length two or more.
pub fn walk(roster: &[Participant]) -> Result<RingReport, RingViolation> {
    let by_id: BTreeMap<ParticipantId, &Participant> = roster.iter().map(|p| (p.id, p)).collect();

    let mut report = RingReport::default();

    for p in roster {
        if p.santa_id == Some(p.id) || p.giftee_id == Some(p.id) {
            return Err(RingViolation::SelfLink { id: p.id });
        }

        match (p.santa_id, p.giftee_id) {
            (None, None) => {
                report.unmatched.push(p.id);
                continue;
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(RingViolation::HalfLinked { id: p.id });
            }
            (Some(santa), Some(giftee)) => {
                let giftee_row = by_id.get(&giftee).ok_or(RingViolation::DanglingLink {
                    id: p.id,
                    target: giftee,
                })?;
                if giftee_row.santa_id != Some(p.id) {
                    return Err(RingViolation::Asymmetric {
                        santa: p.id,
                        giftee,
                    });
                }

                let santa_row = by_id.get(&santa).ok_or(RingViolation::DanglingLink {
                    id: p.id,
                    target: santa,
                })?;
                if santa_row.giftee_id != Some(p.id) {
                    return Err(RingViolation::Asymmetric {
                        santa,
                        giftee: p.id,
                    });
                }
            }
        }
    }

    // Links are a permutation of the matched set now; follow giftees to
    // peel off each cycle, starting from its smallest id.
    let mut seen = BTreeSet::new();
    for (&start, p) in &by_id {
        if p.giftee_id.is_none() || seen.contains(&start) {
            continue;
        }
        let mut ring = Vec::new();
        let mut current = start;
        loop {
            seen.insert(current);
            ring.push(current);
            // Checked above: every matched participant has an existing giftee.
            let Some(next) = by_id.get(&current).and_then(|p| p.giftee_id) else {
                return Err(RingViolation::HalfLinked { id: current });
            };
            if next == start {
                break;
            }
            current = next;
        }
        report.rings.push(ring);
    }

    Ok(report)
}
