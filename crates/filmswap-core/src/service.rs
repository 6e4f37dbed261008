use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::anyhow;
use filmswap_db::queries::{banned, exchange, participants};
use filmswap_db::{Connection, Database};
use filmswap_types::events::Notification;
use filmswap_types::models::{MAX_DISPLAY_NAME_CHARS, MAX_LETTERBOXD_CHARS};
use filmswap_types::views::{
    BanEntry, ExchangeSummary, GiftReceipt, GiftReview, GifteeLetter, LetterView, PhaseChange, RepairOutcome,
    RingReport,
};
use filmswap_types::{Exchange, Participant, ParticipantId, Phase};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, error, info, warn};

use crate::config::SwapConfig;
use crate::content;
use crate::error::{ConfigurationError, StateError, SwapError};
use crate::phase::{self, Action};
use crate::ports::{NameResolver, Notifier, SnapshotSink};
use crate::repair;
use crate::ring;

type Outbox = Vec<(ParticipantId, Notification)>;

/// Outcome of a ban. `repair` is `None` when the banned id was not a
/// participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanReport {
    pub participant_id: ParticipantId,
    pub repair: Option<RepairOutcome>,
}

impl BanReport {
    pub fn warning(&self) -> Option<String> {
        self.repair.as_ref().and_then(RepairOutcome::warning)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub renamed: usize,
    /// Participants the platform no longer knows. Their letters were cleared.
    pub dropped: Vec<ParticipantId>,
    /// Lookups that failed and were skipped.
    pub failed: usize,
}

enum JoinOutcome {
    Joined,
    AlreadyJoined { renamed: bool },
}

/// The exchange. Every mutating operation runs in one transaction on the
/// roster store; notifications are queued while it runs and sent after it
/// commits.
///
/// Lock order is the matching RNG first, then the database.
pub struct SwapService {
    db: Database,
    notifier: Arc<dyn Notifier>,
    snapshots: Arc<dyn SnapshotSink>,
    config: SwapConfig,
    rng: Mutex<StdRng>,
}

impl SwapService {
    pub fn new(
        db: Database,
        notifier: Arc<dyn Notifier>,
        snapshots: Arc<dyn SnapshotSink>,
        config: SwapConfig,
    ) -> Self {
        let rng = match config.match_seed {
            Some(seed) => {
                info!("Matching with fixed seed {}", seed);
                StdRng::seed_from_u64(seed)
            }
            None => StdRng::from_os_rng(),
        };
        Self {
            db,
            notifier,
            snapshots,
            config,
            rng: Mutex::new(rng),
        }
    }

    // ── Exchange ──

    pub fn create_exchange(&self) -> Result<Exchange, SwapError> {
        let ex = self.db.with_tx(|tx| {
            if !exchange::create(tx)? {
                return Err(StateError::AlreadyExists.into());
            }
            require_exchange(tx)
        })?;
        info!("Created exchange in the {} phase", ex.phase);
        Ok(ex)
    }

    pub fn exchange(&self) -> Result<Exchange, SwapError> {
        self.db.with_conn(require_exchange)
    }

    pub fn get_phase(&self) -> Result<Phase, SwapError> {
        Ok(self.exchange()?.phase)
    }

    pub fn set_channel(&self, channel_ref: i64) -> Result<(), SwapError> {
        self.db.with_tx(|tx| {
            require_exchange(tx)?;
            exchange::set_channel(tx, channel_ref)?;
            Ok::<_, SwapError>(())
        })?;
        info!("Exchange channel set to {}", channel_ref);
        Ok(())
    }

    pub fn set_join_message(&self, message_ref: i64) -> Result<(), SwapError> {
        self.db.with_tx(|tx| {
            require_exchange(tx)?;
            exchange::set_join_message(tx, message_ref)?;
            Ok::<_, SwapError>(())
        })?;
        info!("Join message set to {}", message_ref);
        Ok(())
    }

    pub fn join_message(&self) -> Result<Option<i64>, SwapError> {
        Ok(self.exchange()?.join_message_ref)
    }

    /// Move the exchange to `target` and apply its entry effects.
    ///
    /// Entering `JOIN` snapshots the roster first and aborts if the snapshot
    /// fails. Entering `EXCHANGE` matches everyone eligible; too few
    /// participants is reported as a warning and the phase still changes.
    pub fn set_phase(&self, target: Phase) -> Result<PhaseChange, SwapError> {
        let current = self.get_phase()?;
        info!("Setting phase from {} to {}", current, target);

        if target == Phase::Join {
            info!("Taking a snapshot before resetting for a new cycle");
            self.snapshots.snapshot(&self.db)?;
        }

        let mut rng = self.lock_rng()?;
        let (change, outbox) = self.db.with_tx(|tx| {
            let ex = require_exchange(tx)?;
            let mut warning = None;

            match target {
                Phase::Join => {
                    let reset = participants::reset_for_new_cycle(tx)?;
                    info!("Cleared links, gifts and watched flags of {} participants", reset);
                }
                Phase::Exchange => {
                    if ex.channel_ref.is_none() {
                        return Err(ConfigurationError::MissingChannel.into());
                    }
                    match ring::match_unmatched(tx, &mut *rng) {
                        Ok(order) => info!("Matched {} participants", order.len()),
                        Err(SwapError::InsufficientParticipants(e))
                            if e.eligible == 0 && participants::count_matched(tx)? > 0 =>
                        {
                            info!("Everyone with a letter is already matched");
                            warning = Some(
                                "no new participants to match, everyone with a letter is already in a ring"
                                    .to_string(),
                            );
                        }
                        Err(SwapError::InsufficientParticipants(e)) => {
                            warn!("Could not match participants: {}", e);
                            warning = Some(format!("couldn't match participants: {e}"));
                        }
                        Err(e) => return Err(e),
                    }
                    let reset = participants::reset_watched(tx)?;
                    debug!("Reset watched flag of {} participants", reset);
                }
                Phase::Watch => {}
            }

            exchange::set_phase(tx, target)?;
            let outbox = entry_notices(tx, target)?;
            Ok((
                PhaseChange {
                    phase: target,
                    warning,
                },
                outbox,
            ))
        })?;
        drop(rng);

        info!("Done setting phase to {}", target);
        self.deliver(outbox);
        Ok(change)
    }

    // ── Matching ──

    /// Match everyone with a letter and no santa into a new ring. Outside
    /// `JOIN` the new ring is sent its giftees' letters straight away.
    pub fn match_now(&self) -> Result<Vec<ParticipantId>, SwapError> {
        let mut rng = self.lock_rng()?;
        let (order, outbox) = self.db.with_tx(|tx| {
            let ex = require_exchange(tx)?;
            let order = ring::match_unmatched(tx, &mut *rng)?;
            let outbox: Outbox = if ex.phase == Phase::Join {
                Vec::new()
            } else {
                entry_notices(tx, Phase::Exchange)?
                    .into_iter()
                    .filter(|(to, _)| order.contains(to))
                    .collect()
            };
            Ok::<_, SwapError>((order, outbox))
        })?;
        drop(rng);

        self.deliver(outbox);
        Ok(order)
    }

    pub fn unmatch_all(&self, force: bool) -> Result<usize, SwapError> {
        self.db.with_tx(|tx| {
            let ex = require_exchange(tx)?;
            phase::check(ex.phase, Action::UnmatchAll { force })?;
            if force && ex.phase != Phase::Join {
                warn!("Force-unmatching everyone during the {} phase", ex.phase);
            }
            ring::unmatch_all(tx)
        })
    }

    // ── Roster ──

    pub fn join(&self, id: ParticipantId, display_name: &str) -> Result<(), SwapError> {
        let name = content::validate("display name", display_name, MAX_DISPLAY_NAME_CHARS)?;

        let outcome = self.db.with_tx(|tx| -> Result<JoinOutcome, SwapError> {
            let ex = require_exchange(tx)?;
            if banned::is_banned(tx, id)? {
                info!("{} ({}) is banned, refusing to let them join", id, name);
                return Err(StateError::Banned.into());
            }
            phase::check(ex.phase, Action::Join)?;

            match participants::get(tx, id)? {
                Some(existing) => {
                    let renamed = existing.display_name != name;
                    if renamed {
                        info!("Updating {} {} to {}", id, existing.display_name, name);
                        participants::set_display_name(tx, id, &name)?;
                    }
                    Ok(JoinOutcome::AlreadyJoined { renamed })
                }
                None => {
                    participants::insert(tx, id, &name)?;
                    Ok(JoinOutcome::Joined)
                }
            }
        })?;

        match outcome {
            JoinOutcome::Joined => {
                info!("{} joined as {}", id, name);
                Ok(())
            }
            JoinOutcome::AlreadyJoined { renamed } => {
                Err(StateError::AlreadyJoined { renamed }.into())
            }
        }
    }

    pub fn leave(&self, id: ParticipantId) -> Result<(), SwapError> {
        let outbox = self.db.with_tx(|tx| {
            let ex = require_exchange(tx)?;
            phase::check(ex.phase, Action::Leave)?;
            let me = require_member(tx, id)?;
            let removal = repair::remove_participant(tx, &me)?;
            Ok::<_, SwapError>(removal.notices)
        })?;
        info!("{} left the exchange", id);
        self.deliver(outbox);
        Ok(())
    }

    /// `Banned` if the id is banned, `NotJoined` if it is not a participant.
    pub fn check_active(&self, id: ParticipantId) -> Result<(), SwapError> {
        self.db.with_conn(|conn| require_active(conn, id).map(|_| ()))
    }

    /// Ban `id`, removing them from the roster (and their ring) if they were
    /// a participant.
    pub fn ban(&self, id: ParticipantId) -> Result<BanReport, SwapError> {
        let (report, outbox) = self.db.with_tx(|tx| -> Result<(BanReport, Outbox), SwapError> {
            check_ban_policy(tx, Action::Ban {
                policy: self.config.ban_policy,
            })?;
            if !banned::insert(tx, id)? {
                return Err(StateError::AlreadyBanned.into());
            }

            let Some(member) = participants::get(tx, id)? else {
                debug!("{} was not a participant", id);
                return Ok((
                    BanReport {
                        participant_id: id,
                        repair: None,
                    },
                    Vec::new(),
                ));
            };
            let removal = repair::remove_participant(tx, &member)?;
            Ok((
                BanReport {
                    participant_id: id,
                    repair: Some(removal.outcome),
                },
                removal.notices,
            ))
        })?;

        info!("Banned {}", id);
        self.deliver(outbox);
        Ok(report)
    }

    pub fn unban(&self, id: ParticipantId) -> Result<(), SwapError> {
        self.db.with_tx(|tx| {
            check_ban_policy(tx, Action::Unban {
                policy: self.config.ban_policy,
            })?;
            if !banned::delete(tx, id)? {
                return Err(StateError::NotBanned.into());
            }
            Ok::<_, SwapError>(())
        })?;
        info!("Unbanned {}", id);
        Ok(())
    }

    // ── Content ──

    pub fn set_letter(&self, id: ParticipantId, text: &str) -> Result<(), SwapError> {
        let letter = content::validate_letter(text)?;
        self.db.with_tx(|tx| {
            let ex = require_exchange(tx)?;
            let me = require_active(tx, id)?;
            phase::check(
                ex.phase,
                Action::SetLetter {
                    has_letter: me.has_letter(),
                },
            )?;
            participants::set_letter(tx, id, Some(&letter))?;
            Ok::<_, SwapError>(())
        })?;
        info!("{} set their letter ({} characters)", id, letter.chars().count());
        Ok(())
    }

    pub fn set_letterboxd(&self, id: ParticipantId, username: &str) -> Result<(), SwapError> {
        let handle = content::validate("letterboxd username", username, MAX_LETTERBOXD_CHARS)?;
        self.db.with_tx(|tx| {
            require_active(tx, id)?;
            participants::set_letterboxd(tx, id, Some(&handle))?;
            Ok::<_, SwapError>(())
        })?;
        info!("{} set their letterboxd to {}", id, handle);
        Ok(())
    }

    pub fn set_gift(&self, id: ParticipantId, text: &str) -> Result<(), SwapError> {
        let gift = content::validate_gift(text)?;
        self.db.with_tx(|tx| {
            let ex = require_exchange(tx)?;
            let me = require_active(tx, id)?;
            phase::check(
                ex.phase,
                Action::SetGift {
                    has_gift: me.has_gift(),
                },
            )?;
            if me.giftee_id.is_none() {
                return Err(StateError::NoGiftee.into());
            }
            participants::set_gift(tx, id, Some(&gift))?;
            Ok::<_, SwapError>(())
        })?;
        info!("{} set their gift ({} characters)", id, gift.chars().count());
        Ok(())
    }

    pub fn mark_watched(&self, id: ParticipantId) -> Result<(), SwapError> {
        self.db.with_tx(|tx| {
            let ex = require_exchange(tx)?;
            let me = require_active(tx, id)?;
            phase::check(ex.phase, Action::MarkWatched)?;
            if me.watched {
                return Err(StateError::AlreadyWatched.into());
            }
            participants::set_watched(tx, id, true)?;
            Ok::<_, SwapError>(())
        })?;
        info!("{} marked their gift as watched", id);
        Ok(())
    }

    /// Operator variant of [`SwapService::mark_watched`].
    pub fn mark_watched_for(&self, id: ParticipantId) -> Result<(), SwapError> {
        info!("Operator marking the gift of {} as watched", id);
        self.mark_watched(id)
    }

    // ── Views ──

    pub fn review_letter(&self, id: ParticipantId) -> Result<LetterView, SwapError> {
        self.db.with_conn(|conn| {
            let me = require_active(conn, id)?;
            Ok(content::own_letter(&me))
        })
    }

    pub fn review_gift(&self, id: ParticipantId) -> Result<GiftReview, SwapError> {
        self.db.with_conn(|conn| {
            let me = require_active(conn, id)?;
            let giftee = linked(conn, me.giftee_id)?;
            Ok(content::own_gift(&me, giftee.as_ref()))
        })
    }

    pub fn read_giftee_letter(&self, id: ParticipantId) -> Result<GifteeLetter, SwapError> {
        self.db.with_conn(|conn| {
            let ex = require_exchange(conn)?;
            let me = require_active(conn, id)?;
            let giftee = linked(conn, me.giftee_id)?;
            Ok(content::giftee_letter(ex.phase, giftee.as_ref()))
        })
    }

    pub fn receive_gift(&self, id: ParticipantId) -> Result<GiftReceipt, SwapError> {
        self.db.with_conn(|conn| {
            let ex = require_exchange(conn)?;
            let me = require_active(conn, id)?;
            let santa = linked(conn, me.santa_id)?;
            Ok(content::gift_receipt(ex.phase, &me, santa.as_ref()))
        })
    }

    // ── Anonymous messages ──

    /// Relay `text` to the sender's santa without revealing who sent it.
    pub fn message_santa(&self, id: ParticipantId, text: &str) -> Result<(), SwapError> {
        let text = content::validate_message(text)?;
        let santa = self.db.with_conn(|conn| {
            let me = require_active(conn, id)?;
            linked(conn, me.santa_id)?.ok_or(SwapError::State(StateError::NoSanta))
        })?;
        self.notifier
            .notify(santa.id, &Notification::FromGiftee { text })
            .map_err(SwapError::Delivery)?;
        info!("{} sent an anonymous message to their santa", id);
        Ok(())
    }

    /// Relay `text` to the sender's giftee without revealing who sent it.
    pub fn message_giftee(&self, id: ParticipantId, text: &str) -> Result<(), SwapError> {
        let text = content::validate_message(text)?;
        let giftee = self.db.with_conn(|conn| {
            let me = require_active(conn, id)?;
            linked(conn, me.giftee_id)?.ok_or(SwapError::State(StateError::NoGiftee))
        })?;
        self.notifier
            .notify(giftee.id, &Notification::FromSanta { text })
            .map_err(SwapError::Delivery)?;
        info!("{} sent an anonymous message to their giftee", id);
        Ok(())
    }

    // ── Queries ──

    pub fn get_santa(&self, id: ParticipantId) -> Result<Option<Participant>, SwapError> {
        self.db.with_conn(|conn| {
            let me = require_member(conn, id)?;
            linked(conn, me.santa_id)
        })
    }

    pub fn get_giftee(&self, id: ParticipantId) -> Result<Option<Participant>, SwapError> {
        self.db.with_conn(|conn| {
            let me = require_member(conn, id)?;
            linked(conn, me.giftee_id)
        })
    }

    pub fn list_participants(&self) -> Result<Vec<Participant>, SwapError> {
        Ok(self.db.with_conn(participants::list_all)?)
    }

    pub fn list_without_letter(&self) -> Result<Vec<Participant>, SwapError> {
        Ok(self.db.with_conn(participants::list_without_letter)?)
    }

    pub fn list_without_gift(&self) -> Result<Vec<Participant>, SwapError> {
        Ok(self.db.with_conn(participants::list_without_gift)?)
    }

    pub fn list_without_giftee(&self) -> Result<Vec<Participant>, SwapError> {
        Ok(self.db.with_conn(participants::list_without_giftee)?)
    }

    pub fn list_without_santa(&self) -> Result<Vec<Participant>, SwapError> {
        Ok(self.db.with_conn(participants::list_without_santa)?)
    }

    pub fn list_not_watched(&self) -> Result<Vec<Participant>, SwapError> {
        Ok(self.db.with_conn(participants::list_not_watched)?)
    }

    pub fn list_banned(&self) -> Result<Vec<BanEntry>, SwapError> {
        let rows = self.db.with_conn(banned::list)?;
        let entries = rows
            .into_iter()
            .map(|row| {
                Ok(BanEntry {
                    participant_id: ParticipantId(row.participant_id),
                    banned_at: row.banned_at_utc()?,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(entries)
    }

    pub fn summary(&self) -> Result<ExchangeSummary, SwapError> {
        self.db.with_conn(|conn| {
            let ex = require_exchange(conn)?;
            let all = participants::list_all(conn)?;
            Ok(ExchangeSummary {
                phase: ex.phase,
                channel_ref: ex.channel_ref,
                participants: all.len(),
                without_letter: participants::list_without_letter(conn)?.len(),
                with_letter: all.iter().filter(|p| p.has_letter()).count(),
                without_gift: participants::list_without_gift(conn)?.len(),
                not_watched: participants::list_not_watched(conn)?.len(),
                without_giftee: participants::list_without_giftee(conn)?.len(),
                without_santa: participants::list_without_santa(conn)?.len(),
                banned: banned::list(conn)?.len(),
            })
        })
    }

    // ── Maintenance ──

    pub fn snapshot(&self) -> Result<(), SwapError> {
        self.snapshots.snapshot(&self.db)?;
        info!("Snapshot taken");
        Ok(())
    }

    pub fn verify_rings(&self) -> Result<RingReport, SwapError> {
        let roster = self.list_participants()?;
        let report = ring::walk(&roster).inspect_err(|violation| {
            error!("Ring check failed: {}", violation);
        })?;
        debug!(
            "Ring check passed: {} rings, {} unmatched",
            report.rings.len(),
            report.unmatched.len()
        );
        Ok(report)
    }

    /// Ask `resolver` for every participant's current display name. Names
    /// that changed are updated. Participants the platform no longer knows
    /// have their letter cleared so the next match skips them.
    pub fn refresh_display_names(
        &self,
        resolver: &dyn NameResolver,
    ) -> Result<RefreshReport, SwapError> {
        let roster = self.list_participants()?;

        let mut failed = 0;
        let mut lookups = Vec::with_capacity(roster.len());
        for p in roster {
            match resolver.display_name(p.id) {
                Ok(found) => lookups.push((p.id, found)),
                Err(e) => {
                    warn!("Could not look up {} {}: {:#}", p.id, p.display_name, e);
                    failed += 1;
                }
            }
        }

        let report = self.db.with_tx(|tx| {
            let mut report = RefreshReport {
                failed,
                ..Default::default()
            };
            for (id, found) in &lookups {
                // Left or was banned since the lookup.
                let Some(current) = participants::get(tx, *id)? else {
                    continue;
                };
                match found {
                    None => {
                        info!(
                            "Could not find {} {}, removing their letter",
                            id, current.display_name
                        );
                        participants::set_letter(tx, *id, None)?;
                        report.dropped.push(*id);
                    }
                    Some(name) => {
                        let name: String = name.trim().chars().take(MAX_DISPLAY_NAME_CHARS).collect();
                        if !name.is_empty() && name != current.display_name {
                            info!("Updating {} {} to {}", id, current.display_name, name);
                            participants::set_display_name(tx, *id, &name)?;
                            report.renamed += 1;
                        }
                    }
                }
            }
            Ok::<_, SwapError>(report)
        })?;

        info!(
            "Refreshed display names: {} renamed, {} dropped, {} failed",
            report.renamed,
            report.dropped.len(),
            report.failed
        );
        Ok(report)
    }

    fn deliver(&self, outbox: Outbox) {
        for (to, notification) in outbox {
            match self.notifier.notify(to, &notification) {
                Ok(()) => debug!("Sent {} to {}", notification.kind(), to),
                Err(e) => warn!("Error sending {} to {}: {:#}", notification.kind(), to, e),
            }
        }
    }

    fn lock_rng(&self) -> Result<MutexGuard<'_, StdRng>, SwapError> {
        self.rng
            .lock()
            .map_err(|e| SwapError::Storage(anyhow!("RNG lock poisoned: {}", e)))
    }
}

fn require_exchange(conn: &Connection) -> Result<Exchange, SwapError> {
    exchange::get(conn)?.ok_or(SwapError::Configuration(ConfigurationError::NotConfigured))
}

fn require_member(conn: &Connection, id: ParticipantId) -> Result<Participant, SwapError> {
    participants::get(conn, id)?.ok_or(SwapError::NotJoined)
}

fn require_active(conn: &Connection, id: ParticipantId) -> Result<Participant, SwapError> {
    if banned::is_banned(conn, id)? {
        return Err(StateError::Banned.into());
    }
    require_member(conn, id)
}

fn linked(conn: &Connection, id: Option<ParticipantId>) -> Result<Option<Participant>, SwapError> {
    match id {
        Some(id) => Ok(participants::get(conn, id)?),
        None => Ok(None),
    }
}

/// Bans are unrestricted under the permissive policy. With no exchange yet
/// nothing is running, so the join phase rules apply.
fn check_ban_policy(conn: &Connection, action: Action) -> Result<(), SwapError> {
    let phase = exchange::get(conn)?.map_or(Phase::Join, |ex| ex.phase);
    phase::check(phase, action)?;
    Ok(())
}

/// Notifications sent on entering `phase`.
fn entry_notices(conn: &Connection, phase: Phase) -> Result<Outbox, SwapError> {
    let roster = participants::list_all(conn)?;
    let by_id: HashMap<ParticipantId, &Participant> = roster.iter().map(|p| (p.id, p)).collect();

    let outbox = match phase {
        Phase::Join => Vec::new(),
        Phase::Exchange => roster
            .iter()
            .filter_map(|p| {
                let giftee = by_id.get(&p.giftee_id?)?;
                let letter = giftee.letter.clone()?;
                Some((
                    p.id,
                    Notification::GifteeLetter {
                        giftee_name: giftee.display_name.clone(),
                        letter,
                    },
                ))
            })
            .collect(),
        Phase::Watch => roster
            .iter()
            .filter_map(|p| {
                let santa = by_id.get(&p.santa_id?)?;
                if !santa.has_gift() {
                    debug!("{}'s santa has not submitted a gift", p.id);
                    return None;
                }
                Some((
                    p.id,
                    Notification::GiftDelivered {
                        recipient_name: p.display_name.clone(),
                        gift: santa.gift.clone()?,
                    },
                ))
            })
            .collect(),
    };
    Ok(outbox)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BanPolicy;
    use crate::error::{ErrorKind, ValidationError};
    use crate::testing::{CountingSnapshots, MapResolver, RecordingNotifier};
    use filmswap_types::models::MAX_CONTENT_CHARS;

    const A: ParticipantId = ParticipantId(1);
    const B: ParticipantId = ParticipantId(2);
    const C: ParticipantId = ParticipantId(3);
    const D: ParticipantId = ParticipantId(4);

    struct Fixture {
        svc: SwapService,
        notifier: Arc<RecordingNotifier>,
        snapshots: Arc<CountingSnapshots>,
    }

    fn fixture_with(config: SwapConfig, snapshots: CountingSnapshots) -> Fixture {
        let notifier = Arc::new(RecordingNotifier::default());
        let snapshots = Arc::new(snapshots);
        let svc = SwapService::new(
            Database::open_in_memory().unwrap(),
            notifier.clone(),
            snapshots.clone(),
            config,
        );
        Fixture {
            svc,
            notifier,
            snapshots,
        }
    }

    /// An exchange with a channel set, still in the join phase.
    fn fixture() -> Fixture {
        let f = fixture_with(
            SwapConfig {
                match_seed: Some(7),
                ..Default::default()
            },
            CountingSnapshots::default(),
        );
        f.svc.create_exchange().unwrap();
        f.svc.set_channel(42).unwrap();
        f
    }

    fn join_with_letter(svc: &SwapService, id: ParticipantId, name: &str) {
        svc.join(id, name).unwrap();
        svc.set_letter(id, &format!("{name} likes slow cinema")).unwrap();
    }

    /// A, B, C and D matched into one ring, in the exchange phase.
    fn exchanging() -> Fixture {
        let f = fixture();
        for (id, name) in [(A, "ana"), (B, "ben"), (C, "cai"), (D, "dee")] {
            join_with_letter(&f.svc, id, name);
        }
        let change = f.svc.set_phase(Phase::Exchange).unwrap();
        assert!(change.warning.is_none());
        f
    }

    fn giftee_of(svc: &SwapService, id: ParticipantId) -> ParticipantId {
        svc.get_giftee(id).unwrap().unwrap().id
    }

    fn santa_of(svc: &SwapService, id: ParticipantId) -> ParticipantId {
        svc.get_santa(id).unwrap().unwrap().id
    }

    #[test_log::test]
    fn exchange_can_only_be_created_once() {
        let f = fixture();
        let err = f.svc.create_exchange().unwrap_err();
        assert!(matches!(err, SwapError::State(StateError::AlreadyExists)));
    }

    #[test_log::test]
    fn operations_before_create_are_not_configured() {
        let f = fixture_with(SwapConfig::default(), CountingSnapshots::default());
        let err = f.svc.get_phase().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        let err = f.svc.join(A, "ana").unwrap_err();
        assert!(matches!(
            err,
            SwapError::Configuration(ConfigurationError::NotConfigured)
        ));
    }

    #[test_log::test]
    fn rejoining_updates_display_name() {
        let f = fixture();
        f.svc.join(A, "ana").unwrap();

        let err = f.svc.join(A, "ana").unwrap_err();
        assert!(matches!(
            err,
            SwapError::State(StateError::AlreadyJoined { renamed: false })
        ));

        let err = f.svc.join(A, "ana b").unwrap_err();
        assert!(matches!(
            err,
            SwapError::State(StateError::AlreadyJoined { renamed: true })
        ));
        assert_eq!(f.svc.list_participants().unwrap()[0].display_name, "ana b");
    }

    #[test_log::test]
    fn display_name_is_validated() {
        let f = fixture();
        assert!(matches!(
            f.svc.join(A, "   ").unwrap_err(),
            SwapError::Validation(ValidationError::Empty { .. })
        ));
        assert!(matches!(
            f.svc.join(A, &"x".repeat(33)).unwrap_err(),
            SwapError::Validation(ValidationError::TooLong { .. })
        ));
    }

    #[test_log::test]
    fn banned_participant_cannot_join() {
        let f = fixture();
        f.svc.ban(A).unwrap();
        let err = f.svc.join(A, "ana").unwrap_err();
        assert!(matches!(err, SwapError::State(StateError::Banned)));
        assert_eq!(err.kind(), ErrorKind::State);
        assert!(err.hint().is_some());
    }

    #[test_log::test]
    fn joining_is_closed_only_while_watching() {
        let f = exchanging();
        f.svc.join(ParticipantId(5), "eve").unwrap();

        f.svc.set_phase(Phase::Watch).unwrap();
        let err = f.svc.join(ParticipantId(6), "fay").unwrap_err();
        assert!(matches!(
            err,
            SwapError::State(StateError::WrongPhase {
                phase: Phase::Watch,
                ..
            })
        ));
    }

    #[test_log::test]
    fn leaving_is_only_allowed_while_joining() {
        let f = fixture();
        assert!(matches!(f.svc.leave(A).unwrap_err(), SwapError::NotJoined));

        f.svc.join(A, "ana").unwrap();
        f.svc.leave(A).unwrap();
        assert!(f.svc.list_participants().unwrap().is_empty());

        let f = exchanging();
        let err = f.svc.leave(A).unwrap_err();
        assert!(matches!(err, SwapError::State(StateError::WrongPhase { .. })));
        assert_eq!(f.svc.list_participants().unwrap().len(), 4);
    }

    #[test_log::test]
    fn exchange_needs_a_channel() {
        let f = fixture_with(SwapConfig::default(), CountingSnapshots::default());
        f.svc.create_exchange().unwrap();
        let err = f.svc.set_phase(Phase::Exchange).unwrap_err();
        assert!(matches!(
            err,
            SwapError::Configuration(ConfigurationError::MissingChannel)
        ));
        assert_eq!(f.svc.get_phase().unwrap(), Phase::Join);
    }

    #[test_log::test]
    fn too_few_letters_warns_but_still_transitions() {
        let f = fixture();
        join_with_letter(&f.svc, A, "ana");
        f.svc.join(B, "ben").unwrap();

        let change = f.svc.set_phase(Phase::Exchange).unwrap();
        assert_eq!(change.phase, Phase::Exchange);
        assert!(change.warning.unwrap().contains("currently have 1"));
        assert_eq!(f.svc.get_phase().unwrap(), Phase::Exchange);
        assert!(f.svc.get_giftee(A).unwrap().is_none());
    }

    #[test_log::test]
    fn entering_exchange_after_an_early_match_says_everyone_is_matched() {
        let f = fixture();
        for (id, name) in [(A, "ana"), (B, "ben"), (C, "cai")] {
            join_with_letter(&f.svc, id, name);
        }
        assert_eq!(f.svc.match_now().unwrap().len(), 3);

        let change = f.svc.set_phase(Phase::Exchange).unwrap();
        assert_eq!(change.phase, Phase::Exchange);
        let warning = change.warning.unwrap();
        assert!(warning.contains("already in a ring"));
        assert!(!warning.contains("currently have"));
        assert_eq!(f.svc.verify_rings().unwrap().rings[0].len(), 3);
    }

    #[test_log::test]
    fn lone_latecomer_after_an_early_match_still_warns() {
        let f = fixture();
        for (id, name) in [(A, "ana"), (B, "ben"), (C, "cai")] {
            join_with_letter(&f.svc, id, name);
        }
        f.svc.match_now().unwrap();
        join_with_letter(&f.svc, D, "dee");

        let change = f.svc.set_phase(Phase::Exchange).unwrap();
        assert!(change.warning.unwrap().contains("currently have 1"));
        assert!(f.svc.get_giftee(D).unwrap().is_none());
    }

    #[test_log::test]
    fn entering_exchange_forms_a_ring_and_sends_letters() {
        let f = exchanging();

        let report = f.svc.verify_rings().unwrap();
        assert_eq!(report.rings.len(), 1);
        assert_eq!(report.rings[0].len(), 4);
        assert!(report.unmatched.is_empty());

        for id in [A, B, C, D] {
            let giftee = f.svc.get_giftee(id).unwrap().unwrap();
            let sent = f.notifier.sent_to(id);
            assert_eq!(
                sent,
                vec![Notification::GifteeLetter {
                    giftee_name: giftee.display_name.clone(),
                    letter: giftee.letter.clone().unwrap(),
                }]
            );
        }
    }

    #[test_log::test]
    fn unreachable_participant_does_not_fail_the_transition() {
        let f = fixture();
        for (id, name) in [(A, "ana"), (B, "ben"), (C, "cai")] {
            join_with_letter(&f.svc, id, name);
        }
        f.notifier.make_unreachable(B);

        f.svc.set_phase(Phase::Exchange).unwrap();
        assert_eq!(f.svc.get_phase().unwrap(), Phase::Exchange);
        assert!(f.notifier.sent_to(B).is_empty());
        assert_eq!(f.notifier.sent().len(), 2);
    }

    #[test_log::test]
    fn entering_watch_delivers_submitted_gifts() {
        let f = exchanging();
        let a_giftee = giftee_of(&f.svc, A);
        f.svc.set_gift(A, "Stalker (1979)").unwrap();
        f.notifier.clear();

        f.svc.set_phase(Phase::Watch).unwrap();

        let sent = f.notifier.sent();
        assert_eq!(sent.len(), 1);
        let (to, notification) = &sent[0];
        assert_eq!(*to, a_giftee);
        assert!(matches!(
            notification,
            Notification::GiftDelivered { gift, .. } if gift == "Stalker (1979)"
        ));
    }

    #[test_log::test]
    fn gifts_lock_once_watching_starts() {
        let f = exchanging();
        assert!(matches!(
            f.svc.set_gift(ParticipantId(9), "x").unwrap_err(),
            SwapError::NotJoined
        ));

        f.svc.set_gift(A, "first pick").unwrap();
        f.svc.set_gift(A, "second pick").unwrap();

        f.svc.set_phase(Phase::Watch).unwrap();
        let err = f.svc.set_gift(A, "third pick").unwrap_err();
        assert!(matches!(err, SwapError::State(StateError::AlreadySubmitted)));

        // B never submitted, so it may still do so.
        f.svc.set_gift(B, "late pick").unwrap();
    }

    #[test_log::test]
    fn gift_needs_a_giftee_and_not_the_join_phase() {
        let f = fixture();
        f.svc.join(A, "ana").unwrap();
        let err = f.svc.set_gift(A, "pick").unwrap_err();
        assert!(matches!(err, SwapError::State(StateError::WrongPhase { .. })));

        f.svc.set_phase(Phase::Exchange).unwrap();
        let err = f.svc.set_gift(A, "pick").unwrap_err();
        assert!(matches!(err, SwapError::State(StateError::NoGiftee)));
    }

    #[test_log::test]
    fn letter_boundary_and_edit_lock() {
        let f = fixture();
        f.svc.join(A, "ana").unwrap();
        f.svc.set_letter(A, &"a".repeat(MAX_CONTENT_CHARS)).unwrap();
        let err = f.svc.set_letter(A, &"a".repeat(MAX_CONTENT_CHARS + 1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        f.svc.join(B, "ben").unwrap();
        f.svc.set_phase(Phase::Exchange).unwrap();

        let err = f.svc.set_letter(A, "changed my mind").unwrap_err();
        assert!(matches!(err, SwapError::State(StateError::LetterLocked)));
        // A latecomer may still write their first letter.
        f.svc.set_letter(B, "anything by Varda").unwrap();
    }

    #[test_log::test]
    fn latecomers_form_their_own_ring() {
        let f = exchanging();
        let e = ParticipantId(5);
        let g = ParticipantId(6);
        join_with_letter(&f.svc, e, "eve");
        join_with_letter(&f.svc, g, "gus");
        f.notifier.clear();

        let order = f.svc.match_now().unwrap();
        assert_eq!(order.len(), 2);
        assert_eq!(giftee_of(&f.svc, e), g);
        assert_eq!(giftee_of(&f.svc, g), e);

        let report = f.svc.verify_rings().unwrap();
        let mut sizes: Vec<usize> = report.rings.iter().map(Vec::len).collect();
        sizes.sort();
        assert_eq!(sizes, vec![2, 4]);

        // Only the new ring hears about it.
        let mut recipients: Vec<ParticipantId> =
            f.notifier.sent().into_iter().map(|(to, _)| to).collect();
        recipients.sort();
        assert_eq!(recipients, vec![e, g]);
    }

    #[test_log::test]
    fn ban_splices_the_ring_and_notifies_neighbours() {
        let f = exchanging();
        let santa = santa_of(&f.svc, B);
        let giftee = giftee_of(&f.svc, B);
        f.svc.set_gift(santa, "for ben").unwrap();
        f.notifier.clear();

        let report = f.svc.ban(B).unwrap();
        assert_eq!(
            report.repair,
            Some(RepairOutcome::Spliced { santa, giftee })
        );
        assert!(report.warning().is_none());

        assert_eq!(giftee_of(&f.svc, santa), giftee);
        assert_eq!(f.svc.review_gift(santa).unwrap(), GiftReview::NotSet);
        assert_eq!(f.svc.verify_rings().unwrap().rings[0].len(), 3);
        let bans = f.svc.list_banned().unwrap();
        assert_eq!(bans.len(), 1);
        assert_eq!(bans[0].participant_id, B);

        assert_eq!(f.notifier.sent_to(santa), vec![Notification::GifteeReassigned]);
        assert_eq!(f.notifier.sent_to(giftee), vec![Notification::SantaReassigned]);

        let err = f.svc.ban(B).unwrap_err();
        assert!(matches!(err, SwapError::State(StateError::AlreadyBanned)));
        let err = f.svc.check_active(B).unwrap_err();
        assert!(matches!(err, SwapError::State(StateError::Banned)));
    }

    #[test_log::test]
    fn banning_from_a_pair_dissolves_it() {
        let f = fixture();
        join_with_letter(&f.svc, A, "ana");
        join_with_letter(&f.svc, B, "ben");
        f.svc.set_phase(Phase::Exchange).unwrap();
        f.svc.set_gift(A, "for ben").unwrap();
        f.notifier.clear();

        let report = f.svc.ban(B).unwrap();
        assert_eq!(report.repair, Some(RepairOutcome::Dissolved { remaining: A }));
        assert!(report.warning().is_some());

        let report = f.svc.verify_rings().unwrap();
        assert!(report.rings.is_empty());
        assert_eq!(report.unmatched, vec![A]);
        assert_eq!(f.notifier.sent_to(A), vec![Notification::PartnerRemoved]);
    }

    #[test_log::test]
    fn join_only_policy_refuses_bans_mid_exchange() {
        let f = fixture_with(
            SwapConfig {
                ban_policy: BanPolicy::JoinOnly,
                match_seed: Some(1),
            },
            CountingSnapshots::default(),
        );
        f.svc.create_exchange().unwrap();
        f.svc.set_channel(1).unwrap();
        f.svc.ban(ParticipantId(99)).unwrap();
        f.svc.set_phase(Phase::Exchange).unwrap();

        assert!(matches!(
            f.svc.ban(A).unwrap_err(),
            SwapError::State(StateError::WrongPhase { .. })
        ));
        assert!(matches!(
            f.svc.unban(ParticipantId(99)).unwrap_err(),
            SwapError::State(StateError::WrongPhase { .. })
        ));
    }

    #[test_log::test]
    fn unban_requires_a_ban() {
        let f = fixture();
        let err = f.svc.unban(A).unwrap_err();
        assert!(matches!(err, SwapError::State(StateError::NotBanned)));

        f.svc.ban(A).unwrap();
        f.svc.unban(A).unwrap();
        f.svc.join(A, "ana").unwrap();
    }

    #[test_log::test]
    fn returning_to_join_snapshots_and_resets() {
        let f = exchanging();
        f.svc.set_gift(A, "pick").unwrap();
        f.svc.set_phase(Phase::Watch).unwrap();
        f.svc.mark_watched(giftee_of(&f.svc, A)).unwrap();

        f.svc.set_phase(Phase::Join).unwrap();
        assert_eq!(f.snapshots.taken(), 1);

        for p in f.svc.list_participants().unwrap() {
            assert!(!p.is_matched());
            assert!(p.gift.is_none());
            assert!(!p.watched);
            assert!(p.has_letter());
        }
    }

    #[test_log::test]
    fn failed_snapshot_aborts_the_reset() {
        let f = fixture_with(
            SwapConfig::default(),
            CountingSnapshots::failing(),
        );
        f.svc.create_exchange().unwrap();
        f.svc.set_channel(1).unwrap();
        join_with_letter(&f.svc, A, "ana");
        join_with_letter(&f.svc, B, "ben");
        f.svc.set_phase(Phase::Exchange).unwrap();

        let err = f.svc.set_phase(Phase::Join).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert_eq!(f.svc.get_phase().unwrap(), Phase::Exchange);
        assert!(f.svc.get_giftee(A).unwrap().is_some());
    }

    #[test_log::test]
    fn watched_is_set_once_outside_join() {
        let f = fixture();
        f.svc.join(A, "ana").unwrap();
        assert!(matches!(
            f.svc.mark_watched(A).unwrap_err(),
            SwapError::State(StateError::WrongPhase { .. })
        ));

        f.svc.set_phase(Phase::Exchange).unwrap();
        f.svc.mark_watched_for(A).unwrap();
        assert!(matches!(
            f.svc.mark_watched(A).unwrap_err(),
            SwapError::State(StateError::AlreadyWatched)
        ));
    }

    #[test_log::test]
    fn anonymous_messages_follow_the_links() {
        let f = exchanging();
        let santa = santa_of(&f.svc, A);
        let giftee = giftee_of(&f.svc, A);
        f.notifier.clear();

        f.svc.message_santa(A, "  no horror please ").unwrap();
        f.svc.message_giftee(A, "hope you like it").unwrap();
        assert!(f.notifier.sent_to(santa).contains(&Notification::FromGiftee {
            text: "no horror please".into()
        }));
        assert!(f.notifier.sent_to(giftee).contains(&Notification::FromSanta {
            text: "hope you like it".into()
        }));

        f.notifier.make_unreachable(santa);
        let err = f.svc.message_santa(A, "hello?").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Delivery);

        let e = ParticipantId(5);
        f.svc.join(e, "eve").unwrap();
        assert!(matches!(
            f.svc.message_santa(e, "hi").unwrap_err(),
            SwapError::State(StateError::NoSanta)
        ));
        assert!(matches!(
            f.svc.message_giftee(e, "hi").unwrap_err(),
            SwapError::State(StateError::NoGiftee)
        ));
    }

    #[test_log::test]
    fn gift_stays_sealed_until_watch() {
        let f = exchanging();
        let santa = santa_of(&f.svc, A);

        assert_eq!(
            f.svc.receive_gift(A).unwrap(),
            GiftReceipt::NotRevealed {
                phase: Phase::Exchange
            }
        );
        f.svc.set_phase(Phase::Watch).unwrap();
        assert_eq!(f.svc.receive_gift(A).unwrap(), GiftReceipt::NotSubmitted);

        f.svc.set_gift(santa, "Paris, Texas").unwrap();
        assert_eq!(
            f.svc.receive_gift(A).unwrap(),
            GiftReceipt::Gift {
                recipient_name: "ana".into(),
                text: "Paris, Texas".into(),
            }
        );
    }

    #[test_log::test]
    fn own_content_views() {
        let f = fixture();
        f.svc.join(A, "ana").unwrap();
        assert_eq!(f.svc.review_letter(A).unwrap(), LetterView::NotSet);
        assert_eq!(f.svc.read_giftee_letter(A).unwrap(), GifteeLetter::NoGiftee);

        f.svc.set_letter(A, "musicals").unwrap();
        assert_eq!(
            f.svc.review_letter(A).unwrap(),
            LetterView::Letter {
                author_name: "ana".into(),
                text: "musicals".into(),
            }
        );
        assert!(matches!(
            f.svc.review_letter(B).unwrap_err(),
            SwapError::NotJoined
        ));
    }

    #[test_log::test]
    fn refresh_renames_and_drops() {
        let f = fixture();
        join_with_letter(&f.svc, A, "ana");
        join_with_letter(&f.svc, B, "ben");
        join_with_letter(&f.svc, C, "cai");

        let resolver = MapResolver(HashMap::from([
            (A, "ana".to_string()),
            (B, "benjamin".to_string()),
        ]));
        let report = f.svc.refresh_display_names(&resolver).unwrap();
        assert_eq!(report.renamed, 1);
        assert_eq!(report.dropped, vec![C]);
        assert_eq!(report.failed, 0);

        let ids: Vec<ParticipantId> = f
            .svc
            .list_without_letter()
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![C]);
        assert_eq!(f.svc.get_santa(B).unwrap(), None);
    }

    #[test_log::test]
    fn summary_counts() {
        let f = exchanging();
        f.svc.join(ParticipantId(5), "eve").unwrap();
        f.svc.ban(ParticipantId(77)).unwrap();
        f.svc.set_gift(A, "pick").unwrap();

        let summary = f.svc.summary().unwrap();
        assert_eq!(summary.phase, Phase::Exchange);
        assert_eq!(summary.channel_ref, Some(42));
        assert_eq!(summary.participants, 5);
        assert_eq!(summary.without_letter, 1);
        assert_eq!(summary.with_letter, 4);
        assert_eq!(summary.without_gift, 3);
        assert_eq!(summary.not_watched, 4);
        assert_eq!(summary.without_giftee, 0);
        assert_eq!(summary.without_santa, 0);
        assert_eq!(summary.banned, 1);
    }

    #[test_log::test]
    fn unmatch_needs_force_mid_exchange() {
        let f = exchanging();
        let err = f.svc.unmatch_all(false).unwrap_err();
        assert!(matches!(err, SwapError::State(StateError::WrongPhase { .. })));

        assert_eq!(f.svc.unmatch_all(true).unwrap(), 4);
        assert_eq!(f.svc.verify_rings().unwrap().unmatched.len(), 4);
    }

    #[test_log::test]
    fn join_message_and_snapshot() {
        let f = fixture();
        assert_eq!(f.svc.join_message().unwrap(), None);
        f.svc.set_join_message(1234).unwrap();
        assert_eq!(f.svc.join_message().unwrap(), Some(1234));

        f.svc.snapshot().unwrap();
        assert_eq!(f.snapshots.taken(), 1);
    }
}
