//! Which participant and operator actions each phase allows.
//!
//! The phase value itself lives in the exchange row; this module is the
//! single place that decides what it permits. Entry side effects of a phase
//! change are applied by the service.

use filmswap_types::Phase;

use crate::config::BanPolicy;
use crate::error::StateError;

/// An action gated by the current phase, with whatever participant state the
/// decision depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Join,
    Leave,
    SetLetter { has_letter: bool },
    SetGift { has_gift: bool },
    MarkWatched,
    Ban { policy: BanPolicy },
    Unban { policy: BanPolicy },
    UnmatchAll { force: bool },
}

pub fn check(phase: Phase, action: Action) -> Result<(), StateError> {
    let wrong = |action: &'static str, hint: &'static str| {
        Err(StateError::WrongPhase {
            action,
            phase,
            hint,
        })
    };

    match (action, phase) {
        (Action::Join, Phase::Join | Phase::Exchange) => Ok(()),
        (Action::Join, Phase::Watch) => wrong(
            "join the exchange",
            "wait until the next exchange is announced",
        ),

        (Action::Leave, Phase::Join) => Ok(()),
        (Action::Leave, Phase::Exchange | Phase::Watch) => wrong(
            "leave the exchange",
            "wait until the next join phase to leave",
        ),

        // First letters are always welcome so latecomers can still be matched;
        // edits are only allowed while the roster is open.
        (Action::SetLetter { .. }, Phase::Join) => Ok(()),
        (Action::SetLetter { has_letter: false }, Phase::Exchange | Phase::Watch) => Ok(()),
        (Action::SetLetter { has_letter: true }, Phase::Exchange | Phase::Watch) => {
            Err(StateError::LetterLocked)
        }

        (Action::SetGift { .. }, Phase::Join) => wrong(
            "submit a gift",
            "gifts can be submitted once the exchange phase starts",
        ),
        (Action::SetGift { .. }, Phase::Exchange) => Ok(()),
        (Action::SetGift { has_gift: false }, Phase::Watch) => Ok(()),
        (Action::SetGift { has_gift: true }, Phase::Watch) => Err(StateError::AlreadySubmitted),

        (Action::MarkWatched, Phase::Join) => wrong(
            "mark a gift as watched",
            "gifts can be marked watched once they have been handed out",
        ),
        (Action::MarkWatched, Phase::Exchange | Phase::Watch) => Ok(()),

        (Action::Ban { policy } | Action::Unban { policy }, phase) => match (policy, phase) {
            (BanPolicy::Permissive, _) | (BanPolicy::JoinOnly, Phase::Join) => Ok(()),
            (BanPolicy::JoinOnly, Phase::Exchange | Phase::Watch) => wrong(
                "change bans",
                "bans can only be changed during the join phase",
            ),
        },

        (Action::UnmatchAll { .. }, Phase::Join) => Ok(()),
        (Action::UnmatchAll { force: true }, Phase::Exchange | Phase::Watch) => Ok(()),
        (Action::UnmatchAll { force: false }, Phase::Exchange | Phase::Watch) => wrong(
            "unmatch everyone",
            "unmatching mid-exchange strands submitted gifts; force it if you really mean to",
        ),
    }
}
