use filmswap_types::{ParticipantId, Phase};

/// Content a participant can fix and resubmit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} is too long ({len} characters, the limit is {max})")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },
}

/// The action is valid in general, but not right now.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("cannot {action} during the {phase} phase")]
    WrongPhase {
        action: &'static str,
        phase: Phase,
        hint: &'static str,
    },
    #[error("the exchange has already been created")]
    AlreadyExists,
    #[error("you are already in the exchange{}", renamed_suffix(.renamed))]
    AlreadyJoined { renamed: bool },
    #[error("you are banned from the exchange")]
    Banned,
    #[error("you have already submitted your gift")]
    AlreadySubmitted,
    #[error("this gift has already been marked as watched")]
    AlreadyWatched,
    #[error("participant is already banned")]
    AlreadyBanned,
    #[error("participant is not banned")]
    NotBanned,
    #[error("you have not been assigned a giftee yet")]
    NoGiftee,
    #[error("you have not been assigned a santa yet")]
    NoSanta,
    #[error("your letter can't be changed right now")]
    LetterLocked,
}

fn renamed_suffix(renamed: &bool) -> &'static str {
    if *renamed { " (display name updated)" } else { "" }
}

impl StateError {
    /// When the action becomes possible, for the user-facing reply.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::WrongPhase { hint, .. } => Some(*hint),
            Self::Banned => Some(
                "if you've finished your previous gift, post your thoughts in the swap thread and ask a mod to unban you",
            ),
            Self::AlreadySubmitted => {
                Some("gifts are locked once the watch phase starts; wait for the next exchange")
            }
            Self::NoGiftee => Some("giftees are assigned when the exchange phase starts"),
            Self::NoSanta => {
                Some("if you joined late you may be assigned one soon, otherwise wait for the next exchange")
            }
            Self::LetterLocked => Some("letters can be edited again when the next join phase starts"),
            Self::AlreadyExists
            | Self::AlreadyJoined { .. }
            | Self::AlreadyWatched
            | Self::AlreadyBanned
            | Self::NotBanned => None,
        }
    }
}

/// An operator precondition is missing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("no exchange has been created")]
    NotConfigured,
    #[error("no channel is set; set the exchange channel before starting the exchange phase")]
    MissingChannel,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "cannot match without at least 2 unmatched participants who have letters, currently have {eligible}"
)]
pub struct InsufficientParticipants {
    pub eligible: usize,
}

/// A santa/giftee link that breaks the ring structure. Always a bug.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RingViolation {
    #[error("participant {id} is linked to themselves")]
    SelfLink { id: ParticipantId },
    #[error("participant {id} links to {target}, who is not in the exchange")]
    DanglingLink {
        id: ParticipantId,
        target: ParticipantId,
    },
    #[error("{santa} gifts to {giftee}, but {giftee}'s santa is not {santa}")]
    Asymmetric {
        santa: ParticipantId,
        giftee: ParticipantId,
    },
    #[error("participant {id} has a santa or a giftee, but not both")]
    HalfLinked { id: ParticipantId },
    #[error("removed participant {id} is still in the exchange")]
    StillPresent { id: ParticipantId },
    #[error("removed participant {id} is still referenced by {count} link(s)")]
    StillReferenced { id: ParticipantId, count: i64 },
}

/// Coarse classification for callers that route errors to different audiences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    State,
    NotFound,
    Configuration,
    InsufficientParticipants,
    InvariantViolation,
    Delivery,
    Storage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::State => "state",
            Self::NotFound => "not_found",
            Self::Configuration => "configuration",
            Self::InsufficientParticipants => "insufficient_participants",
            Self::InvariantViolation => "invariant_violation",
            Self::Delivery => "delivery",
            Self::Storage => "storage",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SwapError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error("you are not in the exchange")]
    NotJoined,
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    InsufficientParticipants(#[from] InsufficientParticipants),
    #[error("invariant violation: {0}")]
    InvariantViolation(#[from] RingViolation),
    #[error("could not deliver message: {0:#}")]
    Delivery(anyhow::Error),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl SwapError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::State(_) => ErrorKind::State,
            Self::NotJoined => ErrorKind::NotFound,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::InsufficientParticipants(_) => ErrorKind::InsufficientParticipants,
            Self::InvariantViolation(_) => ErrorKind::InvariantViolation,
            Self::Delivery(_) => ErrorKind::Delivery,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::State(e) => e.hint(),
            Self::NotJoined => Some("click the join button in the swap channel to join"),
            _ => None,
        }
    }
}
