//! Lifecycle of a film swap: who is in it, who gifts to whom, and what each
//! participant is allowed to do in the current phase.
//!
//! [`SwapService`] is the entry point. It owns the roster store and runs
//! every mutating operation inside one database transaction, then delivers
//! notifications after the commit.

pub mod config;
pub mod content;
pub mod error;
pub mod phase;
pub mod ports;
pub mod repair;
pub mod ring;
mod service;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{BanPolicy, SwapConfig};
pub use error::{
    ConfigurationError, ErrorKind, InsufficientParticipants, RingViolation, StateError, SwapError,
    ValidationError,
};
pub use ports::{NameResolver, NoSnapshots, Notifier, SnapshotSink};
pub use service::{BanReport, RefreshReport, SwapService};
