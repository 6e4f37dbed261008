//! Collaborators the exchange calls out to: notification delivery, durable
//! snapshots, and the platform's directory of display names.

use filmswap_db::{Database, SqliteBackup};
use filmswap_types::ParticipantId;
use filmswap_types::events::Notification;

/// Delivers a notification to one participant.
///
/// Delivery is best-effort. Callers log failures and carry on; one
/// unreachable participant never fails the operation that triggered it.
pub trait Notifier: Send + Sync {
    fn notify(&self, to: ParticipantId, notification: &Notification) -> anyhow::Result<()>;
}

/// Takes a durable copy of the roster, e.g. before a new cycle wipes links
/// and gifts.
pub trait SnapshotSink: Send + Sync {
    fn snapshot(&self, db: &Database) -> anyhow::Result<()>;
}

/// Looks up a participant's current display name on the platform.
/// `Ok(None)` means the identity no longer exists there.
pub trait NameResolver {
    fn display_name(&self, id: ParticipantId) -> anyhow::Result<Option<String>>;
}

pub struct NoSnapshots;

impl SnapshotSink for NoSnapshots {
    fn snapshot(&self, _db: &Database) -> anyhow::Result<()> {
        Ok(())
    }
}

impl SnapshotSink for SqliteBackup {
    fn snapshot(&self, db: &Database) -> anyhow::Result<()> {
        self.write(db).map(|_| ())
    }
}
