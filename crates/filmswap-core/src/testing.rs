//! Recording doubles for the collaborator ports.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::bail;
use filmswap_db::Database;
use filmswap_types::ParticipantId;
use filmswap_types::events::Notification;

use crate::ports::{NameResolver, Notifier, SnapshotSink};

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(ParticipantId, Notification)>>,
    unreachable: Mutex<HashSet<ParticipantId>>,
}

impl RecordingNotifier {
    /// Make every delivery to `id` fail.
    pub fn make_unreachable(&self, id: ParticipantId) {
        self.unreachable.lock().unwrap().insert(id);
    }

    pub fn sent(&self) -> Vec<(ParticipantId, Notification)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, id: ParticipantId) -> Vec<Notification> {
        self.sent()
            .into_iter()
            .filter(|(to, _)| *to == id)
            .map(|(_, n)| n)
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, to: ParticipantId, notification: &Notification) -> anyhow::Result<()> {
        if self.unreachable.lock().unwrap().contains(&to) {
            bail!("{} has DMs closed", to);
        }
        self.sent.lock().unwrap().push((to, notification.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct CountingSnapshots {
    taken: AtomicUsize,
    fail: bool,
}

impl CountingSnapshots {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn taken(&self) -> usize {
        self.taken.load(Ordering::SeqCst)
    }
}

impl SnapshotSink for CountingSnapshots {
    fn snapshot(&self, _db: &Database) -> anyhow::Result<()> {
        if self.fail {
            bail!("backup disk full");
        }
        self.taken.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct MapResolver(pub HashMap<ParticipantId, String>);

impl NameResolver for MapResolver {
    fn display_name(&self, id: ParticipantId) -> anyhow::Result<Option<String>> {
        Ok(self.0.get(&id).cloned())
    }
}
