use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, bail};
use filmswap_core::Notifier;
use filmswap_types::ParticipantId;
use filmswap_types::events::{Addressed, Notification};
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Routes notifications to participants' open gateway connections.
///
/// One connection per participant; a newer connection replaces the older
/// one. Delivery to a participant with no connection fails.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

#[derive(Default)]
struct DispatcherInner {
    next_conn_id: AtomicU64,
    /// participant -> (conn_id, sender)
    connections: RwLock<HashMap<ParticipantId, (u64, mpsc::UnboundedSender<Addressed>)>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for `id`. Returns (conn_id, receiver), or
    /// `None` if the connection table is poisoned and nothing could ever be
    /// delivered on the receiver.
    pub fn register(&self, id: ParticipantId) -> Option<(u64, mpsc::UnboundedReceiver<Addressed>)> {
        let conn_id = self.inner.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        match self.inner.connections.write() {
            Ok(mut connections) => {
                connections.insert(id, (conn_id, tx));
            }
            Err(e) => {
                error!("Cannot register gateway connection for {}: {}", id, e);
                return None;
            }
        }
        debug!("Registered gateway connection {} for {}", conn_id, id);
        Some((conn_id, rx))
    }

    /// Unregister `id`, but only if `conn_id` is still the current connection.
    pub fn unregister(&self, id: ParticipantId, conn_id: u64) {
        let Ok(mut connections) = self.inner.connections.write() else {
            return;
        };
        if connections.get(&id).is_some_and(|(current, _)| *current == conn_id) {
            connections.remove(&id);
        }
    }

    pub fn is_connected(&self, id: ParticipantId) -> bool {
        self.inner
            .connections
            .read()
            .map(|connections| connections.contains_key(&id))
            .unwrap_or(false)
    }
}

impl Notifier for Dispatcher {
    fn notify(&self, to: ParticipantId, notification: &Notification) -> anyhow::Result<()> {
        let connections = self
            .inner
            .connections
            .read()
            .map_err(|e| anyhow!("dispatcher lock poisoned: {}", e))?;
        let Some((_, tx)) = connections.get(&to) else {
            bail!("{} has no open gateway connection", to);
        };
        tx.send(Addressed {
            to,
            notification: notification.clone(),
        })
        .map_err(|_| anyhow!("gateway connection of {} closed", to))
    }
}
