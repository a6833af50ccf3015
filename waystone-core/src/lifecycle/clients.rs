//! Connected clients and the version controlling each

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ClientId(u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

#[derive(Default)]
pub struct ClientRegistry {
    next_id: AtomicU64,
    /// Client -> version tag of its controller, `None` if uncontrolled
    clients: RwLock<BTreeMap<ClientId, Option<String>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client, controlled by `controller` if given
    pub fn connect(&self, controller: Option<String>) -> ClientId {
        let id = ClientId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.clients.write().unwrap_or_else(PoisonError::into_inner).insert(id, controller);
        id
    }

    pub fn disconnect(&self, id: ClientId) -> bool {
        self.clients.write().unwrap_or_else(PoisonError::into_inner).remove(&id).is_some()
    }

    /// Make `version` the controller of every registered client.
    ///
    /// Returns the number of clients whose controller changed.
    pub fn claim(&self, version: &str) -> usize {
        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        let mut claimed = 0;
        for controller in clients.values_mut() {
            if controller.as_deref() != Some(version) {
                *controller = Some(version.to_string());
                claimed += 1;
            }
        }
        claimed
    }

    pub fn controller_of(&self, id: ClientId) -> Option<String> {
        self.clients.read().unwrap_or_else(PoisonError::into_inner).get(&id).cloned().flatten()
    }

    pub fn controlled_by(&self, version: &str) -> usize {
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|c| c.as_deref() == Some(version))
            .count()
    }

    pub fn len(&self) -> usize {
        self.clients.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
