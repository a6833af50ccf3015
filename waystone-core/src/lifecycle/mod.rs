//! Worker lifecycle
//!
//! A [`CacheWorker`] serves one cache version. It is installed (precache
//! populated), waits until it may take over, then activates: stale namespaces
//! of other versions are purged and every connected client is claimed. The
//! [`Registration`] owns the active and waiting workers and drives updates.

pub mod clients;
pub mod registration;
pub mod tasks;
pub mod worker;

use std::fmt;

use serde::Serialize;

pub use clients::{ClientId, ClientRegistry};
pub use registration::{Registration, RegistrationStatus, WorkerStatus};
pub use tasks::{BackgroundTasks, TaskHandle};
pub use worker::CacheWorker;

/// Update signal that lets a waiting worker take over immediately
pub const SKIP_WAITING: &str = "SKIP_WAITING";

/// Lifecycle state of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Installing,
    /// Installed, not yet allowed to take over
    Waiting,
    Activating,
    Active,
    /// Replaced by a newer version
    Superseded,
    /// Installation failed; the worker never serves
    Redundant,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Installing => "installing",
            WorkerState::Waiting => "waiting",
            WorkerState::Activating => "activating",
            WorkerState::Active => "active",
            WorkerState::Superseded => "superseded",
            WorkerState::Redundant => "redundant",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
