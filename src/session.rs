//! Unit of work over the forge state.
//!
//! A file-backed session holds `.forge/state.lock` from `open` until it is
//! dropped, so concurrent CLI invocations are serialized. Components mutate
//! the working copy and queue notifications; nothing reaches disk or any
//! notification channel until `commit`.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::jobs::JobHandle;
use crate::lock::FileLock;
use crate::model::ForgeState;
use crate::notify::{Emitter, Notification};
use crate::storage::Storage;

enum Backing {
    Memory,
    File { storage: Storage, _lock: FileLock },
}

pub struct Session {
    state: ForgeState,
    backing: Backing,
    pending: Vec<Notification>,
}

/// What a commit persisted and dispatched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommitReport {
    pub notifications: usize,
    pub jobs: Vec<JobHandle>,
    pub warnings: Vec<String>,
}

impl Session {
    /// Session over an in-memory state; `commit` only dispatches.
    pub fn in_memory(state: ForgeState) -> Self {
        Self {
            state,
            backing: Backing::Memory,
            pending: Vec::new(),
        }
    }

    /// Lock the forge root and load its state.
    pub fn open(storage: &Storage, timeout_ms: u64) -> Result<Self> {
        if !storage.is_initialized() {
            return Err(Error::NotInitialized(storage.root().to_path_buf()));
        }
        let lock = FileLock::acquire(storage.lock_file(), timeout_ms)?;
        let state: ForgeState = storage.read_json(&storage.state_file())?;
        Ok(Self {
            state,
            backing: Backing::File {
                storage: storage.clone(),
                _lock: lock,
            },
            pending: Vec::new(),
        })
    }

    /// Create `.forge/` with an empty state. Returns false if it already existed.
    pub fn initialize(storage: &Storage, timeout_ms: u64) -> Result<bool> {
        storage.init_dirs()?;
        let _lock = FileLock::acquire(storage.lock_file(), timeout_ms)?;
        if storage.is_initialized() {
            return Ok(false);
        }
        storage.write_json(&storage.state_file(), &ForgeState::new())?;
        Ok(true)
    }

    pub fn state(&self) -> &ForgeState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ForgeState {
        &mut self.state
    }

    /// Queue a notification for dispatch after commit.
    pub fn record(&mut self, notification: Notification) {
        tracing::debug!(
            topic = notification.topic.as_str(),
            messages = notification.messages.len(),
            "notification queued"
        );
        self.pending.push(notification);
    }

    pub fn pending(&self) -> &[Notification] {
        &self.pending
    }

    /// Persist the working state, then dispatch queued notifications.
    ///
    /// Dispatch problems come back as warnings; once the state is written
    /// the commit has succeeded.
    pub fn commit(&mut self, emitter: &mut Emitter) -> Result<CommitReport> {
        if let Backing::File { storage, .. } = &self.backing {
            storage.write_json(&storage.state_file(), &self.state)?;
        }

        let pending = std::mem::take(&mut self.pending);
        let dispatch = emitter.dispatch(&pending);
        Ok(CommitReport {
            notifications: pending.len(),
            jobs: dispatch.jobs,
            warnings: dispatch.warnings,
        })
    }

    /// Drop the working copy and queued notifications. Returns how many
    /// notifications were discarded.
    pub fn rollback(self) -> usize {
        let discarded = self.pending.len();
        tracing::debug!(discarded, "session rolled back");
        discarded
    }

    pub fn into_state(self) -> ForgeState {
        self.state
    }
}
