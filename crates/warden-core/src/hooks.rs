//! The message hook registry owned by one MAS wrapper.
//!
//! Holds the ordered hook list and the message-history buffer. Both are
//! behind `Arc<Mutex<_>>` so the interceptors installed on every agent share
//! them with the wrapper that registered them.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use warden_contracts::message::{HookMessage, MessageRecord};

use crate::traits::MessageHook;

#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: Arc<Mutex<Vec<MessageHook>>>,
    history: Arc<Mutex<Vec<MessageRecord>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A hook that panicked must not disable monitoring for the rest of the run.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `hook` to the end of the chain.
    pub fn register(&self, hook: MessageHook) {
        let mut hooks = lock(&self.hooks);
        hooks.push(hook);
        debug!(hook_count = hooks.len(), "message hook registered");
    }

    /// Remove every hook.
    pub fn clear(&self) {
        let mut hooks = lock(&self.hooks);
        debug!(hook_count = hooks.len(), "clearing message hooks");
        hooks.clear();
    }

    pub fn len(&self) -> usize {
        lock(&self.hooks).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fold `message` through every hook in registration order.
    ///
    /// The chain is snapshotted first so a hook may itself touch the
    /// registry without deadlocking.
    pub fn apply(&self, message: HookMessage) -> HookMessage {
        let hooks: Vec<MessageHook> = lock(&self.hooks).clone();
        hooks.iter().fold(message, |msg, hook| hook(msg))
    }

    /// Append one entry to the message history.
    pub fn record(&self, record: MessageRecord) {
        lock(&self.history).push(record);
    }

    pub fn history(&self) -> Vec<MessageRecord> {
        lock(&self.history).clone()
    }

    pub fn history_len(&self) -> usize {
        lock(&self.history).len()
    }

    /// History entries appended at or after position `start`.
    pub fn history_since(&self, start: usize) -> Vec<MessageRecord> {
        lock(&self.history).iter().skip(start).cloned().collect()
    }

    pub fn clear_history(&self) {
        lock(&self.history).clear();
    }
}
