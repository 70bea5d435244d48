//! Wallet lock state.

use std::sync::Arc;
use tokio::sync::watch;

/// Owns the unlocked flag of the wallet.
///
/// Every component that needs the lock state holds a clone of the session and either queries it or
/// subscribes to changes.
#[derive(Clone, Debug)]
pub struct Session {
    unlocked: Arc<watch::Sender<bool>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Session {
    pub fn new(unlocked: bool) -> Self {
        let (unlocked, _) = watch::channel(unlocked);
        Self { unlocked: Arc::new(unlocked) }
    }

    pub fn unlock(&self) {
        if self.unlocked.send_if_modified(|state| !std::mem::replace(state, true)) {
            debug!(target: "session", "wallet unlocked");
        }
    }

    pub fn lock(&self) {
        if self.unlocked.send_if_modified(|state| std::mem::replace(state, false)) {
            debug!(target: "session", "wallet locked");
        }
    }

    pub fn is_unlocked(&self) -> bool {
        *self.unlocked.borrow()
    }

    /// Returns a receiver that observes every lock state change.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.unlocked.subscribe()
    }
}
