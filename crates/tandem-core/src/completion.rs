//! Completion coordinator: a single-fire, level-triggered signal.
//!
//! One party fires it once per session; another waits on it before
//! tearing the session down. Waiting after the fire returns immediately.

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompletionError {
    #[error("completion already fired")]
    AlreadyFired,
}

/// Cloneable handle; all clones observe the same state.
#[derive(Debug, Clone)]
pub struct Completion {
    tx: Arc<watch::Sender<bool>>,
}

impl Completion {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// pending → fired. A second fire is a caller bug and is rejected.
    pub fn fire(&self) -> Result<(), CompletionError> {
        let mut fired_now = false;
        self.tx.send_if_modified(|fired| {
            if *fired {
                return false;
            }
            *fired = true;
            fired_now = true;
            true
        });
        if fired_now {
            Ok(())
        } else {
            Err(CompletionError::AlreadyFired)
        }
    }

    pub fn is_fired(&self) -> bool {
        *self.tx.borrow()
    }

    /// Suspend until fired.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|fired| *fired).await;
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}
