use std::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::Result;

/// Handle on a transfer that may still be in flight.
///
/// Becomes ready only after every byte of the transfer has landed or the
/// transfer failed. Clones observe the same completion.
#[derive(Clone)]
pub struct CompletionToken {
    state: Arc<(Mutex<Option<Result<()>>>, Condvar)>,
}

impl CompletionToken {
    pub(crate) fn new() -> Self {
        CompletionToken {
            state: Arc::new((Mutex::new(None), Condvar::new())),
        }
    }

    /// A token that is already complete.
    pub fn ready() -> Self {
        let token = Self::new();
        token.complete(Ok(()));
        token
    }

    /// Blocks until the transfer finishes and returns its outcome.
    pub fn wait(&self) -> Result<()> {
        let (lock, cvar) = &*self.state;
        let mut result = lock.lock();
        loop {
            if let Some(outcome) = result.as_ref() {
                return outcome.clone();
            }
            cvar.wait(&mut result);
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state.0.lock().is_some()
    }

    pub(crate) fn complete(&self, outcome: Result<()>) {
        let (lock, cvar) = &*self.state;
        *lock.lock() = Some(outcome);
        cvar.notify_all();
    }
}

impl fmt::Debug for CompletionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionToken")
            .field("complete", &self.is_complete())
            .finish()
    }
}

/// Waits for every token, then reports the first failure in submission order.
pub fn wait_all<'t>(tokens: impl IntoIterator<Item = &'t CompletionToken>) -> Result<()> {
    let mut first_error = None;
    for token in tokens {
        if let Err(e) = token.wait() {
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
