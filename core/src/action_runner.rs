//! "Cancel the previous action, then start the next."

use std::future::Future;
use std::sync::{Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

/// Hands out one cancellation token per action. Starting an action cancels
/// the one before it, so at most one token is live at any time.
#[derive(Debug, Default)]
pub struct ActionRunner {
    state: Mutex<RunnerState>,
}

#[derive(Debug, Default)]
struct RunnerState {
    current: Option<CancellationToken>,
    disposed: bool,
}

impl ActionRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the running action and return the token for the next one.
    /// After [`dispose`](Self::dispose) the token is already cancelled.
    pub fn start(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = state.current.take() {
            previous.cancel();
        }
        if state.disposed {
            token.cancel();
        } else {
            state.current = Some(token.clone());
        }
        token
    }

    /// Run `action` as the new current action.
    pub async fn run<F, Fut, T>(&self, action: F) -> T
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = T>,
    {
        let token = self.start();
        action(token).await
    }

    /// Cancel the running action, if any, without starting another.
    pub fn cancel_current(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = state.current.take() {
            current.cancel();
        }
    }

    /// Cancel the last started action and refuse new ones. Idempotent.
    pub fn dispose(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.disposed = true;
        if let Some(current) = state.current.take() {
            current.cancel();
        }
    }
}

impl Drop for ActionRunner {
    fn drop(&mut self) {
        self.dispose();
    }
}
