//! One-off background jobs bounded by a timeout (e.g. precompiled headers).

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::action_runner::ActionRunner;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed(String),
    /// The job overran and its token was cancelled.
    TimedOut,
    /// A newer job or disposal cancelled it.
    Cancelled,
}

/// Runs jobs one at a time: a new job cancels the previous one, and a job
/// that exceeds the timeout is cancelled. Failures are logged, never raised.
#[derive(Debug)]
pub struct TimedJobRunner {
    runner: ActionRunner,
    timeout: Duration,
}

impl TimedJobRunner {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            runner: ActionRunner::new(),
            timeout,
        }
    }

    pub async fn run<F, Fut, E>(&self, name: &str, job: F) -> JobOutcome
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: fmt::Display,
    {
        let token = self.runner.start();
        let job = job(token.clone());

        let outcome = tokio::select! {
            result = job => match result {
                _ if token.is_cancelled() => JobOutcome::Cancelled,
                Ok(()) => JobOutcome::Completed,
                Err(e) => JobOutcome::Failed(e.to_string()),
            },
            () = token.cancelled() => JobOutcome::Cancelled,
            () = tokio::time::sleep(self.timeout) => {
                token.cancel();
                JobOutcome::TimedOut
            }
        };

        match &outcome {
            JobOutcome::Completed => tracing::debug!(job = name, "Job completed"),
            JobOutcome::Failed(error) => tracing::warn!(job = name, error = %error, "Job failed"),
            JobOutcome::TimedOut => {
                tracing::warn!(job = name, timeout_ms = self.timeout.as_millis(), "Job timed out");
            }
            JobOutcome::Cancelled => tracing::debug!(job = name, "Job cancelled"),
        }
        outcome
    }

    /// Cancel the running job, if any.
    pub fn cancel(&self) {
        self.runner.cancel_current();
    }

    pub fn dispose(&self) {
        self.runner.dispose();
    }
}
