//! Engine process launcher.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};

use crate::listeners::ListenerRegistry;
use crate::transport::{RpcTransport, TransportOptions};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("engine executable '{executable}' not found")]
    NotFound {
        executable: String,
        #[source]
        source: which::Error,
    },
    #[error("failed to start engine '{executable}'")]
    Spawn {
        executable: String,
        #[source]
        source: std::io::Error,
    },
    #[error("engine process has no {0} pipe")]
    MissingStream(&'static str),
    #[error("an RPC transport is already attached to this process")]
    AlreadyAttached,
}

#[derive(Debug, Clone, Default)]
pub struct LaunchParameters {
    /// Absolute path, or a bare name looked up on `PATH`.
    pub executable: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl LaunchParameters {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    fn resolve_executable(&self) -> Result<PathBuf, ProcessError> {
        if self.executable.components().count() > 1 {
            return Ok(self.executable.clone());
        }
        which::which(&self.executable).map_err(|source| ProcessError::NotFound {
            executable: self.executable.display().to_string(),
            source,
        })
    }
}

/// A running engine with its three standard streams redirected.
///
/// Streams are handed out once: stderr to the drainer, stdin/stdout to the
/// transport. The child is killed when this handle is dropped.
pub struct EngineProcess {
    child: Child,
    executable: PathBuf,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    disposed: bool,
}

impl EngineProcess {
    /// Spawn the engine. Failure is returned to the caller; there is no retry.
    pub fn start(params: &LaunchParameters) -> Result<Self, ProcessError> {
        let executable = params.resolve_executable()?;
        let mut cmd = Command::new(&executable);
        cmd.args(&params.args)
            .envs(params.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &params.working_dir {
            cmd.current_dir(dir);
        }
        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            executable: executable.display().to_string(),
            source,
        })?;
        tracing::info!(
            executable = %executable.display(),
            pid = ?child.id(),
            "Started SLCore process"
        );

        Ok(Self {
            stdin: child.stdin.take(),
            stdout: child.stdout.take(),
            stderr: child.stderr.take(),
            child,
            executable,
            disposed: false,
        })
    }

    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    #[must_use]
    pub fn executable(&self) -> &std::path::Path {
        &self.executable
    }

    /// The engine's stderr, for an [`ErrorStreamDrainer`](crate::ErrorStreamDrainer).
    pub fn take_error_stream(&mut self) -> Option<ChildStderr> {
        self.stderr.take()
    }

    /// Wrap stdin/stdout in an [`RpcTransport`]. Succeeds at most once.
    pub fn attach_rpc(
        &mut self,
        registry: ListenerRegistry,
        options: TransportOptions,
    ) -> Result<RpcTransport, ProcessError> {
        match (self.stdout.take(), self.stdin.take()) {
            (Some(stdout), Some(stdin)) => Ok(RpcTransport::attach(stdout, stdin, registry, options)),
            (None, None) => Err(ProcessError::AlreadyAttached),
            (None, _) => Err(ProcessError::MissingStream("stdout")),
            (_, None) => Err(ProcessError::MissingStream("stdin")),
        }
    }

    pub fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    /// Wait up to `timeout` for the process to exit on its own.
    pub async fn wait_for_exit(&mut self, timeout: Duration) -> Option<ExitStatus> {
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => Some(status),
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "Waiting for SLCore exit failed");
                None
            }
            Err(_) => None,
        }
    }

    /// Kill the process if it is still running. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.stdin.take();
        self.stdout.take();
        self.stderr.take();
        if self.has_exited() {
            return;
        }
        if let Err(e) = self.child.start_kill() {
            tracing::debug!(error = %e, "Killing SLCore process failed");
        } else {
            tracing::debug!(pid = ?self.child.id(), "Killed SLCore process");
        }
    }
}
