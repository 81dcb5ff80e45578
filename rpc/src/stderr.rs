//! Background drain of the engine's standard error.
//!
//! The engine blocks once its stderr pipe fills, so the pipe is read for the
//! whole life of the process and every non-empty line is forwarded to an
//! [`ErrorLineSink`].

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const STDERR_MARKER: &str = "[SLCORE-ERR]";

/// Destination for engine error output.
pub trait ErrorLineSink: Send + Sync {
    fn write_line(&self, line: &str);
}

/// Forwards lines to `tracing` under the `slcore::stderr` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ErrorLineSink for TracingSink {
    fn write_line(&self, line: &str) {
        tracing::warn!(target: "slcore::stderr", "{line}");
    }
}

pub struct ErrorStreamDrainer {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ErrorStreamDrainer {
    /// Start draining `reader` immediately on a background task.
    pub fn start<R>(reader: R, sink: Arc<dyn ErrorLineSink>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = drain(reader, sink.as_ref()) => {}
            }
        });
        Self {
            cancel,
            handle: Some(handle),
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stop the read loop. Idempotent.
    pub fn dispose(&mut self) {
        self.cancel.cancel();
        self.handle.take();
    }

    /// Wait for the loop to end on its own (end of stream).
    pub async fn finished(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for ErrorStreamDrainer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn drain<R: AsyncRead + Unpin>(reader: R, sink: &dyn ErrorLineSink) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            // End of stream: the engine closed stderr or exited.
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\r', '\n']);
                if line.is_empty() {
                    continue;
                }
                sink.write_line(&format!("{STDERR_MARKER} {line}"));
            }
            Err(e) => {
                tracing::debug!(error = %e, "Reading SLCore stderr failed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    #[derive(Default)]
    struct CollectingSink {
        lines: Mutex<Vec<String>>,
    }

    impl ErrorLineSink for CollectingSink {
        fn write_line(&self, line: &str) {
            self.lines.lock().unwrap().push(line.to_string());
        }
    }

    #[tokio::test]
    async fn forwards_non_empty_lines_with_marker_and_stops_at_eof() {
        let sink = Arc::new(CollectingSink::default());
        let input: &'static [u8] = b"first\n\n\r\nsecond\r\nlast without newline";
        let mut drainer = ErrorStreamDrainer::start(input, sink.clone());
        drainer.finished().await;

        assert_eq!(
            *sink.lines.lock().unwrap(),
            vec![
                "[SLCORE-ERR] first",
                "[SLCORE-ERR] second",
                "[SLCORE-ERR] last without newline",
            ]
        );
        assert!(drainer.is_finished());
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced_not_fatal() {
        let sink = Arc::new(CollectingSink::default());
        let input: &'static [u8] = b"bad \xff byte\nok\n";
        let mut drainer = ErrorStreamDrainer::start(input, sink.clone());
        drainer.finished().await;

        let lines = sink.lines.lock().unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains('\u{fffd}'));
        assert_eq!(lines[1], "[SLCORE-ERR] ok");
    }

    #[tokio::test]
    async fn dispose_stops_a_blocked_reader() {
        let sink = Arc::new(CollectingSink::default());
        let (mut tx, rx) = tokio::io::duplex(64);
        let mut drainer = ErrorStreamDrainer::start(rx, sink.clone());

        tx.write_all(b"before\n").await.unwrap();
        for _ in 0..50 {
            if !sink.lines.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        drainer.dispose();
        drainer.dispose();
        assert!(drainer.is_finished());

        let _ = tx.write_all(b"after\n").await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(*sink.lines.lock().unwrap(), vec!["[SLCORE-ERR] before"]);
    }
}
