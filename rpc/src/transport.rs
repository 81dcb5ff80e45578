//! JSON-RPC transport over a pair of byte streams.
//!
//! One writer task owns the outbound stream and serializes every frame; one
//! reader task owns the inbound stream, completes pending requests and
//! dispatches engine-initiated calls into the [`ListenerRegistry`]. Inbound
//! requests run on the blocking pool so a slow handler never holds up the
//! reader, and their replies go through an unbounded lane so a busy writer
//! never stops inbound reading.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::codec::{FrameReader, FrameWriter};
use crate::listeners::ListenerRegistry;
use crate::protocol::{
    self, ErrorObject, INVALID_REQUEST, Incoming, Notification, PARSE_ERROR, Request,
};

const WRITER_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("connection to the engine is closed")]
    ConnectionClosed,
    #[error("'{method}' timed out after {timeout:?}")]
    Timeout { method: String, timeout: Duration },
    #[error("engine returned error {code}: {message}")]
    Remote {
        code: i64,
        message: String,
        data: Option<Value>,
    },
    #[error("failed to serialize params for '{method}'")]
    Serialize {
        method: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to deserialize result of '{method}'")]
    Deserialize {
        method: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<ErrorObject> for RpcError {
    fn from(error: ErrorObject) -> Self {
        Self::Remote {
            code: error.code,
            message: error.message,
            data: error.data,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TransportOptions {
    /// Upper bound on how long a request waits for its response. `None` waits
    /// until the response arrives or the connection closes.
    pub request_timeout: Option<Duration>,
}

enum WriterCommand {
    Send(Value),
    Shutdown,
}

type Waiter = oneshot::Sender<Result<Value, RpcError>>;

#[derive(Default)]
struct PendingTable {
    closed: bool,
    waiters: HashMap<u64, Waiter>,
}

type Pending = Arc<Mutex<PendingTable>>;

fn lock(pending: &Mutex<PendingTable>) -> MutexGuard<'_, PendingTable> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes a request's waiter however the call ends, including when the
/// caller drops the future.
struct PendingEntry<'a> {
    pending: &'a Mutex<PendingTable>,
    id: u64,
}

impl Drop for PendingEntry<'_> {
    fn drop(&mut self) {
        lock(self.pending).waiters.remove(&self.id);
    }
}

/// Fail every outstanding request and refuse new ones.
fn fail_all(pending: &Mutex<PendingTable>, closed_tx: &watch::Sender<bool>) {
    let waiters = {
        let mut table = lock(pending);
        table.closed = true;
        std::mem::take(&mut table.waiters)
    };
    if !waiters.is_empty() {
        tracing::debug!(count = waiters.len(), "Failing pending requests");
    }
    for (_, waiter) in waiters {
        let _ = waiter.send(Err(RpcError::ConnectionClosed));
    }
    closed_tx.send_replace(true);
}

pub struct RpcTransport {
    writer_tx: mpsc::Sender<WriterCommand>,
    pending: Pending,
    next_id: AtomicU64,
    options: TransportOptions,
    closed_tx: Arc<watch::Sender<bool>>,
    reader_handle: JoinHandle<()>,
    writer_handle: JoinHandle<()>,
}

impl RpcTransport {
    /// Start the reader and writer tasks. Must be called within a Tokio runtime.
    pub fn attach<R, W>(
        reader: R,
        writer: W,
        registry: ListenerRegistry,
        options: TransportOptions,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let pending: Pending = Arc::new(Mutex::new(PendingTable::default()));
        let (closed_tx, _) = watch::channel(false);
        let closed_tx = Arc::new(closed_tx);

        let (writer_tx, mut writer_rx) = mpsc::channel::<WriterCommand>(WRITER_CHANNEL_CAPACITY);
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<Value>();
        let writer_pending = Arc::clone(&pending);
        let writer_closed = Arc::clone(&closed_tx);
        let writer_handle = tokio::spawn(async move {
            let mut writer = FrameWriter::new(writer);
            loop {
                let frame = tokio::select! {
                    biased;
                    Some(reply) = reply_rx.recv() => reply,
                    cmd = writer_rx.recv() => match cmd {
                        Some(WriterCommand::Send(frame)) => frame,
                        Some(WriterCommand::Shutdown) | None => break,
                    },
                };
                if let Err(e) = writer.write_frame(&frame).await {
                    tracing::warn!(error = %e, "SLCore write error");
                    fail_all(&writer_pending, &writer_closed);
                    return;
                }
            }
            if let Err(e) = writer.close().await {
                tracing::debug!(error = %e, "Closing SLCore input failed");
            }
        });

        let reader_pending = Arc::clone(&pending);
        let reader_closed = Arc::clone(&closed_tx);
        let reader_handle = tokio::spawn(async move {
            let mut reader = FrameReader::new(reader);
            loop {
                match reader.read_frame().await {
                    Ok(Some(body)) => {
                        Self::dispatch_frame(&body, &reader_pending, &registry, &reply_tx);
                    }
                    Ok(None) => {
                        tracing::info!("SLCore closed its output stream");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "SLCore reader error");
                        break;
                    }
                }
            }
            fail_all(&reader_pending, &reader_closed);
        });

        Self {
            writer_tx,
            pending,
            next_id: AtomicU64::new(1),
            options,
            closed_tx,
            reader_handle,
            writer_handle,
        }
    }

    fn dispatch_frame(
        body: &[u8],
        pending: &Mutex<PendingTable>,
        registry: &ListenerRegistry,
        reply_tx: &mpsc::UnboundedSender<Value>,
    ) {
        let frame: Value = match serde_json::from_slice(body) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(error = %e, "Unparsable frame from SLCore");
                let error = ErrorObject::new(PARSE_ERROR, format!("Parse error: {e}"));
                let _ = reply_tx.send(protocol::error_response(Value::Null, &error));
                return;
            }
        };

        match protocol::classify(frame) {
            Incoming::Response { id: Some(id), outcome } => {
                let waiter = lock(pending).waiters.remove(&id);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(outcome.map_err(RpcError::from));
                    }
                    None => tracing::debug!(id, "Discarding response for unknown request id"),
                }
            }
            Incoming::Response { id: None, .. } => {
                tracing::debug!("Discarding response with a foreign id");
            }
            Incoming::Request { id, method, params } => {
                let registry = registry.clone();
                let reply_tx = reply_tx.clone();
                tokio::task::spawn_blocking(move || {
                    let reply = match registry.handle_request(&method, params) {
                        Ok(result) => protocol::success_response(id, result),
                        Err(e) => {
                            tracing::debug!(method = %method, error = %e, "Inbound request failed");
                            protocol::error_response(id, &e.to_error_object())
                        }
                    };
                    let _ = reply_tx.send(reply);
                });
            }
            Incoming::Notification { method, params } => {
                registry.handle_notification(&method, params);
            }
            Incoming::Invalid { id } => {
                tracing::trace!("Ignoring malformed JSON-RPC frame from SLCore");
                if let Some(id) = id {
                    let error = ErrorObject::new(INVALID_REQUEST, "Invalid request");
                    let _ = reply_tx.send(protocol::error_response(id, &error));
                }
            }
        }
    }

    /// Send a request and deserialize its result.
    pub async fn invoke<P, R>(&self, method: &str, params: &P) -> Result<R, RpcError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let params = serde_json::to_value(params).map_err(|source| RpcError::Serialize {
            method: method.to_string(),
            source,
        })?;
        let params = (!params.is_null()).then_some(params);
        let result = self.invoke_raw(method, params).await?;
        serde_json::from_value(result).map_err(|source| RpcError::Deserialize {
            method: method.to_string(),
            source,
        })
    }

    /// Send a request with pre-built params and return the raw `result`.
    pub async fn invoke_raw(&self, method: &str, params: Option<Value>) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = serde_json::to_value(Request::new(id, method, params)).map_err(|source| {
            RpcError::Serialize {
                method: method.to_string(),
                source,
            }
        })?;

        let (tx, rx) = oneshot::channel();
        {
            let mut table = lock(&self.pending);
            if table.closed {
                return Err(RpcError::ConnectionClosed);
            }
            table.waiters.insert(id, tx);
        }
        let _entry = PendingEntry {
            pending: &self.pending,
            id,
        };

        if self.writer_tx.send(WriterCommand::Send(frame)).await.is_err() {
            return Err(RpcError::ConnectionClosed);
        }

        let outcome = match self.options.request_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, rx).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return Err(RpcError::Timeout {
                        method: method.to_string(),
                        timeout,
                    });
                }
            },
            None => rx.await,
        };

        // A dropped sender means the table was torn down without a reply.
        outcome.unwrap_or(Err(RpcError::ConnectionClosed))
    }

    /// Fire-and-forget notification.
    pub async fn notify<P>(&self, method: &str, params: &P) -> Result<(), RpcError>
    where
        P: Serialize + ?Sized,
    {
        if self.is_closed() {
            return Err(RpcError::ConnectionClosed);
        }
        let params = serde_json::to_value(params).map_err(|source| RpcError::Serialize {
            method: method.to_string(),
            source,
        })?;
        let params = (!params.is_null()).then_some(params);
        let frame = serde_json::to_value(Notification::new(method, params)).map_err(|source| {
            RpcError::Serialize {
                method: method.to_string(),
                source,
            }
        })?;
        self.writer_tx
            .send(WriterCommand::Send(frame))
            .await
            .map_err(|_| RpcError::ConnectionClosed)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.closed_tx.borrow()
    }

    /// Resolves once the connection is closed, from either side.
    pub async fn closed(&self) {
        let mut rx = self.closed_tx.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Close the outbound stream, fail everything pending and stop reading.
    /// Idempotent.
    pub async fn shutdown(&self) {
        let _ = self.writer_tx.send(WriterCommand::Shutdown).await;
        fail_all(&self.pending, &self.closed_tx);
        self.reader_handle.abort();
    }
}

impl Drop for RpcTransport {
    fn drop(&mut self) {
        self.reader_handle.abort();
        self.writer_handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::protocol::{INVALID_PARAMS, METHOD_NOT_FOUND};
    use crate::test_support::connect;
    use serde::Deserialize;
    use serde_json::json;

    #[tokio::test]
    async fn responses_are_correlated_by_id_regardless_of_order() {
        let (transport, mut engine) = connect(ListenerRegistry::default(), TransportOptions::default());

        let engine_task = async move {
            let mut requests = Vec::new();
            for _ in 0..3 {
                requests.push(engine.recv().await);
            }
            for request in requests.iter().rev() {
                let id = request["id"].clone();
                let echo = request["params"]["n"].clone();
                engine.send(json!({"jsonrpc": "2.0", "id": id, "result": echo})).await;
            }
            engine
        };

        let (one, two, three) = (json!({"n": 1}), json!({"n": 2}), json!({"n": 3}));
        let (a, b, c, _engine) = tokio::join!(
            transport.invoke::<_, u32>("test/echo", &one),
            transport.invoke::<_, u32>("test/echo", &two),
            transport.invoke::<_, u32>("test/echo", &three),
            engine_task,
        );
        assert_eq!((a.unwrap(), b.unwrap(), c.unwrap()), (1, 2, 3));
    }

    #[tokio::test]
    async fn request_ids_are_unique_and_params_omitted_when_null() {
        let (transport, mut engine) = connect(ListenerRegistry::default(), TransportOptions::default());

        let engine_task = async {
            let first = engine.recv().await;
            let second = engine.recv().await;
            assert_ne!(first["id"], second["id"]);
            assert!(first.get("params").is_none());
            for req in [first, second] {
                engine.send(json!({"jsonrpc": "2.0", "id": req["id"], "result": null})).await;
            }
        };

        let (a, b, ()) = tokio::join!(
            transport.invoke::<_, ()>("lifecycle/shutdown", &()),
            transport.invoke::<_, ()>("lifecycle/shutdown", &()),
            engine_task,
        );
        a.unwrap();
        b.unwrap();
    }

    #[tokio::test]
    async fn closing_inbound_stream_fails_every_pending_request() {
        let (transport, mut engine) = connect(ListenerRegistry::default(), TransportOptions::default());

        let engine_task = async move {
            for _ in 0..4 {
                engine.recv().await;
            }
            drop(engine);
        };

        let (a, b, c, d, ()) = tokio::join!(
            transport.invoke_raw("test/a", None),
            transport.invoke_raw("test/b", None),
            transport.invoke_raw("test/c", None),
            transport.invoke_raw("test/d", None),
            engine_task,
        );
        for outcome in [a, b, c, d] {
            assert!(matches!(outcome, Err(RpcError::ConnectionClosed)));
        }

        transport.closed().await;
        assert!(transport.is_closed());
        assert!(matches!(
            transport.invoke_raw("test/after", None).await,
            Err(RpcError::ConnectionClosed)
        ));
        assert!(matches!(
            transport.notify("test/after", &()).await,
            Err(RpcError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn error_response_becomes_remote_error() {
        let (transport, mut engine) = connect(ListenerRegistry::default(), TransportOptions::default());

        let engine_task = async {
            let req = engine.recv().await;
            engine
                .send(json!({
                    "jsonrpc": "2.0",
                    "id": req["id"],
                    "error": {"code": -32000, "message": "boom", "data": {"detail": 1}}
                }))
                .await;
        };

        let (outcome, ()) = tokio::join!(transport.invoke_raw("test/fail", None), engine_task);
        match outcome {
            Err(RpcError::Remote { code, message, data }) => {
                assert_eq!(code, -32000);
                assert_eq!(message, "boom");
                assert_eq!(data, Some(json!({"detail": 1})));
            }
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn result_of_wrong_shape_is_deserialize_error() {
        let (transport, mut engine) = connect(ListenerRegistry::default(), TransportOptions::default());

        let engine_task = async {
            let req = engine.recv().await;
            engine.send(json!({"jsonrpc": "2.0", "id": req["id"], "result": "text"})).await;
        };

        let (outcome, ()) = tokio::join!(transport.invoke::<_, u32>("test/num", &()), engine_task);
        assert!(matches!(outcome, Err(RpcError::Deserialize { .. })));
    }

    #[tokio::test]
    async fn inbound_request_is_answered_by_registered_handler() {
        #[derive(Deserialize)]
        struct Params {
            name: String,
        }
        let mut builder = ListenerRegistry::builder();
        builder.request("test/greet", |p: Params| Ok(format!("hello {}", p.name)));
        let (_transport, mut engine) = connect(builder.build().unwrap(), TransportOptions::default());

        engine
            .send(json!({"jsonrpc": "2.0", "id": "req-1", "method": "test/greet", "params": {"name": "sq"}}))
            .await;
        let reply = engine.recv().await;
        assert_eq!(reply["id"], "req-1");
        assert_eq!(reply["result"], "hello sq");
    }

    #[tokio::test]
    async fn inbound_request_failures_become_error_replies() {
        let mut builder = ListenerRegistry::builder();
        builder.request("test/typed", |n: u32| Ok(n));
        let (_transport, mut engine) = connect(builder.build().unwrap(), TransportOptions::default());

        engine
            .send(json!({"jsonrpc": "2.0", "id": 7, "method": "test/unknown"}))
            .await;
        let reply = engine.recv().await;
        assert_eq!(reply["id"], 7);
        assert_eq!(reply["error"]["code"], METHOD_NOT_FOUND);

        engine
            .send(json!({"jsonrpc": "2.0", "id": 8, "method": "test/typed", "params": "x"}))
            .await;
        let reply = engine.recv().await;
        assert_eq!(reply["id"], 8);
        assert_eq!(reply["error"]["code"], INVALID_PARAMS);
    }

    #[tokio::test]
    async fn malformed_frames_do_not_stop_the_reader() {
        let mut builder = ListenerRegistry::builder();
        builder.request("test/ping", |(): ()| Ok("pong"));
        let (_transport, mut engine) = connect(builder.build().unwrap(), TransportOptions::default());

        engine.send_raw(b"{not json").await;
        let reply = engine.recv().await;
        assert!(reply["id"].is_null());
        assert_eq!(reply["error"]["code"], PARSE_ERROR);

        engine.send(json!({"jsonrpc": "2.0", "id": 3})).await;
        let reply = engine.recv().await;
        assert_eq!(reply["error"]["code"], INVALID_REQUEST);

        engine.send(json!({"jsonrpc": "2.0", "id": 999, "result": 1})).await;
        engine.send(json!({"jsonrpc": "2.0", "method": "test/unhandled"})).await;

        engine.send(json!({"jsonrpc": "2.0", "id": 4, "method": "test/ping"})).await;
        let reply = engine.recv().await;
        assert_eq!(reply["id"], 4);
        assert_eq!(reply["result"], "pong");
    }

    #[tokio::test]
    async fn notification_has_no_id() {
        let (transport, mut engine) = connect(ListenerRegistry::default(), TransportOptions::default());
        transport
            .notify("taskProgress/cancelTask", &json!({"taskId": "t"}))
            .await
            .unwrap();
        let frame = engine.recv().await;
        assert!(frame.get("id").is_none());
        assert_eq!(frame["method"], "taskProgress/cancelTask");
        assert_eq!(frame["params"]["taskId"], "t");
    }

    #[tokio::test]
    async fn request_timeout_removes_pending_entry() {
        let options = TransportOptions {
            request_timeout: Some(Duration::from_millis(50)),
        };
        let (transport, mut engine) = connect(ListenerRegistry::default(), options);

        let outcome = transport.invoke_raw("test/slow", None).await;
        assert!(matches!(outcome, Err(RpcError::Timeout { ref method, .. }) if method == "test/slow"));
        assert!(lock(&transport.pending).waiters.is_empty());

        // A late reply is discarded without disturbing the next call.
        let late = engine.recv().await;
        engine.send(json!({"jsonrpc": "2.0", "id": late["id"], "result": 1})).await;
        assert!(!transport.is_closed());
    }

    #[tokio::test]
    async fn slow_inbound_request_does_not_delay_responses() {
        let mut builder = ListenerRegistry::builder();
        builder.request("listener/listFiles", |(): ()| {
            std::thread::sleep(Duration::from_millis(800));
            Ok(json!({"files": []}))
        });
        let (transport, mut engine) = connect(builder.build().unwrap(), TransportOptions::default());

        let engine_task = async {
            engine
                .send(json!({"jsonrpc": "2.0", "id": "files-1", "method": "listener/listFiles"}))
                .await;
            let request = engine.recv().await;
            assert_eq!(request["method"], "test/x");
            engine.send(json!({"jsonrpc": "2.0", "id": request["id"], "result": 1})).await;
            let reply = engine.recv().await;
            assert_eq!(reply["id"], "files-1");
            assert_eq!(reply["result"]["files"], json!([]));
        };
        let call = async {
            let started = Instant::now();
            let outcome = transport.invoke_raw("test/x", None).await;
            (outcome, started.elapsed())
        };

        let ((outcome, elapsed), ()) = tokio::join!(call, engine_task);
        assert_eq!(outcome.unwrap(), json!(1));
        assert!(elapsed < Duration::from_millis(400), "response took {elapsed:?}");
    }

    #[tokio::test]
    async fn dropped_call_removes_pending_entry() {
        let (transport, mut engine) = connect(ListenerRegistry::default(), TransportOptions::default());

        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), transport.invoke_raw("test/never", None))
                .await;
        assert!(abandoned.is_err());
        assert!(lock(&transport.pending).waiters.is_empty());

        let request = engine.recv().await;
        assert_eq!(request["method"], "test/never");
    }

    #[tokio::test]
    async fn busy_writer_does_not_stop_inbound_reading() {
        const FLOOD: usize = 200;
        let mut builder = ListenerRegistry::builder();
        builder.request("test/ping", |(): ()| Ok("pong"));
        let (transport, mut engine) = connect(builder.build().unwrap(), TransportOptions::default());
        let (done_tx, done_rx) = oneshot::channel();
        let filler = json!({"blob": "x".repeat(16 * 1024)});

        let call = async {
            let outcome = transport.invoke_raw("test/first", None).await;
            let _ = done_tx.send(());
            outcome
        };
        let flood = async {
            for _ in 0..FLOOD {
                transport.notify("test/flood", &filler).await.unwrap();
            }
        };
        let engine_task = async {
            let request = engine.recv().await;
            assert_eq!(request["method"], "test/first");
            // Let the flood fill the pipe and the writer queue.
            tokio::time::sleep(Duration::from_millis(100)).await;
            engine.send(json!({"jsonrpc": "2.0", "id": "p1", "method": "test/ping"})).await;
            engine.send(json!({"jsonrpc": "2.0", "id": request["id"], "result": true})).await;
            let resolved = tokio::time::timeout(Duration::from_secs(2), done_rx).await;
            assert!(resolved.is_ok(), "response was held behind a full writer");

            let mut pong = None;
            for _ in 0..=FLOOD {
                let frame = engine.recv().await;
                if frame["id"] == "p1" {
                    pong = Some(frame);
                }
            }
            assert_eq!(pong.unwrap()["result"], "pong");
        };

        let (outcome, (), ()) = tokio::join!(call, flood, engine_task);
        assert_eq!(outcome.unwrap(), json!(true));
    }

    #[tokio::test]
    async fn shutdown_closes_outbound_stream() {
        let (transport, mut engine) = connect(ListenerRegistry::default(), TransportOptions::default());
        transport.shutdown().await;
        transport.shutdown().await;
        assert!(transport.is_closed());
        assert!(engine.reader.read_frame().await.unwrap().is_none());
    }
}
