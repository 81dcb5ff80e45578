//! Scripted engine on the far end of an in-memory pipe.

use serde_json::Value;
use tokio::io::{AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};

use crate::codec::FrameReader;
use crate::listeners::ListenerRegistry;
use crate::transport::{RpcTransport, TransportOptions};

pub(crate) struct FakeEngine {
    pub reader: FrameReader<ReadHalf<DuplexStream>>,
    pub writer: WriteHalf<DuplexStream>,
}

impl FakeEngine {
    pub async fn recv(&mut self) -> Value {
        let body = self.reader.read_frame().await.unwrap().unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    pub async fn send_raw(&mut self, body: &[u8]) {
        let header = format!("Content-Length: {}\r\n\r\n", body.len());
        self.writer.write_all(header.as_bytes()).await.unwrap();
        self.writer.write_all(body).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    pub async fn send(&mut self, msg: Value) {
        self.send_raw(&serde_json::to_vec(&msg).unwrap()).await;
    }

    /// Receive one request and answer it with `result`. Returns the request.
    pub async fn reply(&mut self, result: Value) -> Value {
        let request = self.recv().await;
        self.send(serde_json::json!({"jsonrpc": "2.0", "id": request["id"], "result": result}))
            .await;
        request
    }
}

pub(crate) fn connect(
    registry: ListenerRegistry,
    options: TransportOptions,
) -> (RpcTransport, FakeEngine) {
    let (client, engine) = tokio::io::duplex(64 * 1024);
    let (client_read, client_write) = tokio::io::split(client);
    let (engine_read, engine_write) = tokio::io::split(engine);
    let transport = RpcTransport::attach(client_read, client_write, registry, options);
    let engine = FakeEngine {
        reader: FrameReader::new(engine_read),
        writer: engine_write,
    };
    (transport, engine)
}
