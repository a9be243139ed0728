//! Test doubles: a scripted DAP adapter over in-memory pipes and a
//! recording console.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{self, BufReader, DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::mpsc;

use probe_core::{ConsoleIo, SessionFactory};
use probe_dap::session::Session;
use probe_dap::transport;

/// The adapter end of an in-memory DAP session.
///
/// Tests receive the engine's requests one at a time, assert on them, and
/// script the responses and events an adapter would produce.
pub struct FakeAdapter {
    reader: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
    next_seq: i64,
}

impl FakeAdapter {
    /// A connected session/adapter pair.
    pub fn pair() -> (Session, FakeAdapter) {
        let (client, server) = io::duplex(64 * 1024);
        let (client_read, client_write) = io::split(client);
        let session = Session::connect(client_read, client_write);
        let (server_read, server_write) = io::split(server);
        (
            session,
            FakeAdapter {
                reader: BufReader::new(server_read),
                writer: server_write,
                next_seq: 1000,
            },
        )
    }

    /// Receive the next request from the engine. Panics after two seconds,
    /// on transport errors, and on non-request messages.
    pub async fn recv_request(&mut self) -> serde_json::Value {
        let message = tokio::time::timeout(
            Duration::from_secs(2),
            transport::read_message(&mut self.reader),
        )
        .await
        .expect("timed out waiting for a request")
        .expect("transport error reading request")
        .expect("session closed the stream");
        assert_eq!(message["type"], "request", "expected a request: {message}");
        message
    }

    /// Receive the next request and assert its command name.
    pub async fn expect_request(&mut self, command: &str) -> serde_json::Value {
        let request = self.recv_request().await;
        assert_eq!(request["command"], command, "unexpected request: {request}");
        request
    }

    /// Send a success response for `request`.
    pub async fn respond(&mut self, request: &serde_json::Value, body: serde_json::Value) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let response = serde_json::json!({
            "seq": seq,
            "type": "response",
            "request_seq": request["seq"],
            "success": true,
            "command": request["command"],
            "body": body,
        });
        transport::write_message(&mut self.writer, &response)
            .await
            .expect("failed to write response");
    }

    /// Send a failure response for `request`.
    pub async fn respond_error(&mut self, request: &serde_json::Value, message: &str) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let response = serde_json::json!({
            "seq": seq,
            "type": "response",
            "request_seq": request["seq"],
            "success": false,
            "command": request["command"],
            "message": message,
        });
        transport::write_message(&mut self.writer, &response)
            .await
            .expect("failed to write response");
    }

    /// Emit an adapter event.
    pub async fn send_event(&mut self, event: &str, body: serde_json::Value) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let message = serde_json::json!({
            "seq": seq,
            "type": "event",
            "event": event,
            "body": body,
        });
        transport::write_message(&mut self.writer, &message)
            .await
            .expect("failed to write event");
    }
}

/// A session factory whose adapters surface on a channel, one per
/// launch/relaunch.
pub fn fake_factory() -> (SessionFactory, mpsc::UnboundedReceiver<FakeAdapter>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let factory: SessionFactory = Box::new(move || {
        let tx = tx.clone();
        Box::pin(async move {
            let (session, adapter) = FakeAdapter::pair();
            let _ = tx.send(adapter);
            Ok::<Session, probe_dap::DapError>(session)
        })
    });
    (factory, rx)
}

/// Console that records every call for assertions.
#[derive(Default)]
pub struct RecordingConsole {
    calls: Mutex<Vec<String>>,
}

impl RecordingConsole {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// All calls so far, in order: `output:…`, `line:…`, `start`, `stop`,
    /// `close`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// The most recent input-gate call, if any.
    pub fn last_gate_call(&self) -> Option<String> {
        self.calls()
            .into_iter()
            .rev()
            .find(|c| c == "start" || c == "stop")
    }

    pub fn has_line_containing(&self, needle: &str) -> bool {
        self.calls()
            .iter()
            .any(|c| c.starts_with("line:") && c.contains(needle))
    }
}

impl ConsoleIo for RecordingConsole {
    fn output(&self, text: &str) {
        self.calls.lock().unwrap().push(format!("output:{text}"));
    }
    fn output_line(&self, text: &str) {
        self.calls.lock().unwrap().push(format!("line:{text}"));
    }
    fn start_input(&self) {
        self.calls.lock().unwrap().push("start".into());
    }
    fn stop_input(&self) {
        self.calls.lock().unwrap().push("stop".into());
    }
    fn close(&self) {
        self.calls.lock().unwrap().push("close".into());
    }
}
