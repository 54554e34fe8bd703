//! # Remote Command Server
//!
//! Newline-delimited JSON over TCP.
//!
//! Request (one line):
//!
//! ```json
//! {"command": "joystick_event", "params": {"name": "left", "position": {"x": 0.0, "y": 0.4}}}
//! ```
//!
//! Reply (one line):
//!
//! ```json
//! {"ok": true, "result": null}
//! {"ok": false, "error": "connection failed: timeout", "errors": ["timeout"]}
//! ```
//!
//! Requests on one connection are handled in order; each connection runs in
//! its own task.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::error::{DroneDropError, Result};
use crate::hub::params::Params;
use crate::hub::CommandHub;

/// One remote invocation.
#[derive(Debug, Deserialize)]
pub struct Request {
    pub command: String,
    #[serde(default)]
    pub params: Params,
}

/// Reply to one invocation.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl Reply {
    pub fn success(result: Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
            errors: Vec::new(),
        }
    }

    pub fn failure(err: &DroneDropError) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(err.to_string()),
            errors: err.connection_errors().to_vec(),
        }
    }
}

/// Parse and run one request line.
pub async fn handle_line(hub: &CommandHub, line: &str) -> Reply {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            let err = DroneDropError::BadRequest(format!("invalid request: {}", e));
            return Reply::failure(&err);
        }
    };

    match hub.invoke(&request.command, &request.params).await {
        Ok(result) => Reply::success(result),
        Err(e) => {
            debug!("Command {} failed: {}", request.command, e);
            Reply::failure(&e)
        }
    }
}

/// Longest request line accepted, newline excluded.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Pause after a failed accept before trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Serve one connection until the peer closes it.
///
/// A line longer than [`MAX_LINE_BYTES`] gets an error reply and closes
/// the connection.
pub async fn serve_connection<S>(hub: Arc<CommandHub>, stream: S) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = (&mut reader)
            .take(MAX_LINE_BYTES as u64 + 1)
            .read_until(b'\n', &mut buf)
            .await?;
        if read == 0 {
            return Ok(());
        }

        if buf.len() > MAX_LINE_BYTES && buf.last() != Some(&b'\n') {
            let err = DroneDropError::BadRequest(format!(
                "request line exceeds {} bytes",
                MAX_LINE_BYTES
            ));
            write_reply(&mut writer, &Reply::failure(&err)).await?;
            return Err(err);
        }

        let line = String::from_utf8_lossy(&buf);
        if line.trim().is_empty() {
            continue;
        }
        let reply = handle_line(&hub, &line).await;
        write_reply(&mut writer, &reply).await?;
    }
}

async fn write_reply<W: AsyncWrite + Unpin>(writer: &mut W, reply: &Reply) -> Result<()> {
    let mut out = serde_json::to_vec(reply)?;
    out.push(b'\n');
    writer.write_all(&out).await?;
    writer.flush().await?;
    Ok(())
}

/// Source of incoming connections.
#[async_trait]
pub trait Acceptor: Send {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    async fn accept(&mut self) -> io::Result<(Self::Stream, SocketAddr)>;
}

#[async_trait]
impl Acceptor for TcpListener {
    type Stream = TcpStream;

    async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }
}

/// Accept connections on `listener` forever.
pub async fn serve(listener: TcpListener, hub: Arc<CommandHub>) -> Result<()> {
    info!("Command server listening on {}", listener.local_addr()?);
    serve_from(listener, hub).await;
    Ok(())
}

/// Accept loop over any [`Acceptor`]. Accept failures are logged and retried.
pub async fn serve_from<A: Acceptor>(mut acceptor: A, hub: Arc<CommandHub>) {
    loop {
        let (stream, peer) = match acceptor.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Failed to accept connection: {}", e);
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                continue;
            }
        };
        debug!("Remote connected: {}", peer);

        let hub = hub.clone();
        tokio::spawn(async move {
            if let Err(e) = serve_connection(hub, stream).await {
                warn!("Connection {} closed with error: {}", peer, e);
            } else {
                debug!("Remote disconnected: {}", peer);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::{ActuatorController, MockActuator};
    use crate::control::stick::{stick_state, Stick, StickPosition};
    use crate::flight::{FlightGate, RetryPolicy};
    use crate::platform::mocks::RecordingPlatform;
    use crate::store::{ConfigStore, PersistedConfig};
    use serde_json::json;
    use tempfile::TempDir;
    use tokio::io::DuplexStream;
    use tokio::sync::mpsc;

    fn hub(dir: &TempDir, platform: RecordingPlatform) -> Arc<CommandHub> {
        let store = Arc::new(ConfigStore::new(
            dir.path().join("state.json"),
            PersistedConfig {
                commander: true,
                grab: 40,
                drop: 153,
                load: 50,
            },
        ));
        let (writer, _readers) = stick_state();
        Arc::new(CommandHub::new(
            writer,
            ActuatorController::new(Arc::new(MockActuator::new()), store.clone()),
            FlightGate::new(Arc::new(platform), store, RetryPolicy::default()),
        ))
    }

    #[tokio::test]
    async fn test_success_reply() {
        let dir = TempDir::new().unwrap();
        let hub = hub(&dir, RecordingPlatform::new());

        let reply = handle_line(&hub, r#"{"command": "version"}"#).await;
        assert_eq!(reply, Reply::success(json!(env!("CARGO_PKG_VERSION"))));
    }

    #[tokio::test]
    async fn test_invalid_json_is_error_reply() {
        let dir = TempDir::new().unwrap();
        let hub = hub(&dir, RecordingPlatform::new());

        let reply = handle_line(&hub, "{not json").await;
        assert!(!reply.ok);
        assert!(reply.error.unwrap().starts_with("bad request"));
    }

    #[tokio::test]
    async fn test_connection_errors_are_listed() {
        let dir = TempDir::new().unwrap();
        let platform = RecordingPlatform::new();
        platform.fail_connect(vec!["unreachable".into()]);
        let hub = hub(&dir, platform);

        let reply = handle_line(
            &hub,
            r#"{"command": "button_event", "params": {"name": "A", "action": "press"}}"#,
        )
        .await;
        assert!(!reply.ok);
        assert_eq!(reply.errors, vec!["unreachable".to_string()]);
    }

    #[test]
    fn test_success_reply_serialization() {
        let text = serde_json::to_string(&Reply::success(Value::Null)).unwrap();
        assert_eq!(text, r#"{"ok":true,"result":null}"#);
    }

    #[tokio::test]
    async fn test_serve_connection_handles_requests_in_order() {
        let dir = TempDir::new().unwrap();
        let hub = hub(&dir, RecordingPlatform::new());
        let (client, server) = tokio::io::duplex(4096);

        let task = tokio::spawn(serve_connection(hub.clone(), server));

        let (mut rx, mut tx) = tokio::io::split(client);
        let joystick = json!({
            "command": "joystick_event",
            "params": {"name": "right", "position": {"x": 0.4, "y": -0.2}}
        });
        tx.write_all(format!("{}\n\n{{\"command\":\"nope\"}}\n", joystick).as_bytes())
            .await
            .unwrap();
        tx.shutdown().await.unwrap();
        drop(tx);

        let mut output = String::new();
        rx.read_to_string(&mut output).await.unwrap();
        task.await.unwrap().unwrap();

        let replies: Vec<Reply> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(replies.len(), 2);
        assert!(replies[0].ok);
        assert!(!replies[1].ok);
        assert_eq!(hub.sticks().get(Stick::Rotation), StickPosition::new(0.4, -0.2));
    }

    #[tokio::test]
    async fn test_oversized_line_is_rejected() {
        let dir = TempDir::new().unwrap();
        let hub = hub(&dir, RecordingPlatform::new());
        let (client, server) = tokio::io::duplex(4 * MAX_LINE_BYTES);

        let task = tokio::spawn(serve_connection(hub, server));

        let (mut rx, mut tx) = tokio::io::split(client);
        tx.write_all(&vec![b'a'; MAX_LINE_BYTES + 10]).await.unwrap();

        let mut output = String::new();
        rx.read_to_string(&mut output).await.unwrap();
        let reply: Reply = serde_json::from_str(output.trim()).unwrap();
        assert!(!reply.ok);
        assert!(reply.error.unwrap().contains("exceeds"));
        assert!(matches!(task.await.unwrap(), Err(DroneDropError::BadRequest(_))));
    }

    /// Hands out queued accept results, then waits forever.
    struct QueuedAcceptor {
        queue: mpsc::UnboundedReceiver<io::Result<DuplexStream>>,
    }

    #[async_trait]
    impl Acceptor for QueuedAcceptor {
        type Stream = DuplexStream;

        async fn accept(&mut self) -> io::Result<(DuplexStream, SocketAddr)> {
            match self.queue.recv().await {
                Some(next) => next.map(|stream| (stream, "127.0.0.1:9".parse().unwrap())),
                None => std::future::pending().await,
            }
        }
    }

    #[tokio::test]
    async fn test_accept_failure_does_not_stop_server() {
        let dir = TempDir::new().unwrap();
        let hub = hub(&dir, RecordingPlatform::new());
        let (queue_tx, queue) = mpsc::unbounded_channel();
        let server = tokio::spawn(serve_from(QueuedAcceptor { queue }, hub));

        queue_tx
            .send(Err(io::Error::new(io::ErrorKind::Other, "too many open files")))
            .unwrap();
        let (client, stream) = tokio::io::duplex(4096);
        queue_tx.send(Ok(stream)).unwrap();

        let (rx, mut tx) = tokio::io::split(client);
        tx.write_all(b"{\"command\":\"version\"}\n").await.unwrap();
        let mut lines = BufReader::new(rx).lines();
        let line = lines.next_line().await.unwrap().unwrap();

        let reply: Reply = serde_json::from_str(&line).unwrap();
        assert_eq!(reply, Reply::success(json!(env!("CARGO_PKG_VERSION"))));
        assert!(!server.is_finished());
        server.abort();
    }
}
