//! Broker transport: the seam between the drawing client and the wire.
//!
//! [`Transport`] and [`Session`] abstract the STOMP broker connection so the
//! client logic can be driven by a scripted transport in tests. The real
//! implementation, [`StompTransport`], speaks STOMP 1.2 over a
//! tokio-tungstenite WebSocket.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use crate::stomp::{Command, Frame, FrameError};

/// How long to wait for the broker's CONNECTED reply.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
/// How long to wait for the DISCONNECT receipt before closing anyway.
const RECEIPT_TIMEOUT: Duration = Duration::from_secs(5);

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid endpoint URL: {0}")]
    Endpoint(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("handshake rejected: {0}")]
    Handshake(String),
    #[error("send failed: {0}")]
    Send(String),
    #[error("connection closed")]
    Closed,
    #[error("protocol error: {0}")]
    Frame(#[from] FrameError),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// A broker message delivered to a subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Topic the message was broadcast on.
    pub destination: String,
    /// Message body (JSON text).
    pub body: String,
}

/// Factory opening broker sessions.
#[allow(async_fn_in_trait)]
pub trait Transport {
    type Session: Session;

    /// Open a session: transport connection plus protocol handshake.
    async fn connect(&mut self) -> TransportResult<Self::Session>;
}

/// One live broker session.
#[allow(async_fn_in_trait)]
pub trait Session {
    /// Register a subscription on a broker topic.
    async fn subscribe(&mut self, topic: &str) -> TransportResult<()>;

    /// Send a body to an application destination.
    async fn send(&mut self, destination: &str, body: &str) -> TransportResult<()>;

    /// Next inbound message. `None` means the session is gone.
    async fn recv(&mut self) -> Option<InboundMessage>;

    /// Tear the session down, resolving only once teardown completes.
    async fn disconnect(self) -> TransportResult<()>;
}

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;
type ReceiptMap = Arc<Mutex<HashMap<String, oneshot::Sender<()>>>>;

/// STOMP-over-WebSocket transport.
pub struct StompTransport {
    endpoint: Url,
}

impl StompTransport {
    /// Create a transport for a `ws://` or `wss://` endpoint. The URL is
    /// validated here so a misconfigured endpoint fails before any retry
    /// loop gets involved.
    pub fn new(endpoint: &str) -> TransportResult<Self> {
        let endpoint =
            Url::parse(endpoint).map_err(|e| TransportError::Endpoint(e.to_string()))?;
        if endpoint.scheme() != "ws" && endpoint.scheme() != "wss" {
            return Err(TransportError::Endpoint(format!(
                "unsupported scheme: {}",
                endpoint.scheme()
            )));
        }
        Ok(Self { endpoint })
    }

    /// The `host` header value for the CONNECT frame.
    fn vhost(&self) -> String {
        self.endpoint.host_str().unwrap_or("localhost").to_string()
    }
}

impl Transport for StompTransport {
    type Session = StompSession;

    async fn connect(&mut self) -> TransportResult<StompSession> {
        let (ws, response) = connect_async(self.endpoint.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        log::debug!("websocket open, status {}", response.status());

        let (mut writer, mut reader) = ws.split();

        let connect = Frame::connect(&self.vhost());
        writer
            .send(Message::Text(connect.encode().into()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;

        tokio::time::timeout(HANDSHAKE_TIMEOUT, await_connected(&mut reader))
            .await
            .map_err(|_| TransportError::Handshake("timed out waiting for CONNECTED".into()))??;

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let receipts: ReceiptMap = Arc::new(Mutex::new(HashMap::new()));
        let reader_task = tokio::spawn(read_loop(reader, inbound_tx, receipts.clone()));

        log::info!("STOMP session established with {}", self.endpoint);
        Ok(StompSession {
            writer,
            inbound: inbound_rx,
            receipts,
            reader_task,
            next_id: 0,
        })
    }
}

/// Read frames until the broker accepts or rejects the handshake.
async fn await_connected(reader: &mut WsSource) -> TransportResult<()> {
    while let Some(msg) = reader.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if text.trim().is_empty() {
                    // Heart-beat EOL, not a frame.
                    continue;
                }
                let frame = Frame::parse(&text)?;
                return match frame.command {
                    Command::Connected => Ok(()),
                    Command::Error => Err(TransportError::Handshake(broker_error(&frame))),
                    other => Err(TransportError::Handshake(format!(
                        "unexpected {} frame during handshake",
                        other.as_str()
                    ))),
                };
            }
            Ok(Message::Close(_)) => return Err(TransportError::Closed),
            Ok(_) => {}
            Err(e) => return Err(TransportError::Connect(e.to_string())),
        }
    }
    Err(TransportError::Closed)
}

/// Pump broker frames: MESSAGE frames to the session's inbound channel,
/// RECEIPT frames to their registered waiters. Ends when the socket does.
async fn read_loop(
    mut reader: WsSource,
    inbound: mpsc::UnboundedSender<InboundMessage>,
    receipts: ReceiptMap,
) {
    while let Some(msg) = reader.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if text.trim().is_empty() {
                    continue;
                }
                let frame = match Frame::parse(&text) {
                    Ok(frame) => frame,
                    Err(e) => {
                        log::warn!("dropping unparseable frame: {e}");
                        continue;
                    }
                };
                match frame.command {
                    Command::Message => {
                        let destination =
                            frame.header_value("destination").unwrap_or("").to_string();
                        let delivered = inbound.send(InboundMessage {
                            destination,
                            body: frame.body,
                        });
                        if delivered.is_err() {
                            // Session handle dropped, nobody left to deliver to.
                            break;
                        }
                    }
                    Command::Receipt => {
                        if let Some(id) = frame.header_value("receipt-id") {
                            let waiter = receipts.lock().expect("receipt map poisoned").remove(id);
                            match waiter {
                                Some(tx) => {
                                    let _ = tx.send(());
                                }
                                None => log::warn!("unexpected receipt: {id}"),
                            }
                        }
                    }
                    Command::Error => {
                        log::warn!("broker error: {}", broker_error(&frame));
                    }
                    other => {
                        log::debug!("ignoring {} frame", other.as_str());
                    }
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                log::warn!("websocket read error: {e}");
                break;
            }
        }
    }
    log::debug!("broker read loop ended");
}

/// Human-readable description of a broker ERROR frame.
fn broker_error(frame: &Frame) -> String {
    frame
        .header_value("message")
        .map(str::to_string)
        .unwrap_or_else(|| frame.body.clone())
}

/// A live STOMP session over a WebSocket.
#[derive(Debug)]
pub struct StompSession {
    writer: WsSink,
    inbound: mpsc::UnboundedReceiver<InboundMessage>,
    receipts: ReceiptMap,
    reader_task: JoinHandle<()>,
    next_id: u32,
}

impl StompSession {
    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    async fn send_frame(&mut self, frame: &Frame) -> TransportResult<()> {
        self.writer
            .send(Message::Text(frame.encode().into()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}

impl Session for StompSession {
    async fn subscribe(&mut self, topic: &str) -> TransportResult<()> {
        let id = format!("sub-{}", self.next_id());
        let frame = Frame::subscribe(&id, topic);
        self.send_frame(&frame).await?;
        log::info!("subscribed to {topic} (id {id})");
        Ok(())
    }

    async fn send(&mut self, destination: &str, body: &str) -> TransportResult<()> {
        let frame = Frame::send(destination, body);
        self.send_frame(&frame).await?;
        log::debug!("sent {} bytes to {destination}", body.len());
        Ok(())
    }

    async fn recv(&mut self) -> Option<InboundMessage> {
        self.inbound.recv().await
    }

    async fn disconnect(mut self) -> TransportResult<()> {
        let receipt_id = format!("rcpt-{}", self.next_id());
        let (tx, rx) = oneshot::channel();
        self.receipts
            .lock()
            .expect("receipt map poisoned")
            .insert(receipt_id.clone(), tx);

        let frame = Frame::disconnect(&receipt_id);
        match self.send_frame(&frame).await {
            Ok(()) => match tokio::time::timeout(RECEIPT_TIMEOUT, rx).await {
                Ok(Ok(())) => log::debug!("disconnect receipt {receipt_id} confirmed"),
                _ => log::warn!("no disconnect receipt, closing anyway"),
            },
            Err(e) => log::warn!("disconnect frame not sent: {e}"),
        }

        let _ = self.writer.send(Message::Close(None)).await;
        self.reader_task.abort();
        log::info!("STOMP session closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    #[test]
    fn test_endpoint_scheme_validated() {
        assert!(StompTransport::new("ws://localhost:8080/stompendpoint").is_ok());
        assert!(StompTransport::new("wss://example.com/stompendpoint").is_ok());
        assert!(matches!(
            StompTransport::new("http://example.com/ws"),
            Err(TransportError::Endpoint(_))
        ));
        assert!(matches!(
            StompTransport::new("not a url"),
            Err(TransportError::Endpoint(_))
        ));
    }

    /// Next STOMP frame off a broker-side socket, skipping heart-beats.
    async fn recv_frame(ws: &mut WebSocketStream<TcpStream>) -> Frame {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    if text.trim().is_empty() {
                        continue;
                    }
                    return Frame::parse(&text).unwrap();
                }
                Some(Ok(Message::Close(_))) | None => panic!("broker: socket closed early"),
                Some(Ok(_)) => continue,
                Some(Err(e)) => panic!("broker: read error: {e}"),
            }
        }
    }

    async fn send_frame(ws: &mut WebSocketStream<TcpStream>, frame: Frame) {
        ws.send(Message::Text(frame.encode().into())).await.unwrap();
    }

    #[tokio::test]
    async fn test_session_against_scripted_broker() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let broker = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();

            let connect = recv_frame(&mut ws).await;
            assert_eq!(connect.command, Command::Connect);
            assert_eq!(connect.header_value("accept-version"), Some("1.2"));
            send_frame(&mut ws, Frame::new(Command::Connected).header("version", "1.2")).await;

            let subscribe = recv_frame(&mut ws).await;
            assert_eq!(subscribe.command, Command::Subscribe);
            assert_eq!(
                subscribe.header_value("destination"),
                Some("/topic/newpoint.room1")
            );
            let sub_id = subscribe.header_value("id").unwrap().to_string();

            let send = recv_frame(&mut ws).await;
            assert_eq!(send.command, Command::Send);
            assert_eq!(send.header_value("destination"), Some("/app/newpoint.room1"));

            // Fan the point back out the way the broker would.
            let message = Frame::new(Command::Message)
                .header("destination", "/topic/newpoint.room1")
                .header("subscription", &sub_id)
                .with_body(&send.body);
            send_frame(&mut ws, message).await;

            let disconnect = recv_frame(&mut ws).await;
            assert_eq!(disconnect.command, Command::Disconnect);
            let receipt_id = disconnect.header_value("receipt").unwrap().to_string();
            send_frame(
                &mut ws,
                Frame::new(Command::Receipt).header("receipt-id", &receipt_id),
            )
            .await;
        });

        let mut transport = StompTransport::new(&format!("ws://{addr}")).unwrap();
        let mut session = transport.connect().await.unwrap();
        session.subscribe("/topic/newpoint.room1").await.unwrap();
        session
            .send("/app/newpoint.room1", r#"{"x":5.0,"y":5.0}"#)
            .await
            .unwrap();

        let msg = session.recv().await.unwrap();
        assert_eq!(msg.destination, "/topic/newpoint.room1");
        assert_eq!(msg.body, r#"{"x":5.0,"y":5.0}"#);

        session.disconnect().await.unwrap();
        broker.await.unwrap();
    }

    #[tokio::test]
    async fn test_handshake_error_frame_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let broker = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let _ = recv_frame(&mut ws).await;
            send_frame(
                &mut ws,
                Frame::new(Command::Error).header("message", "vhost unknown"),
            )
            .await;
        });

        let mut transport = StompTransport::new(&format!("ws://{addr}")).unwrap();
        let err = transport.connect().await.unwrap_err();
        assert!(matches!(err, TransportError::Handshake(_)));
        broker.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port nothing is listening on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut transport = StompTransport::new(&format!("ws://{addr}")).unwrap();
        assert!(matches!(
            transport.connect().await.unwrap_err(),
            TransportError::Connect(_)
        ));
    }
}
