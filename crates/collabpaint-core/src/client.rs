//! The drawing client: one logical broker session scoped by a drawing id.
//!
//! Wraps a [`Transport`] session, the subscription for the current drawing,
//! and the canvas draw call. Local input goes out as point messages; inbound
//! messages come back as canvas draws; connection state is reflected to the
//! host through a [`StatusSink`].

use std::time::Duration;

use thiserror::Error;

use crate::point::{Point, validate_point};
use crate::render::{CanvasSurface, draw_point};
use crate::topic::DrawingId;
use crate::transport::{InboundMessage, Session, Transport, TransportError};

/// Bound on consecutive connection failures before giving up.
const MAX_RETRIES: u32 = 5;
/// Delay between reconnection attempts.
const RETRY_DELAY: Duration = Duration::from_secs(3);

/// Drawing client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("drawing id must not be empty")]
    EmptyDrawingId,
    #[error("not connected to a drawing")]
    NotConnected,
    #[error("point ({x}, {y}) is not inside the canvas")]
    InvalidPoint { x: f64, y: f64 },
    #[error("connection failed after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
    #[error("point encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Maximum consecutive connection failures before a terminal notice.
    pub max_retries: u32,
    /// Delay before each reconnection attempt.
    pub retry_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            retry_delay: RETRY_DELAY,
        }
    }
}

/// Connection state reflected to the host UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    /// Terminal state after the retry budget is exhausted.
    Failed,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Receives connection status changes and user-facing notices.
pub trait StatusSink {
    /// The connection moved to a new state.
    fn status_changed(&mut self, status: ConnectionStatus);

    /// A user-visible message, e.g. a terminal failure notice.
    fn notice(&mut self, message: &str);
}

/// Status sink that only logs. Useful for headless hosts.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatus;

impl StatusSink for LogStatus {
    fn status_changed(&mut self, status: ConnectionStatus) {
        log::info!("connection status: {status}");
    }

    fn notice(&mut self, message: &str) {
        log::warn!("{message}");
    }
}

/// What happened while processing broker traffic.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// An inbound point was validated and drawn.
    PointDrawn(Point),
    /// An inbound message was malformed or out of bounds and was dropped.
    MessageDropped,
    /// The connection dropped and was re-established for the same drawing.
    Reconnected,
    /// The connection dropped and the retry budget ran out.
    ConnectionFailed,
}

/// A client for one collaborative drawing session.
///
/// At most one session is live at a time: connecting to a different drawing
/// first awaits full teardown of the previous session, so two sessions can
/// never overlap.
pub struct DrawingClient<T: Transport, C: CanvasSurface, S: StatusSink> {
    transport: T,
    /// Drawing surface. `None` means there is nothing to draw on and point
    /// validation fails closed.
    canvas: Option<C>,
    status: S,
    config: ClientConfig,
    session: Option<T::Session>,
    drawing_id: Option<DrawingId>,
    subscribed_topic: Option<String>,
    retry_count: u32,
}

impl<T: Transport, C: CanvasSurface, S: StatusSink> DrawingClient<T, C, S> {
    /// Create a disconnected client.
    pub fn new(transport: T, canvas: Option<C>, status: S, config: ClientConfig) -> Self {
        Self {
            transport,
            canvas,
            status,
            config,
            session: None,
            drawing_id: None,
            subscribed_topic: None,
            retry_count: 0,
        }
    }

    /// True while a session is live.
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Drawing id of the current session, if any.
    pub fn drawing_id(&self) -> Option<&DrawingId> {
        self.drawing_id.as_ref()
    }

    /// Consecutive failures since the last successful handshake.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// The canvas, if one is attached.
    pub fn canvas(&self) -> Option<&C> {
        self.canvas.as_ref()
    }

    /// Connect to a drawing.
    ///
    /// Connecting to the drawing already connected to is a no-op. Connecting
    /// to a different drawing tears the current session down first and only
    /// then opens the new one. Failures are retried on a fixed delay up to
    /// the configured budget; retries run inside this future, so an explicit
    /// `disconnect` can never interleave with a pending retry.
    pub async fn connect(&mut self, drawing_id: &str) -> Result<(), ClientError> {
        let id = DrawingId::new(drawing_id).ok_or(ClientError::EmptyDrawingId)?;

        if self.session.is_some() {
            if self.drawing_id.as_ref() == Some(&id) {
                log::debug!("already connected to drawing {id}");
                return Ok(());
            }
            self.disconnect(true).await;
        }

        // A user-initiated connect starts with a fresh retry budget.
        self.retry_count = 0;
        self.connect_with_retry(id).await
    }

    /// Publish a point to the current drawing.
    ///
    /// Requires a live session and a point within the canvas bounds; on any
    /// failed precondition nothing is sent. On success the point is also
    /// rendered locally right away, without waiting for the broker to echo
    /// it back.
    pub async fn publish(&mut self, x: f64, y: f64) -> Result<Point, ClientError> {
        let id = self.drawing_id.clone().ok_or(ClientError::NotConnected)?;
        if self.session.is_none() {
            return Err(ClientError::NotConnected);
        }

        let point = Point::new(x, y);
        let bounds = self.canvas.as_ref().map(|c| c.bounds());
        if !validate_point(&point, bounds.as_ref()) {
            return Err(ClientError::InvalidPoint { x, y });
        }

        let body = serde_json::to_string(&point)?;
        let session = self.session.as_mut().ok_or(ClientError::NotConnected)?;
        session.send(&id.destination(), &body).await?;

        if let Some(canvas) = self.canvas.as_mut() {
            draw_point(canvas, &point);
        }
        log::debug!("published point ({x}, {y}) to drawing {id}");
        Ok(point)
    }

    /// Tear the current session down and clear connection state.
    ///
    /// Completes immediately when there is no session. The future resolves
    /// only after transport-level teardown has completed, so a caller can
    /// sequence a reconnect strictly after it. When `silent`, the status
    /// sink is left untouched (used while switching drawings).
    pub async fn disconnect(&mut self, silent: bool) {
        let Some(session) = self.session.take() else {
            if !silent {
                log::warn!("disconnect requested but there is no active connection");
            }
            return;
        };

        if let Err(e) = session.disconnect().await {
            log::warn!("session teardown reported: {e}");
        }
        self.drawing_id = None;
        self.subscribed_topic = None;

        if !silent {
            self.status.status_changed(ConnectionStatus::Disconnected);
            log::info!("disconnected");
        }
    }

    /// Wait for the next inbound message and process it.
    ///
    /// Valid points are drawn and surfaced; malformed or out-of-bounds
    /// messages are logged and dropped without interrupting the session.
    /// If the transport drops, the retry policy runs for the current
    /// drawing id. Returns `None` when there is no session to listen on.
    pub async fn next_event(&mut self) -> Option<ClientEvent> {
        let session = self.session.as_mut()?;
        match session.recv().await {
            Some(msg) => Some(self.handle_message(msg)),
            None => Some(self.handle_connection_lost().await),
        }
    }

    // --- Internals ---

    async fn connect_with_retry(&mut self, id: DrawingId) -> Result<(), ClientError> {
        loop {
            self.status.status_changed(ConnectionStatus::Connecting);
            match self.try_connect(&id).await {
                Ok(()) => {
                    self.retry_count = 0;
                    self.status.status_changed(ConnectionStatus::Connected);
                    log::info!("connected to drawing {id}");
                    return Ok(());
                }
                Err(e) => {
                    log::warn!("connection attempt for drawing {id} failed: {e}");
                    self.note_failure().await?;
                }
            }
        }
    }

    /// One handshake-and-subscribe attempt.
    async fn try_connect(&mut self, id: &DrawingId) -> Result<(), TransportError> {
        let session = self.transport.connect().await?;
        self.session = Some(session);
        self.drawing_id = Some(id.clone());
        match self.subscribe(&id.topic()).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.clear_session();
                Err(e)
            }
        }
    }

    /// Register the drawing's subscription. Registering the topic the live
    /// session is already subscribed to is a no-op.
    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        if self.subscribed_topic.as_deref() == Some(topic) {
            log::debug!("already subscribed to {topic}");
            return Ok(());
        }
        let session = self.session.as_mut().ok_or(TransportError::Closed)?;
        session.subscribe(topic).await?;
        self.subscribed_topic = Some(topic.to_string());
        Ok(())
    }

    /// Record a connection failure, mark disconnected, and either wait for
    /// the next attempt or surface the terminal failure.
    async fn note_failure(&mut self) -> Result<(), ClientError> {
        self.retry_count += 1;
        self.status.status_changed(ConnectionStatus::Disconnected);

        if self.retry_count >= self.config.max_retries {
            let attempts = self.retry_count;
            self.status.status_changed(ConnectionStatus::Failed);
            self.status
                .notice("could not reach the drawing server; giving up");
            return Err(ClientError::RetriesExhausted { attempts });
        }

        log::info!(
            "retrying in {:?} (failure {}/{})",
            self.config.retry_delay,
            self.retry_count,
            self.config.max_retries
        );
        tokio::time::sleep(self.config.retry_delay).await;
        Ok(())
    }

    fn handle_message(&mut self, msg: InboundMessage) -> ClientEvent {
        let point: Point = match serde_json::from_str(&msg.body) {
            Ok(point) => point,
            Err(e) => {
                log::warn!("dropping malformed message from {}: {e}", msg.destination);
                return ClientEvent::MessageDropped;
            }
        };

        let bounds = self.canvas.as_ref().map(|c| c.bounds());
        if !validate_point(&point, bounds.as_ref()) {
            log::warn!(
                "dropping out-of-bounds point ({}, {}) from {}",
                point.x,
                point.y,
                msg.destination
            );
            return ClientEvent::MessageDropped;
        }

        if let Some(canvas) = self.canvas.as_mut() {
            draw_point(canvas, &point);
        }
        ClientEvent::PointDrawn(point)
    }

    async fn handle_connection_lost(&mut self) -> ClientEvent {
        log::warn!("connection to broker lost");
        let id = self.drawing_id.clone();
        self.clear_session();

        let Some(id) = id else {
            return ClientEvent::ConnectionFailed;
        };
        if self.note_failure().await.is_err() {
            return ClientEvent::ConnectionFailed;
        }
        match self.connect_with_retry(id).await {
            Ok(()) => ClientEvent::Reconnected,
            Err(_) => ClientEvent::ConnectionFailed,
        }
    }

    fn clear_session(&mut self) {
        self.session = None;
        self.drawing_id = None;
        self.subscribed_topic = None;
    }
}
