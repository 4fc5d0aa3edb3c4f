//! CollabPaint Core Library
//!
//! Client for a collaborative drawing channel: one STOMP-over-WebSocket
//! session scoped by a drawing id, publishing locally drawn points to
//! `/app/newpoint.<id>` and rendering points broadcast on
//! `/topic/newpoint.<id>`.

pub mod client;
pub mod point;
pub mod render;
pub mod stomp;
pub mod topic;
pub mod transport;

pub use client::{
    ClientConfig, ClientError, ClientEvent, ConnectionStatus, DrawingClient, LogStatus, StatusSink,
};
pub use point::{CanvasBounds, Point, validate_point};
pub use render::{CanvasSurface, POINT_RADIUS, RecordingCanvas, Rgb, draw_point};
pub use topic::DrawingId;
pub use transport::{
    InboundMessage, Session, StompSession, StompTransport, Transport, TransportError,
};
