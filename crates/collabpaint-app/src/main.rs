//! Terminal demo client for CollabPaint.
//!
//! A line-oriented stand-in for a drawing page: stdin commands take the
//! place of connect/disconnect/send buttons, and draws are printed instead
//! of painted. Run against a STOMP broker, e.g.:
//!
//! ```text
//! collabpaint ws://localhost:8080/stompendpoint room1
//! ```

use std::env;
use std::process::ExitCode;

use tokio::io::{AsyncBufReadExt, BufReader};

use collabpaint_core::{
    CanvasSurface, ClientConfig, ClientEvent, ConnectionStatus, DrawingClient, Rgb, StatusSink,
    StompTransport,
};

/// Dimensions of the demo canvas.
const CANVAS_WIDTH: f64 = 640.0;
const CANVAS_HEIGHT: f64 = 480.0;

const DEFAULT_ENDPOINT: &str = "ws://localhost:8080/stompendpoint";

/// Canvas that prints draw calls instead of painting pixels.
struct TermCanvas;

impl CanvasSurface for TermCanvas {
    fn width(&self) -> f64 {
        CANVAS_WIDTH
    }

    fn height(&self) -> f64 {
        CANVAS_HEIGHT
    }

    fn fill_circle(&mut self, cx: f64, cy: f64, radius: f64, _fill: Rgb, _stroke: Rgb) {
        println!("* point at ({cx}, {cy}) r={radius}");
    }
}

/// Status sink that prints status changes and notices.
struct TermStatus;

impl StatusSink for TermStatus {
    fn status_changed(&mut self, status: ConnectionStatus) {
        println!("[status] {status}");
    }

    fn notice(&mut self, message: &str) {
        println!("[notice] {message}");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let mut args = env::args().skip(1);
    let endpoint = args.next().unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
    let initial_drawing = args.next();

    let transport = match StompTransport::new(&endpoint) {
        Ok(transport) => transport,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    log::info!("Starting CollabPaint against {endpoint}");

    let mut client =
        DrawingClient::new(transport, Some(TermCanvas), TermStatus, ClientConfig::default());

    if let Some(id) = initial_drawing {
        if let Err(e) = client.connect(&id).await {
            println!("[notice] {e}");
        }
    }

    println!("commands: connect <id> | send <x> <y> | disconnect | quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let connected = client.is_connected();
        tokio::select! {
            line = lines.next_line() => {
                let Ok(Some(line)) = line else { break };
                if !handle_command(&mut client, line.trim()).await {
                    break;
                }
            }
            event = client.next_event(), if connected => {
                match event {
                    Some(ClientEvent::MessageDropped) => println!("[notice] dropped a bad message"),
                    Some(ClientEvent::Reconnected) => println!("[notice] reconnected"),
                    Some(ClientEvent::ConnectionFailed) => println!("[notice] connection lost for good"),
                    // PointDrawn already went through the canvas.
                    Some(ClientEvent::PointDrawn(_)) | None => {}
                }
            }
        }
    }

    client.disconnect(true).await;
    ExitCode::SUCCESS
}

/// Dispatch one command line. Returns false when the session should end.
async fn handle_command(
    client: &mut DrawingClient<StompTransport, TermCanvas, TermStatus>,
    line: &str,
) -> bool {
    let mut parts = line.split_whitespace();
    match parts.next() {
        Some("connect") => match parts.next() {
            Some(id) => {
                if let Err(e) = client.connect(id).await {
                    println!("[notice] {e}");
                }
            }
            None => println!("[notice] enter a drawing id to connect"),
        },
        Some("send") => {
            let coords = parts
                .next()
                .zip(parts.next())
                .and_then(|(x, y)| Some((x.parse::<f64>().ok()?, y.parse::<f64>().ok()?)));
            match coords {
                Some((x, y)) => {
                    if let Err(e) = client.publish(x, y).await {
                        println!("[notice] {e}");
                    }
                }
                None => println!("[notice] usage: send <x> <y>"),
            }
        }
        Some("disconnect") => client.disconnect(false).await,
        Some("quit") | Some("exit") => return false,
        Some(other) => println!("[notice] unknown command: {other}"),
        None => {}
    }
    true
}
