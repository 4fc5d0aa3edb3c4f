//! Minimal STOMP 1.2 client-side frame codec.
//!
//! Covers exactly the frames the drawing client exchanges with the broker:
//! CONNECT/CONNECTED for the handshake, SUBSCRIBE/UNSUBSCRIBE for topics,
//! SEND for outbound points, MESSAGE for inbound broadcasts, DISCONNECT and
//! RECEIPT for acknowledged teardown, and ERROR from the broker.

use thiserror::Error;

/// Frame codec errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("malformed header line: {0}")]
    MalformedHeader(String),
    #[error("invalid header escape sequence: \\{0}")]
    BadEscape(String),
}

/// STOMP frame commands used by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Disconnect,
    Message,
    Receipt,
    Error,
}

impl Command {
    /// Wire name of the command.
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Connected => "CONNECTED",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Disconnect => "DISCONNECT",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
        }
    }

    fn from_str(s: &str) -> Result<Self, FrameError> {
        match s {
            "CONNECT" => Ok(Command::Connect),
            "CONNECTED" => Ok(Command::Connected),
            "SEND" => Ok(Command::Send),
            "SUBSCRIBE" => Ok(Command::Subscribe),
            "UNSUBSCRIBE" => Ok(Command::Unsubscribe),
            "DISCONNECT" => Ok(Command::Disconnect),
            "MESSAGE" => Ok(Command::Message),
            "RECEIPT" => Ok(Command::Receipt),
            "ERROR" => Ok(Command::Error),
            other => Err(FrameError::UnknownCommand(other.to_string())),
        }
    }

    /// CONNECT and CONNECTED frames are exchanged before escaping is
    /// negotiated, so their headers travel unescaped.
    fn escapes_headers(&self) -> bool {
        !matches!(self, Command::Connect | Command::Connected)
    }
}

/// A single STOMP frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    /// Create an empty frame for the given command.
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Append a header (builder style).
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Set the frame body (builder style).
    pub fn with_body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    /// First value of the named header, if present.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    // --- Client frame builders ---

    /// CONNECT handshake frame. Heart-beating is disabled; the client
    /// relies on transport-level liveness.
    pub fn connect(host: &str) -> Self {
        Frame::new(Command::Connect)
            .header("accept-version", "1.2")
            .header("host", host)
            .header("heart-beat", "0,0")
    }

    /// SUBSCRIBE to a broker topic under the given subscription id.
    pub fn subscribe(id: &str, topic: &str) -> Self {
        Frame::new(Command::Subscribe)
            .header("id", id)
            .header("destination", topic)
            .header("ack", "auto")
    }

    /// UNSUBSCRIBE a previously registered subscription.
    pub fn unsubscribe(id: &str) -> Self {
        Frame::new(Command::Unsubscribe).header("id", id)
    }

    /// SEND a JSON body to an application destination.
    pub fn send(destination: &str, body: &str) -> Self {
        Frame::new(Command::Send)
            .header("destination", destination)
            .header("content-type", "application/json")
            .header("content-length", &body.len().to_string())
            .with_body(body)
    }

    /// DISCONNECT with a receipt request so teardown can be awaited.
    pub fn disconnect(receipt: &str) -> Self {
        Frame::new(Command::Disconnect).header("receipt", receipt)
    }

    // --- Wire codec ---

    /// Encode the frame to its wire representation.
    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(self.body.len() + 64);
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Parse a frame from its wire representation.
    pub fn parse(input: &str) -> Result<Self, FrameError> {
        // NUL terminator plus any trailing EOLs from heart-beat padding.
        let input = input.trim_end_matches(['\0', '\n', '\r']);
        if input.is_empty() {
            return Err(FrameError::Empty);
        }

        let (head, body) = match input.split_once("\n\n") {
            Some((head, body)) => (head, body),
            None => match input.split_once("\r\n\r\n") {
                Some((head, body)) => (head, body),
                None => (input, ""),
            },
        };

        let mut lines = head.lines().map(|line| line.trim_end_matches('\r'));
        let command = Command::from_str(lines.next().ok_or(FrameError::Empty)?)?;
        let escape = command.escapes_headers();

        let mut headers = Vec::new();
        for line in lines {
            if line.is_empty() {
                continue;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| FrameError::MalformedHeader(line.to_string()))?;
            if escape {
                headers.push((unescape_header(name)?, unescape_header(value)?));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        Ok(Self {
            command,
            headers,
            body: body.to_string(),
        })
    }
}

/// Escape header octets per STOMP 1.2.
fn escape_header(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

/// Reverse of [`escape_header`]. Undefined escape sequences are errors.
fn unescape_header(s: &str) -> Result<String, FrameError> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('c') => out.push(':'),
            Some(other) => return Err(FrameError::BadEscape(other.to_string())),
            None => return Err(FrameError::BadEscape(String::new())),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_connect() {
        let wire = Frame::connect("localhost").encode();
        assert_eq!(
            wire,
            "CONNECT\naccept-version:1.2\nhost:localhost\nheart-beat:0,0\n\n\0"
        );
    }

    #[test]
    fn test_encode_send_with_body() {
        let wire = Frame::send("/app/newpoint.room1", r#"{"x":5.0,"y":5.0}"#).encode();
        assert!(wire.starts_with("SEND\ndestination:/app/newpoint.room1\n"));
        assert!(wire.contains("content-type:application/json\n"));
        assert!(wire.ends_with("\n\n{\"x\":5.0,\"y\":5.0}\0"));
    }

    #[test]
    fn test_parse_connected() {
        let frame = Frame::parse("CONNECTED\nversion:1.2\nsession:abc\n\n\0").unwrap();
        assert_eq!(frame.command, Command::Connected);
        assert_eq!(frame.header_value("version"), Some("1.2"));
        assert_eq!(frame.header_value("session"), Some("abc"));
        assert!(frame.body.is_empty());
    }

    #[test]
    fn test_parse_message_with_body() {
        let wire = "MESSAGE\ndestination:/topic/newpoint.room1\nsubscription:sub-0\n\n{\"x\":10,\"y\":20}\0";
        let frame = Frame::parse(wire).unwrap();
        assert_eq!(frame.command, Command::Message);
        assert_eq!(
            frame.header_value("destination"),
            Some("/topic/newpoint.room1")
        );
        assert_eq!(frame.body, "{\"x\":10,\"y\":20}");
    }

    #[test]
    fn test_parse_crlf_lines() {
        let frame = Frame::parse("RECEIPT\r\nreceipt-id:rcpt-1\r\n\r\n\0").unwrap();
        assert_eq!(frame.command, Command::Receipt);
        assert_eq!(frame.header_value("receipt-id"), Some("rcpt-1"));
    }

    #[test]
    fn test_header_escaping_roundtrip() {
        let frame = Frame::new(Command::Send).header("key", "a:b\nc\\d");
        let parsed = Frame::parse(&frame.encode()).unwrap();
        assert_eq!(parsed.header_value("key"), Some("a:b\nc\\d"));
    }

    #[test]
    fn test_connect_headers_not_escaped() {
        let wire = Frame::connect("host:1").encode();
        assert!(wire.contains("host:host:1\n"));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            Frame::parse("NOPE\n\n\0"),
            Err(FrameError::UnknownCommand("NOPE".to_string()))
        );
    }

    #[test]
    fn test_malformed_header() {
        assert!(matches!(
            Frame::parse("SEND\nno-colon-here\n\n\0"),
            Err(FrameError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_bad_escape() {
        assert!(matches!(
            Frame::parse("SEND\nkey:bad\\xescape\n\n\0"),
            Err(FrameError::BadEscape(_))
        ));
    }

    #[test]
    fn test_empty_frame() {
        assert_eq!(Frame::parse("\n\0"), Err(FrameError::Empty));
    }
}
