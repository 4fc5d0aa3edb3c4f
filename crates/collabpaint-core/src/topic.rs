//! Drawing identifiers and the topic/destination names derived from them.
//!
//! Each drawing id scopes an independent canvas: clients subscribe to
//! `/topic/newpoint.<id>` and publish to `/app/newpoint.<id>`, matching the
//! broker's `/topic` broker prefix and `/app` application prefix.

use std::fmt;

/// Broker-routed prefix for inbound point broadcasts.
pub const TOPIC_PREFIX: &str = "/topic/newpoint.";
/// Application-routed prefix for outbound point sends.
pub const DESTINATION_PREFIX: &str = "/app/newpoint.";

/// A non-empty identifier scoping one collaborative drawing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DrawingId(String);

impl DrawingId {
    /// Create a drawing id. Returns `None` for an empty or whitespace-only id.
    pub fn new(id: &str) -> Option<Self> {
        let id = id.trim();
        if id.is_empty() {
            None
        } else {
            Some(Self(id.to_string()))
        }
    }

    /// The raw identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Topic this drawing's subscribers receive broadcasts on.
    pub fn topic(&self) -> String {
        format!("{}{}", TOPIC_PREFIX, self.0)
    }

    /// Destination this drawing's publishers send points to.
    pub fn destination(&self) -> String {
        format!("{}{}", DESTINATION_PREFIX, self.0)
    }
}

impl fmt::Display for DrawingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_and_destination() {
        let id = DrawingId::new("room1").unwrap();
        assert_eq!(id.topic(), "/topic/newpoint.room1");
        assert_eq!(id.destination(), "/app/newpoint.room1");
    }

    #[test]
    fn test_empty_id_rejected() {
        assert!(DrawingId::new("").is_none());
        assert!(DrawingId::new("   ").is_none());
    }

    #[test]
    fn test_id_trimmed() {
        let id = DrawingId::new("  room1 ").unwrap();
        assert_eq!(id.as_str(), "room1");
    }
}
