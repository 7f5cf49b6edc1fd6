//! Opaque pagination cursor for the event log.
//!
//! A cursor encodes a total-order position `(tick, seq)` within the event
//! log: the tick an event occurred at, and the monotonic insertion sequence
//! that orders events sharing a tick. A reverse-chronological scan resumes
//! strictly *before* the cursor position, so repeated queries yield no gaps
//! and no duplicates.
//!
//! The wire format is two integers joined by `':'` -- `tick` first, then
//! `seq`. Callers must treat the token as opaque; only this module parses it.

use serde::{Deserialize, Serialize};

/// Separator between the tick and sequence components.
const SEPARATOR: char = ':';

/// Errors that can occur when decoding a cursor token.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CursorError {
    /// The token does not contain the component separator.
    #[error("malformed cursor: missing '{SEPARATOR}' separator")]
    MissingSeparator,

    /// A component is not a valid unsigned integer.
    #[error("malformed cursor: invalid {component} component")]
    InvalidComponent {
        /// Which component failed to parse (`"tick"` or `"seq"`).
        component: &'static str,
    },
}

/// A position in the event log's total order.
///
/// Cursors compare by `(tick, seq)`; successive pages of a
/// reverse-chronological scan carry strictly decreasing cursors.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct EventCursor {
    /// Tick component of the position.
    pub tick: u64,
    /// Insertion sequence within the tick.
    pub seq: u64,
}

impl EventCursor {
    /// Create a cursor from its components.
    pub const fn new(tick: u64, seq: u64) -> Self {
        Self { tick, seq }
    }

    /// Encode the cursor as an opaque token.
    pub fn encode(&self) -> String {
        format!("{}{}{}", self.tick, SEPARATOR, self.seq)
    }

    /// Decode a cursor from its token form.
    ///
    /// # Errors
    ///
    /// Returns [`CursorError`] if the token is missing the separator or
    /// either component is not an unsigned integer.
    pub fn decode(token: &str) -> Result<Self, CursorError> {
        let (tick_part, seq_part) = token
            .split_once(SEPARATOR)
            .ok_or(CursorError::MissingSeparator)?;

        let tick = tick_part
            .parse::<u64>()
            .map_err(|_err| CursorError::InvalidComponent { component: "tick" })?;
        let seq = seq_part
            .parse::<u64>()
            .map_err(|_err| CursorError::InvalidComponent { component: "seq" })?;

        Ok(Self { tick, seq })
    }
}

impl core::fmt::Display for EventCursor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.encode())
    }
}

impl core::str::FromStr for EventCursor {
    type Err = CursorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let cursor = EventCursor::new(42, 1337);
        let token = cursor.encode();
        assert_eq!(token, "42:1337");
        assert_eq!(EventCursor::decode(&token).unwrap(), cursor);
    }

    #[test]
    fn decode_rejects_missing_separator() {
        assert_eq!(
            EventCursor::decode("421337"),
            Err(CursorError::MissingSeparator)
        );
    }

    #[test]
    fn decode_rejects_garbage_components() {
        assert_eq!(
            EventCursor::decode("abc:3"),
            Err(CursorError::InvalidComponent { component: "tick" })
        );
        assert_eq!(
            EventCursor::decode("3:abc"),
            Err(CursorError::InvalidComponent { component: "seq" })
        );
    }

    #[test]
    fn ordering_is_tick_then_seq() {
        let older = EventCursor::new(5, 900);
        let newer = EventCursor::new(6, 0);
        assert!(older < newer);

        let first = EventCursor::new(6, 1);
        let second = EventCursor::new(6, 2);
        assert!(first < second);
    }

    #[test]
    fn from_str_matches_decode() {
        let parsed: EventCursor = "7:9".parse().unwrap();
        assert_eq!(parsed, EventCursor::new(7, 9));
    }
}
