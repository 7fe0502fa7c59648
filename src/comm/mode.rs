//! Point-to-point delivery semantics.

use crate::error::BenchError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// When a send is allowed to return relative to the receiver's progress
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendMode {
    /// Returns once the payload is handed to the fabric
    Standard,
    /// Returns only after a receive has matched the message
    Synchronous,
    /// The receiver must already have posted a matching receive
    Ready,
    /// Payload is charged against a buffer attached by the sender
    Buffered,
}

impl SendMode {
    pub const ALL: [SendMode; 4] = [
        SendMode::Standard,
        SendMode::Synchronous,
        SendMode::Ready,
        SendMode::Buffered,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SendMode::Standard => "standard",
            SendMode::Synchronous => "synchronous",
            SendMode::Ready => "ready",
            SendMode::Buffered => "buffered",
        }
    }
}

impl fmt::Display for SendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SendMode {
    type Err = BenchError;

    /// Accepts the long names and the classic `send`/`ssend`/`rsend`/`bsend`
    /// spellings, exactly as written.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" | "send" => Ok(SendMode::Standard),
            "synchronous" | "ssend" => Ok(SendMode::Synchronous),
            "ready" | "rsend" => Ok(SendMode::Ready),
            "buffered" | "bsend" => Ok(SendMode::Buffered),
            _ => Err(BenchError::UnsupportedMode(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_both_spellings() {
        for mode in SendMode::ALL {
            assert_eq!(mode.name().parse::<SendMode>().unwrap(), mode);
        }
        assert_eq!("ssend".parse::<SendMode>().unwrap(), SendMode::Synchronous);
        assert_eq!("bsend".parse::<SendMode>().unwrap(), SendMode::Buffered);
    }

    #[test]
    fn test_names_match_exactly() {
        for bad in [" Standard ", "Standard", "STANDARD", "BSEND", "ready ", "\tssend"] {
            match bad.parse::<SendMode>() {
                Err(BenchError::UnsupportedMode(name)) => assert_eq!(name, bad),
                other => panic!("{bad:?} parsed as {other:?}"),
            }
        }
    }

    #[test]
    fn test_unknown_mode() {
        for bad in ["", "isend", "fast", "readyy"] {
            assert!(matches!(
                bad.parse::<SendMode>(),
                Err(BenchError::UnsupportedMode(_))
            ));
        }
    }
}
