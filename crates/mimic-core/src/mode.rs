//! Operating modes and the cache action each one triggers on entry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Mode of the surrounding proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Serve responses from the loaded simulation
    #[default]
    Simulate,
    /// Serve from the simulation, pass unmatched requests through
    Spy,
    /// Forward to the real service and record the exchanges
    Capture,
    /// Forward and rewrite traffic
    Modify,
    /// Generate responses without a simulation
    Synthesize,
}

/// What happens to the match cache when a mode is entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAction {
    Preload,
    Flush,
    Keep,
}

impl Mode {
    /// Modes that answer requests from the loaded rules.
    pub fn serves_simulation(&self) -> bool {
        matches!(self, Mode::Simulate | Mode::Spy)
    }

    pub fn cache_action(&self) -> CacheAction {
        match self {
            Mode::Simulate | Mode::Spy => CacheAction::Preload,
            Mode::Capture => CacheAction::Flush,
            Mode::Modify | Mode::Synthesize => CacheAction::Keep,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Simulate => "simulate",
            Mode::Spy => "spy",
            Mode::Capture => "capture",
            Mode::Modify => "modify",
            Mode::Synthesize => "synthesize",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown mode {0:?} (expected simulate, spy, capture, modify or synthesize)")]
pub struct UnknownMode(pub String);

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simulate" => Ok(Mode::Simulate),
            "spy" => Ok(Mode::Spy),
            "capture" => Ok(Mode::Capture),
            "modify" => Ok(Mode::Modify),
            "synthesize" => Ok(Mode::Synthesize),
            _ => Err(UnknownMode(s.to_string())),
        }
    }
}
