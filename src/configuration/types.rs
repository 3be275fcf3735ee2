use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error_handling::types::ConfigError;

pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 64 * 1024;
pub const MAX_MESSAGE_BYTES_LIMIT: usize = 1024 * 1024;
pub const MAX_PARTICIPANTS: usize = 16;
pub const MAX_ROUNDS: usize = 100;

/// Tunables of a group activity handler.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
    /// Go back to waiting for sessions automatically once a session ends.
    pub resubscribe_after_end: bool,
    /// Largest encoded envelope the router hands to the transport.
    pub max_message_bytes: usize,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            resubscribe_after_end: true,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}

impl HandlerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_message_bytes == 0 || self.max_message_bytes > MAX_MESSAGE_BYTES_LIMIT {
            return Err(ConfigError::NotInRange(format!(
                "max_message_bytes must be within 1..={}, got {}",
                MAX_MESSAGE_BYTES_LIMIT, self.max_message_bytes
            )));
        }
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DemoActivity {
    #[default]
    Colors,
    Puppies,
}

impl FromStr for DemoActivity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "colors" | "color" => Ok(DemoActivity::Colors),
            "puppies" | "puppy" => Ok(DemoActivity::Puppies),
            other => Err(ConfigError::UnknownActivity(other.to_string())),
        }
    }
}

impl fmt::Display for DemoActivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DemoActivity::Colors => write!(f, "colors"),
            DemoActivity::Puppies => write!(f, "puppies"),
        }
    }
}

/// Parameters of the loopback simulation run by the binary.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub activity: DemoActivity,
    pub participants: usize,
    pub rounds: usize,
    pub eligible: bool,
    /// With the toggle policy, tap connect once more after disconnecting.
    pub rejoin: bool,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            activity: DemoActivity::Colors,
            participants: 2,
            rounds: 3,
            eligible: true,
            rejoin: false,
        }
    }
}

impl DemoConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.participants == 0 || self.participants > MAX_PARTICIPANTS {
            return Err(ConfigError::NotInRange(format!(
                "participants must be within 1..={}, got {}",
                MAX_PARTICIPANTS, self.participants
            )));
        }
        if self.rounds > MAX_ROUNDS {
            return Err(ConfigError::NotInRange(format!(
                "rounds must be within 0..={}, got {}",
                MAX_ROUNDS, self.rounds
            )));
        }
        Ok(())
    }
}
