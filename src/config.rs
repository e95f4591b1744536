// Serial settings, response timeout budgets, CLI defaults
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::servo::ResponseTimeouts;

// AX-12 factory baudrate
pub const DEFAULT_BAUDRATE: u32 = 1_000_000;

// How often the serial reader thread wakes up to check for shutdown
pub const READ_POLL_MS: u64 = 10;

// Serial port used when none is given on the command line
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";

// Servo id used when none is given on the command line
pub const DEFAULT_SERVO_ID: u8 = 1;

// Response waiter budgets: retries x poll delay per stage
pub const HEADER_RETRIES: u16 = 200;
pub const HEADER_POLL_US: u32 = 75;
pub const BODY_RETRIES: u16 = 200;
pub const BODY_POLL_US: u32 = 135;

// Whether the adapter loops transmitted bytes back into the receiver
pub const DEFAULT_ECHO: bool = false;

// Attempts per bring-up step before giving up
pub const BRING_UP_ATTEMPTS: u32 = 10;

/// Bus settings, loadable from a JSON file
///
/// Missing fields fall back to the defaults above.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub port: String,
    pub baudrate: u32,
    pub timeouts: ResponseTimeouts,
    /// Half-duplex adapter hears its own transmissions
    pub echo: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baudrate: DEFAULT_BAUDRATE,
            timeouts: ResponseTimeouts::default(),
            echo: DEFAULT_ECHO,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
}

impl BusConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }
}
