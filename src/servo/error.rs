// Error types for AX-12 bus communication

use std::fmt;

use super::protocol::StatusFlags;

/// Which part of a reply did not arrive in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStage {
    /// Loopback of our own request on an echoing adapter
    Echo,
    /// Sync bytes, id and length
    Header,
    /// Error byte, parameters and checksum
    Body,
}

impl fmt::Display for WaitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitStage::Echo => f.write_str("echo"),
            WaitStage::Header => f.write_str("header"),
            WaitStage::Body => f.write_str("body"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServoError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timeout waiting for {stage} of exchange with servo {id}")]
    Timeout { id: u8, stage: WaitStage },

    #[error("Invalid response header from servo {id}: {header:02X?}")]
    InvalidHeader { id: u8, header: [u8; 2] },

    #[error("Response from servo {id} declares bad length {length}")]
    BadLength { id: u8, length: u8 },

    #[error("Response frame truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("Checksum mismatch for servo {id}: calculated 0x{expected:02X}, received 0x{received:02X}")]
    ChecksumMismatch { id: u8, expected: u8, received: u8 },

    #[error("Response ID {actual} does not match command ID {expected}")]
    IdMismatch { expected: u8, actual: u8 },

    #[error("Servo {id} returned {value} for register 0x{address:02X}, above its range")]
    ValueOutOfRange { id: u8, address: u8, value: u16 },

    #[error("Servo {id} reported error status: {status}")]
    ServoReported { id: u8, status: StatusFlags },

    #[error("{what} out of range: {value}")]
    InputOutOfRange { what: &'static str, value: f32 },
}

impl ServoError {
    /// Status byte attached to the failure, if the servo sent one
    pub fn status(&self) -> Option<StatusFlags> {
        match self {
            ServoError::ServoReported { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the failure came from the wire rather than from caller input
    pub fn is_protocol(&self) -> bool {
        !matches!(
            self,
            ServoError::InputOutOfRange { .. } | ServoError::Serial(_) | ServoError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ServoError>;
