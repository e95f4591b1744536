// Dynamixel AX-12 serial protocol framing
//
// Instruction packet: [0xFF, 0xFF, ID, Length, Instruction, Params..., Checksum]
// Status packet:      [0xFF, 0xFF, ID, Length, Error, Params..., Checksum]
// Length counts everything after itself: params + 2.

use std::fmt;
use std::ops::BitOr;

use heapless::Vec;

use super::error::{Result, ServoError};
use super::ring::RECEIVE_BUFFER_LEN;

/// Packet header bytes
pub const HEADER: [u8; 2] = [0xFF, 0xFF];

/// Id addressed by every servo on the bus; servos never reply to it
pub const BROADCAST_ID: u8 = 0xFE;

/// Highest id a single servo can have
pub const MAX_SERVO_ID: u8 = 0xFD;

/// Largest length field accepted in a status packet
pub const MAX_PARAMS: usize = RECEIVE_BUFFER_LEN - 5;

/// Largest parameter count we put in an instruction packet
pub const MAX_COMMAND_PARAMS: usize = 64;

/// Header, id, length, instruction and checksum
const FRAME_OVERHEAD: usize = 6;

pub const MAX_FRAME_LEN: usize = MAX_COMMAND_PARAMS + FRAME_OVERHEAD;

/// Status packet length without parameters
pub const MIN_RESPONSE_LEN: usize = FRAME_OVERHEAD;

/// Longest status packet we accept: header, id, length, then the body
pub const MAX_RESPONSE_LEN: usize = 4 + MAX_PARAMS;

/// Instruction set
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Ping = 0x01,
    Read = 0x02,
    Write = 0x03,
    RegWrite = 0x04,
    Action = 0x05,
    Reset = 0x06,
    SyncWrite = 0x83,
}

/// Error byte of a status packet
///
/// The same bit layout configures the blink and shutdown conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct StatusFlags(u8);

impl StatusFlags {
    pub const INPUT_VOLTAGE: Self = Self(0x01);
    pub const ANGLE_LIMIT: Self = Self(0x02);
    pub const OVERHEATING: Self = Self(0x04);
    pub const RANGE: Self = Self(0x08);
    pub const CHECKSUM: Self = Self(0x10);
    pub const OVERLOAD: Self = Self(0x20);
    pub const INSTRUCTION: Self = Self(0x40);

    const NAMES: [(StatusFlags, &'static str); 7] = [
        (Self::INPUT_VOLTAGE, "input voltage"),
        (Self::ANGLE_LIMIT, "angle limit"),
        (Self::OVERHEATING, "overheating"),
        (Self::RANGE, "range"),
        (Self::CHECKSUM, "checksum"),
        (Self::OVERLOAD, "overload"),
        (Self::INSTRUCTION, "instruction"),
    ];

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for StatusFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for StatusFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        // Bit 7 is unused by the servo
        if self.0 & 0x80 != 0 {
            if !first {
                f.write_str(" | ")?;
            }
            write!(f, "0x80")?;
        }
        Ok(())
    }
}

/// Checksum over everything between the header and the checksum byte
pub fn checksum(data: &[u8]) -> u8 {
    !data.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
}

/// Outgoing instruction packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    pub id: u8,
    pub instruction: Instruction,
    pub params: Vec<u8, MAX_COMMAND_PARAMS>,
}

impl CommandFrame {
    pub fn new(id: u8, instruction: Instruction, params: &[u8]) -> Result<Self> {
        let params = Vec::from_slice(params).map_err(|_| ServoError::InputOutOfRange {
            what: "parameter count",
            value: params.len() as f32,
        })?;
        Ok(Self {
            id,
            instruction,
            params,
        })
    }

    /// Length field: params + instruction + checksum
    pub fn length(&self) -> u8 {
        (self.params.len() + 2) as u8
    }

    pub fn checksum(&self) -> u8 {
        let sum = self
            .params
            .iter()
            .fold(
                self.id
                    .wrapping_add(self.length())
                    .wrapping_add(self.instruction as u8),
                |sum, &b| sum.wrapping_add(b),
            );
        !sum
    }

    /// Serialize to wire bytes
    pub fn encode(&self) -> Vec<u8, MAX_FRAME_LEN> {
        let mut packet = Vec::new();
        // Capacity covers the largest parameter list, so pushes cannot fail
        let _ = packet.extend_from_slice(&HEADER);
        let _ = packet.push(self.id);
        let _ = packet.push(self.length());
        let _ = packet.push(self.instruction as u8);
        let _ = packet.extend_from_slice(&self.params);
        let _ = packet.push(self.checksum());
        packet
    }
}

/// Decoded status packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    pub id: u8,
    pub length: u8,
    pub status: StatusFlags,
    pub params: Vec<u8, MAX_PARAMS>,
    pub checksum: u8,
}

impl ResponseFrame {
    /// Check a declared length before waiting for the rest of the frame
    pub fn check_length(id: u8, length: u8) -> Result<()> {
        if length < 2 || length as usize > MAX_PARAMS {
            return Err(ServoError::BadLength { id, length });
        }
        Ok(())
    }

    /// Parse a complete status packet, header included
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MIN_RESPONSE_LEN {
            return Err(ServoError::Truncated {
                expected: MIN_RESPONSE_LEN,
                actual: bytes.len(),
            });
        }

        let id = bytes[2];
        let header = [bytes[0], bytes[1]];
        if header != HEADER {
            return Err(ServoError::InvalidHeader { id, header });
        }

        let length = bytes[3];
        Self::check_length(id, length)?;

        let total = 4 + length as usize;
        if bytes.len() < total {
            return Err(ServoError::Truncated {
                expected: total,
                actual: bytes.len(),
            });
        }

        let received = bytes[total - 1];
        let expected = checksum(&bytes[2..total - 1]);
        if expected != received {
            return Err(ServoError::ChecksumMismatch {
                id,
                expected,
                received,
            });
        }

        let params = Vec::from_slice(&bytes[5..total - 1])
            .map_err(|_| ServoError::BadLength { id, length })?;

        Ok(Self {
            id,
            length,
            status: StatusFlags::from_bits(bytes[4]),
            params,
            checksum: received,
        })
    }
}
