// Report types printed by the command line tool

use embedded_hal::delay::DelayNs;
use serde::{Deserialize, Serialize};

use crate::servo::{ByteTransport, Result, ServoBus, ServoError};

/// Snapshot of a servo's configurable and live registers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServoStatus {
    pub id: u8,
    pub torque_limit: u16,
    pub max_speed: u16,
    pub current_speed: i16,
    pub angle_deg: f32,
}

impl ServoStatus {
    /// Read every field with one exchange each
    pub fn read<T: ByteTransport, D: DelayNs>(bus: &mut ServoBus<T, D>, id: u8) -> Result<Self> {
        Ok(Self {
            id,
            torque_limit: bus.torque_limit(id)?,
            max_speed: bus.max_speed(id)?,
            current_speed: bus.current_speed(id)?,
            angle_deg: bus.current_angle(id)?,
        })
    }
}

/// Outcome of probing a servo
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ServoHealth {
    Ok,
    NoResponse,
    Faulted,
}

/// Ping result with the status byte the servo sent, if any
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PingReport {
    pub id: u8,
    pub health: ServoHealth,
    pub status: Option<u8>,
    pub detail: Option<String>,
}

impl PingReport {
    pub fn from_result(id: u8, result: &Result<bool>) -> Self {
        match result {
            Ok(true) => Self {
                id,
                health: ServoHealth::Ok,
                status: Some(0),
                detail: None,
            },
            Ok(false) => Self {
                id,
                health: ServoHealth::NoResponse,
                status: None,
                detail: None,
            },
            Err(e) => Self {
                id,
                health: ServoHealth::from(e),
                status: e.status().map(|s| s.bits()),
                detail: Some(e.to_string()),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        self.health == ServoHealth::Ok
    }
}

impl From<&ServoError> for ServoHealth {
    fn from(e: &ServoError) -> Self {
        match e {
            ServoError::Timeout { .. } => ServoHealth::NoResponse,
            _ => ServoHealth::Faulted,
        }
    }
}
