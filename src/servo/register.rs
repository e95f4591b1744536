// AX-12 control table entries and unit conversions
//
// Converts between caller units (degrees, microseconds, signed speed) and
// raw register values.

/// Largest value accepted by the 10-bit torque, speed and position registers
pub const MAX_REGISTER_VALUE: u16 = 1023;

/// Goal/present position span in degrees
pub const ANGLE_RANGE_DEG: f32 = 300.0;

/// Longest configurable return delay
pub const MAX_RETURN_DELAY_US: u16 = 510;

/// Direction bit of the present speed register (set = clockwise)
const SPEED_DIRECTION_BIT: u16 = 0x0400;

/// Control table entries used by this driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    ReturnDelay,        // 1 byte, units of 2 µs
    BlinkConditions,    // 1 byte, status flag mask
    ShutdownConditions, // 1 byte, status flag mask
    GoalPosition,       // 2 bytes
    MaxSpeed,           // 2 bytes, 0 = no velocity control
    TorqueLimit,        // 2 bytes
    PresentPosition,    // 2 bytes, read-only
    PresentSpeed,       // 2 bytes, read-only, direction in bit 10
}

impl Register {
    pub const fn address(self) -> u8 {
        match self {
            Register::ReturnDelay => 0x05,
            Register::BlinkConditions => 0x11,
            Register::ShutdownConditions => 0x12,
            Register::GoalPosition => 0x1E,
            Register::MaxSpeed => 0x20,
            Register::TorqueLimit => 0x22,
            Register::PresentPosition => 0x24,
            Register::PresentSpeed => 0x26,
        }
    }

    /// Width in bytes
    pub const fn width(self) -> u8 {
        match self {
            Register::ReturnDelay | Register::BlinkConditions | Register::ShutdownConditions => 1,
            _ => 2,
        }
    }

    pub const fn is_read_only(self) -> bool {
        matches!(self, Register::PresentPosition | Register::PresentSpeed)
    }

    /// Largest raw value the register holds
    pub const fn max_value(self) -> u16 {
        match self.width() {
            1 => u8::MAX as u16,
            _ => MAX_REGISTER_VALUE,
        }
    }

    /// READ parameters: start address and byte count
    pub const fn read_params(self) -> [u8; 2] {
        [self.address(), self.width()]
    }

    /// WRITE parameters: address followed by the value, little-endian
    ///
    /// Returns the buffer and the number of bytes used.
    pub fn write_params(self, value: u16) -> ([u8; 3], usize) {
        let [lo, hi] = value.to_le_bytes();
        match self.width() {
            1 => ([self.address(), lo, 0], 2),
            _ => ([self.address(), lo, hi], 3),
        }
    }

    /// Reassemble a raw value from READ reply parameters
    pub fn decode(self, params: &[u8]) -> Option<u16> {
        match (self.width(), params) {
            (1, [lo, ..]) => Some(*lo as u16),
            (2, [lo, hi, ..]) => Some(u16::from_le_bytes([*lo, *hi])),
            _ => None,
        }
    }
}

/// Degrees to goal position units; `None` outside 0..=300
pub fn encode_angle(degrees: f32) -> Option<u16> {
    if !(0.0..=ANGLE_RANGE_DEG).contains(&degrees) {
        return None;
    }
    let raw = (degrees * MAX_REGISTER_VALUE as f32 / ANGLE_RANGE_DEG).round();
    Some((raw as u16).min(MAX_REGISTER_VALUE))
}

/// Position units to degrees; `None` above 1023
pub fn decode_angle(raw: u16) -> Option<f32> {
    if raw > MAX_REGISTER_VALUE {
        return None;
    }
    Some(raw as f32 * ANGLE_RANGE_DEG / MAX_REGISTER_VALUE as f32)
}

/// Microseconds to return delay units; `None` above 510 µs
pub fn encode_return_delay(micros: u16) -> Option<u8> {
    if micros > MAX_RETURN_DELAY_US {
        return None;
    }
    Some((micros / 2) as u8)
}

/// Decode present speed: bits 0-9 magnitude, bit 10 set = clockwise (negative)
pub fn decode_speed(raw: u16) -> i16 {
    let magnitude = (raw & MAX_REGISTER_VALUE) as i16;
    if raw & SPEED_DIRECTION_BIT != 0 {
        -magnitude
    } else {
        magnitude
    }
}
