// Typed AX-12 commands over a half-duplex byte transport
//
// Every exchange: validate input, send the instruction packet, drop the
// echo, wait for the status packet, then check id and error byte.

use embedded_hal::delay::DelayNs;
use tracing::{debug, warn};

use super::error::{Result, ServoError, WaitStage};
use super::protocol::{
    BROADCAST_ID, CommandFrame, Instruction, MAX_COMMAND_PARAMS, MAX_SERVO_ID, ResponseFrame,
    StatusFlags,
};
use super::register::{
    MAX_REGISTER_VALUE, Register, decode_angle, decode_speed, encode_angle, encode_return_delay,
};
use super::transport::ByteTransport;
use super::waiter::{ResponseTimeouts, wait_response};

/// AX-12 bus master
///
/// Methods take `&mut self`: one exchange is in flight at a time.
pub struct ServoBus<T, D> {
    transport: T,
    delay: D,
    timeouts: ResponseTimeouts,
    echo: bool,
    last_status: Option<StatusFlags>,
}

impl<T: ByteTransport, D: DelayNs> ServoBus<T, D> {
    pub fn new(transport: T, delay: D) -> Self {
        Self {
            transport,
            delay,
            timeouts: ResponseTimeouts::default(),
            echo: false,
            last_status: None,
        }
    }

    /// Replace the response wait budgets
    pub fn with_timeouts(mut self, timeouts: ResponseTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Expect every transmitted frame to come back on the receive line
    ///
    /// The echo is awaited and discarded byte for byte, within the header
    /// budget, before the reply is read.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn timeouts(&self) -> &ResponseTimeouts {
        &self.timeouts
    }

    /// Error byte of the most recently decoded status packet
    pub fn last_status(&self) -> Option<StatusFlags> {
        self.last_status
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn delay_mut(&mut self) -> &mut D {
        &mut self.delay
    }

    pub fn into_parts(self) -> (T, D) {
        (self.transport, self.delay)
    }

    /// Send an instruction packet and return the validated reply
    fn exchange(
        &mut self,
        id: u8,
        instruction: Instruction,
        params: &[u8],
    ) -> Result<ResponseFrame> {
        check_unicast(id)?;
        let frame = CommandFrame::new(id, instruction, params)?;
        self.send(&frame)?;
        if !self.echo {
            // Drop whatever is queued before listening for the reply
            self.transport.reset_input();
        }

        let response = wait_response(&mut self.transport, &mut self.delay, &self.timeouts, id)
            .inspect_err(|e| warn!("Servo {} did not respond correctly: {}", id, e))?;
        self.last_status = Some(response.status);

        if response.id != id {
            warn!("Response ID {} does not match command ID {}", response.id, id);
            return Err(ServoError::IdMismatch {
                expected: id,
                actual: response.id,
            });
        }

        if !response.status.is_empty() {
            warn!("Servo {} reported error status: {}", id, response.status);
            return Err(ServoError::ServoReported {
                id,
                status: response.status,
            });
        }

        Ok(response)
    }

    fn send(&mut self, frame: &CommandFrame) -> Result<()> {
        let packet = frame.encode();
        debug!("Send {:?} to servo {}: {:02X?}", frame.instruction, frame.id, packet.as_slice());
        if !self.echo {
            self.transport.send_frame(&packet)?;
            return Ok(());
        }

        // Stale bytes go first so the loopback is the next thing queued
        self.transport.reset_input();
        self.transport.send_frame(&packet)?;
        self.discard_echo(frame.id, &packet)
    }

    /// Take our own frame back off the line as it arrives
    ///
    /// Drained byte by byte: a long sync write echo does not fit the ring.
    fn discard_echo(&mut self, id: u8, packet: &[u8]) -> Result<()> {
        let mut attempts: u32 = 0;
        let mut differing = 0;
        for (taken, &sent) in packet.iter().enumerate() {
            while self.transport.available() == 0 {
                attempts += 1;
                if attempts > self.timeouts.header_retries as u32 {
                    warn!("Servo {}: echo incomplete, {} of {} bytes", id, taken, packet.len());
                    return Err(ServoError::Timeout {
                        id,
                        stage: WaitStage::Echo,
                    });
                }
                self.delay.delay_us(self.timeouts.header_poll_us);
            }
            if self.transport.take() != Some(sent) {
                differing += 1;
            }
        }
        if differing > 0 {
            warn!("Servo {}: echo differs from the request in {} bytes", id, differing);
        }
        Ok(())
    }

    /// Write one register on several servos with a single broadcast packet
    pub fn sync_write(&mut self, register: Register, data: &[(u8, u16)]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        if register.is_read_only() {
            return Err(ServoError::InputOutOfRange {
                what: "writable register address",
                value: register.address() as f32,
            });
        }

        // [start_addr, data_length, id1, data1..., id2, data2..., ...]
        let mut params: heapless::Vec<u8, MAX_COMMAND_PARAMS> = heapless::Vec::new();
        let too_many = |_: ()| ServoError::InputOutOfRange {
            what: "sync write servo count",
            value: data.len() as f32,
        };
        params
            .extend_from_slice(&[register.address(), register.width()])
            .map_err(too_many)?;
        for &(id, value) in data {
            check_unicast(id)?;
            check_range("register value", value, register.max_value())?;
            let (encoded, len) = register.write_params(value);
            params.push(id).map_err(|_| too_many(()))?;
            params.extend_from_slice(&encoded[1..len]).map_err(too_many)?;
        }

        let frame = CommandFrame::new(BROADCAST_ID, Instruction::SyncWrite, &params)?;
        debug!("Sync write to {} servos: reg={:?}", data.len(), register);
        self.send(&frame)
    }

    /// Delay before the servo replies, 0..=510 µs in 2 µs steps
    pub fn set_return_delay_us(&mut self, id: u8, micros: u16) -> Result<()> {
        let raw = encode_return_delay(micros).ok_or(ServoError::InputOutOfRange {
            what: "return delay (us)",
            value: micros as f32,
        })?;
        self.write_register(id, Register::ReturnDelay, raw as u16)
    }

    /// Conditions that make the servo blink its LED
    pub fn set_blink_conditions(&mut self, id: u8, flags: StatusFlags) -> Result<()> {
        self.write_register(id, Register::BlinkConditions, flags.bits() as u16)
    }

    /// Conditions that make the servo drop torque
    pub fn set_shutdown_conditions(&mut self, id: u8, flags: StatusFlags) -> Result<()> {
        self.write_register(id, Register::ShutdownConditions, flags.bits() as u16)
    }

    /// Torque limit from 0 (free running) to 1023 (max)
    pub fn set_torque_limit(&mut self, id: u8, value: u16) -> Result<()> {
        check_range("torque limit", value, MAX_REGISTER_VALUE)?;
        self.write_register(id, Register::TorqueLimit, value)
    }

    pub fn torque_limit(&mut self, id: u8) -> Result<u16> {
        self.read_register(id, Register::TorqueLimit)
    }

    /// Moving speed from 1 (slowest) to 1023 (about 114 RPM)
    ///
    /// 0 is not an error: it turns velocity control off.
    pub fn set_max_speed(&mut self, id: u8, value: u16) -> Result<()> {
        check_range("max speed", value, MAX_REGISTER_VALUE)?;
        self.write_register(id, Register::MaxSpeed, value)
    }

    pub fn max_speed(&mut self, id: u8) -> Result<u16> {
        self.read_register(id, Register::MaxSpeed)
    }

    /// Present speed, negative when turning clockwise
    pub fn current_speed(&mut self, id: u8) -> Result<i16> {
        let raw = self.read_register(id, Register::PresentSpeed)?;
        Ok(decode_speed(raw))
    }

    /// Move to an angle between 0 and 300 degrees
    pub fn set_goal_angle(&mut self, id: u8, degrees: f32) -> Result<()> {
        let raw = encode_angle(degrees).ok_or(ServoError::InputOutOfRange {
            what: "goal angle (deg)",
            value: degrees,
        })?;
        self.write_register(id, Register::GoalPosition, raw)
    }

    /// Present angle in degrees
    pub fn current_angle(&mut self, id: u8) -> Result<f32> {
        let raw = self.read_register(id, Register::PresentPosition)?;
        decode_angle(raw).ok_or(ServoError::ValueOutOfRange {
            id,
            address: Register::PresentPosition.address(),
            value: raw,
        })
    }
}

fn check_unicast(id: u8) -> Result<()> {
    if id > MAX_SERVO_ID {
        return Err(ServoError::InputOutOfRange {
            what: "servo id",
            value: id as f32,
        });
    }
    Ok(())
}

fn check_range(what: &'static str, value: u16, max: u16) -> Result<()> {
    if value > max {
        return Err(ServoError::InputOutOfRange {
            what,
            value: value as f32,
        });
    }
    Ok(())
}
