// Servo bring-up and the angle sweep demo
//
// Bring-up configures a freshly powered servo the same way every time: wait
// until it answers, make it reply immediately, blink on range/angle errors,
// drop torque on overload/overheat. Each step is retried a bounded number of
// times since any single exchange can be lost on the bus.

use embedded_hal::delay::DelayNs;
use tracing::{info, warn};

use crate::servo::{ByteTransport, Result, ServoBus, ServoError, StatusFlags, WaitStage};

/// LED blinks on these errors after bring-up
pub const BLINK_CONDITIONS: StatusFlags = StatusFlags::from_bits(
    StatusFlags::RANGE.bits() | StatusFlags::ANGLE_LIMIT.bits(),
);

/// Torque is removed on these errors after bring-up
pub const SHUTDOWN_CONDITIONS: StatusFlags = StatusFlags::from_bits(
    StatusFlags::OVERLOAD.bits() | StatusFlags::OVERHEATING.bits(),
);

/// Max speed step per sweep pass
const SWEEP_SPEED_STEP: u16 = 128;

/// Hold time unit between sweep moves
const SWEEP_HOLD_MS: u32 = 500;

/// Run `op` until it succeeds or `attempts` protocol failures pile up
///
/// Transport failures (port gone, I/O error) are returned immediately.
fn retry<T, D, R>(
    bus: &mut ServoBus<T, D>,
    what: &str,
    attempts: u32,
    mut op: impl FnMut(&mut ServoBus<T, D>) -> Result<R>,
) -> Result<R>
where
    T: ByteTransport,
    D: DelayNs,
{
    let mut attempt = 1;
    loop {
        match op(bus) {
            Ok(value) => {
                info!("{} OK", what);
                return Ok(value);
            }
            Err(e) if !e.is_protocol() || attempt >= attempts => {
                warn!("{} failed after {} attempt(s): {}", what, attempt, e);
                return Err(e);
            }
            Err(e) => {
                warn!("{} failed (attempt {}/{}): {}", what, attempt, attempts, e);
                attempt += 1;
            }
        }
    }
}

/// Bring a servo into a known configuration
pub fn bring_up<T: ByteTransport, D: DelayNs>(
    bus: &mut ServoBus<T, D>,
    id: u8,
    attempts: u32,
) -> Result<()> {
    info!("Bringing up servo {}", id);

    retry(bus, "Ping", attempts, |bus| {
        if bus.ping(id)? {
            Ok(())
        } else {
            Err(ServoError::Timeout {
                id,
                stage: WaitStage::Header,
            })
        }
    })?;
    retry(bus, "Set return delay", attempts, |bus| bus.set_return_delay_us(id, 0))?;
    retry(bus, "Set blink conditions", attempts, |bus| {
        bus.set_blink_conditions(id, BLINK_CONDITIONS)
    })?;
    retry(bus, "Set shutdown conditions", attempts, |bus| {
        bus.set_shutdown_conditions(id, SHUTDOWN_CONDITIONS)
    })?;

    info!("Servo {} ready", id);
    Ok(())
}

/// One move of the sweep demo
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepStep {
    pub max_speed: u16,
    pub from_deg: f32,
    pub to_deg: f32,
}

/// Swing the servo to the mirror of its current angle, faster each pass
///
/// Pass `n` uses max speed `128 * (n + 1)` and holds for `(passes - n) * 500` ms.
pub fn sweep<T: ByteTransport, D: DelayNs>(
    bus: &mut ServoBus<T, D>,
    id: u8,
    passes: u16,
) -> Result<Vec<SweepStep>> {
    let mut steps = Vec::with_capacity(passes as usize);

    for pass in 0..passes {
        let max_speed = SWEEP_SPEED_STEP.saturating_mul(pass + 1).min(1023);
        bus.set_max_speed(id, max_speed)?;

        let from_deg = bus.current_angle(id)?;
        let to_deg = 300.0 - from_deg;
        bus.set_goal_angle(id, to_deg)?;
        info!("Pass {}: {:.1}° -> {:.1}° at speed {}", pass + 1, from_deg, to_deg, max_speed);

        steps.push(SweepStep {
            max_speed,
            from_deg,
            to_deg,
        });

        let hold = (passes - pass) as u32 * SWEEP_HOLD_MS;
        bus.delay_mut().delay_ms(hold);
    }

    Ok(steps)
}
