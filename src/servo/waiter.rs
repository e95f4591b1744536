// Bounded wait for a status packet
//
// AwaitingHeader -> AwaitingBody -> Decoding, each wait a busy-poll with a
// fixed retry count and per-poll delay. No bytes are consumed until the
// stage's full byte count is queued.

use std::time::Duration;

use embedded_hal::delay::DelayNs;
use heapless::Vec;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::{Result, ServoError, WaitStage};
use super::protocol::{HEADER, MAX_RESPONSE_LEN, ResponseFrame};
use super::transport::ByteTransport;
use crate::config::{BODY_POLL_US, BODY_RETRIES, HEADER_POLL_US, HEADER_RETRIES};

/// Sync bytes, id and length
const HEADER_LEN: usize = 4;

/// Retry budgets for the two wait stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseTimeouts {
    pub header_retries: u16,
    pub header_poll_us: u32,
    pub body_retries: u16,
    pub body_poll_us: u32,
}

impl Default for ResponseTimeouts {
    fn default() -> Self {
        Self {
            header_retries: HEADER_RETRIES,
            header_poll_us: HEADER_POLL_US,
            body_retries: BODY_RETRIES,
            body_poll_us: BODY_POLL_US,
        }
    }
}

impl ResponseTimeouts {
    /// Longest time spent waiting for a header
    pub fn header_budget(&self) -> Duration {
        Duration::from_micros(self.header_retries as u64 * self.header_poll_us as u64)
    }

    /// Longest time spent waiting for a body once the header is in
    pub fn body_budget(&self) -> Duration {
        Duration::from_micros(self.body_retries as u64 * self.body_poll_us as u64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitState {
    AwaitingHeader,
    AwaitingBody { length: u8 },
    Decoding,
}

/// Poll until `needed` bytes are queued; false once the retries run out
fn poll_until<T: ByteTransport, D: DelayNs>(
    transport: &mut T,
    delay: &mut D,
    needed: usize,
    retries: u16,
    poll_us: u32,
) -> bool {
    let mut attempts: u32 = 0;
    while transport.available() < needed {
        attempts += 1;
        if attempts > retries as u32 {
            return false;
        }
        delay.delay_us(poll_us);
    }
    true
}

fn take_into<T: ByteTransport>(
    transport: &mut T,
    frame: &mut Vec<u8, MAX_RESPONSE_LEN>,
    count: usize,
) -> Result<()> {
    for _ in 0..count {
        let byte = transport.take().ok_or(ServoError::Truncated {
            expected: frame.len() + count,
            actual: frame.len(),
        })?;
        frame.push(byte).map_err(|_| ServoError::Truncated {
            expected: MAX_RESPONSE_LEN,
            actual: frame.len(),
        })?;
    }
    Ok(())
}

/// Wait for and decode one status packet
///
/// The caller clears stale bytes and its own echo before calling. Only
/// framing is checked here; id and status byte are the caller's concern.
pub fn wait_response<T: ByteTransport, D: DelayNs>(
    transport: &mut T,
    delay: &mut D,
    timeouts: &ResponseTimeouts,
    expected_id: u8,
) -> Result<ResponseFrame> {
    let mut frame: Vec<u8, MAX_RESPONSE_LEN> = Vec::new();
    let mut state = WaitState::AwaitingHeader;

    loop {
        state = match state {
            WaitState::AwaitingHeader => {
                if !poll_until(
                    transport,
                    delay,
                    HEADER_LEN,
                    timeouts.header_retries,
                    timeouts.header_poll_us,
                ) {
                    warn!(
                        "Servo {}: no header after {} retries ({} bytes queued)",
                        expected_id,
                        timeouts.header_retries,
                        transport.available()
                    );
                    return Err(ServoError::Timeout {
                        id: expected_id,
                        stage: WaitStage::Header,
                    });
                }

                take_into(transport, &mut frame, HEADER_LEN)?;
                let header = [frame[0], frame[1]];
                let (id, length) = (frame[2], frame[3]);
                if header != HEADER {
                    return Err(ServoError::InvalidHeader { id, header });
                }
                // Remaining bytes stay queued; the next exchange flushes them
                ResponseFrame::check_length(id, length)?;
                WaitState::AwaitingBody { length }
            }
            WaitState::AwaitingBody { length } => {
                let needed = length as usize;
                if !poll_until(
                    transport,
                    delay,
                    needed,
                    timeouts.body_retries,
                    timeouts.body_poll_us,
                ) {
                    warn!(
                        "Servo {}: got {} of {} body bytes",
                        expected_id,
                        transport.available(),
                        needed
                    );
                    return Err(ServoError::Timeout {
                        id: expected_id,
                        stage: WaitStage::Body,
                    });
                }

                take_into(transport, &mut frame, needed)?;
                WaitState::Decoding
            }
            WaitState::Decoding => {
                let response = ResponseFrame::parse(&frame)?;
                debug!("Received {:02X?}", frame.as_slice());
                return Ok(response);
            }
        };
    }
}
