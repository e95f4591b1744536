// Scripted bus for tests: records what was sent, answers with canned replies

use std::collections::VecDeque;

use embedded_hal::delay::DelayNs;

use super::protocol::{BROADCAST_ID, checksum};
use super::ring::ReceiveBuffer;
use super::transport::ByteTransport;

/// Fake servo bus
///
/// Each completed instruction packet (except broadcasts) releases the next
/// scripted reply. Reply bytes arrive a few at a time as the caller polls.
pub struct MockTransport {
    rx: ReceiveBuffer,
    sent: Vec<u8>,
    outgoing: Vec<u8>,
    replies: VecDeque<Vec<u8>>,
    in_flight: VecDeque<u8>,
    bytes_per_poll: usize,
    echo: Echo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Echo {
    Off,
    /// Looped back while the byte is written
    Immediate,
    /// Queued behind earlier bytes, seen only on a later poll
    Late,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            rx: ReceiveBuffer::new(),
            sent: Vec::new(),
            outgoing: Vec::new(),
            replies: VecDeque::new(),
            in_flight: VecDeque::new(),
            bytes_per_poll: usize::MAX,
            echo: Echo::Off,
        }
    }

    /// Queue raw reply bytes for the next instruction packet
    pub fn reply(mut self, bytes: &[u8]) -> Self {
        self.replies.push_back(bytes.to_vec());
        self
    }

    /// Queue a well-formed status packet
    pub fn status(self, id: u8, error: u8, params: &[u8]) -> Self {
        self.reply(&status_packet(id, error, params))
    }

    /// Release at most `n` reply bytes per poll
    pub fn trickle(mut self, n: usize) -> Self {
        self.bytes_per_poll = n;
        self
    }

    /// Loop transmitted bytes back into the receive ring
    pub fn with_echo(mut self) -> Self {
        self.echo = Echo::Immediate;
        self
    }

    /// Loop transmitted bytes back only once the caller polls, like a
    /// USB adapter whose reader lags behind the write
    pub fn late_echo(mut self) -> Self {
        self.echo = Echo::Late;
        self
    }

    /// Everything written to the bus so far
    pub fn sent(&self) -> &[u8] {
        &self.sent
    }

    pub fn rx(&self) -> &ReceiveBuffer {
        &self.rx
    }
}

/// Build a status packet with a correct checksum
pub fn status_packet(id: u8, error: u8, params: &[u8]) -> Vec<u8> {
    let mut packet = vec![0xFF, 0xFF, id, (params.len() + 2) as u8, error];
    packet.extend_from_slice(params);
    packet.push(checksum(&packet[2..]));
    packet
}

impl ByteTransport for MockTransport {
    fn send_byte(&mut self, byte: u8) -> std::io::Result<()> {
        self.sent.push(byte);
        self.outgoing.push(byte);
        match self.echo {
            Echo::Off => {}
            Echo::Immediate => self.rx.push(byte),
            Echo::Late => self.in_flight.push_back(byte),
        }

        let complete =
            self.outgoing.len() >= 4 && self.outgoing.len() == 4 + self.outgoing[3] as usize;
        if complete {
            let broadcast = self.outgoing[2] == BROADCAST_ID;
            self.outgoing.clear();
            if !broadcast {
                if let Some(reply) = self.replies.pop_front() {
                    self.in_flight.extend(reply);
                }
            }
        }
        Ok(())
    }

    fn available(&mut self) -> usize {
        let n = self.bytes_per_poll.min(self.in_flight.len());
        for byte in self.in_flight.drain(..n) {
            self.rx.push(byte);
        }
        self.rx.available()
    }

    fn take(&mut self) -> Option<u8> {
        self.rx.take()
    }

    fn reset_input(&mut self) {
        self.rx.reset();
    }
}

/// Delay that only counts how long it was asked to wait
#[derive(Debug, Default)]
pub struct FakeDelay {
    pub elapsed_ns: u64,
    pub calls: usize,
}

impl DelayNs for FakeDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += ns as u64;
        self.calls += 1;
    }
}
