// Half-duplex byte transport for the servo bus
//
// Sending blocks until the byte has left the UART. Received bytes are queued
// in a ReceiveBuffer by a producer outside the caller's control flow (an
// interrupt on a microcontroller, a reader thread on a host). Since the bus
// is a single wire, our own transmitted bytes echo back into that queue.

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use serialport::SerialPort;
use tracing::{debug, warn};

use super::error::Result;
use super::ring::ReceiveBuffer;
use crate::config::{DEFAULT_BAUDRATE, READ_POLL_MS};

/// Byte-level access to the shared bus
pub trait ByteTransport {
    /// Write one byte and wait for transmission to complete
    fn send_byte(&mut self, byte: u8) -> io::Result<()>;

    /// Write a whole frame
    fn send_frame(&mut self, bytes: &[u8]) -> io::Result<()> {
        for &byte in bytes {
            self.send_byte(byte)?;
        }
        Ok(())
    }

    /// Number of received bytes waiting to be taken
    fn available(&mut self) -> usize;

    /// Oldest received byte, if any
    fn take(&mut self) -> Option<u8>;

    /// Drop everything received so far (echo, noise, stale replies)
    fn reset_input(&mut self);
}

/// Serial port transport with a background reader feeding the receive ring
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    rx: Arc<ReceiveBuffer>,
    running: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl SerialTransport {
    /// Open a serial port at the default servo baudrate
    pub fn open(port_name: &str) -> Result<Self> {
        Self::open_with_baudrate(port_name, DEFAULT_BAUDRATE)
    }

    /// Open with custom baudrate
    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(READ_POLL_MS))
            .open()?;
        let reader_port = port.try_clone()?;

        let rx = Arc::new(ReceiveBuffer::new());
        let running = Arc::new(AtomicBool::new(true));
        let reader = std::thread::Builder::new()
            .name("ax12-rx".into())
            .spawn({
                let rx = Arc::clone(&rx);
                let running = Arc::clone(&running);
                move || receive_loop(reader_port, rx, running)
            })?;

        debug!("Opened {} at {} baud", port_name, baudrate);
        Ok(Self {
            port,
            rx,
            running,
            reader: Some(reader),
        })
    }
}

/// Plays the role of the receive interrupt: every byte goes into the ring
fn receive_loop(mut port: Box<dyn SerialPort>, rx: Arc<ReceiveBuffer>, running: Arc<AtomicBool>) {
    let mut buf = [0u8; 64];
    while running.load(Ordering::Acquire) {
        match port.read(&mut buf) {
            Ok(n) => {
                for &byte in &buf[..n] {
                    rx.push(byte);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("Serial reader stopped: {}", e);
                break;
            }
        }
    }
}

impl ByteTransport for SerialTransport {
    fn send_byte(&mut self, byte: u8) -> io::Result<()> {
        self.port.write_all(&[byte])?;
        self.port.flush()
    }

    fn send_frame(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()
    }

    fn available(&mut self) -> usize {
        self.rx.available()
    }

    fn take(&mut self) -> Option<u8> {
        self.rx.take()
    }

    fn reset_input(&mut self) {
        self.rx.reset();
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(reader) = self.reader.take() {
            // Reader wakes up at least every READ_POLL_MS
            if reader.join().is_err() {
                warn!("Serial reader thread panicked");
            }
        }
    }
}

/// Blocking delay backed by the OS scheduler
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(ns as u64));
    }
}
