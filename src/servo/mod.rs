// AX-12 servo bus driver
//
// Provides:
// - Interrupt/reader-fed receive ring
// - Byte transport over a serial port
// - Instruction/status packet framing
// - Bounded response waiter
// - Typed register commands

mod bus;
pub mod error;
#[cfg(test)]
pub(crate) mod mock;
pub mod protocol;
pub mod register;
pub mod ring;
pub mod transport;
pub mod waiter;

pub use bus::ServoBus;
pub use error::{Result, ServoError, WaitStage};
pub use protocol::{BROADCAST_ID, StatusFlags};
pub use register::Register;
pub use ring::ReceiveBuffer;
pub use transport::{ByteTransport, SerialTransport, StdDelay};
pub use waiter::ResponseTimeouts;
