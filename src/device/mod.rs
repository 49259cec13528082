use std::io;

use thiserror::Error;

use crate::status::OpenStatus;

#[cfg(test)]
pub mod mock;
#[cfg(feature = "serial")]
pub mod serial;

/// Why a device refused to hand out a port.
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("no such channel")]
    BadChannel,

    #[error("channel already in use")]
    InUse,

    #[error("channel not available")]
    NotAvailable,

    #[error("out of memory")]
    OutOfMemory,

    #[error("invalid parameters")]
    InvalidParams,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl AcquireError {
    /// The fatal open flag this failure maps to.
    pub fn status(&self) -> OpenStatus {
        match self {
            Self::BadChannel => OpenStatus::BAD_CHANNEL_NUMBER,
            Self::InUse => OpenStatus::CHANNEL_IN_USE,
            Self::NotAvailable | Self::Io(_) => OpenStatus::CHANNEL_NOT_AVAILABLE,
            Self::OutOfMemory => OpenStatus::NOT_ENOUGH_MEMORY,
            Self::InvalidParams => OpenStatus::INVALID_PARAMS,
        }
    }
}

/// Source of serial ports, addressed by channel number.
pub trait Device {
    type Port: Port;

    /// Take exclusive ownership of the port behind `channel`.
    fn acquire(&mut self, channel: u32) -> Result<Self::Port, AcquireError>;
}

/// An open serial port.
///
/// All calls are synchronous. Queries must not block; `read` is only asked for bytes
/// already reported by `bytes_to_read`.
pub trait Port {
    /// Size the driver queues. Returns any advisory flags for sizes the driver changed.
    fn setup_buffers(&mut self, recv: u32, send: u32) -> io::Result<OpenStatus>;

    /// Apply the baud rate with 8N1 framing and no handshaking. Returns any advisory
    /// flags for values the driver changed.
    fn apply_line(&mut self, baud_rate: u32) -> io::Result<OpenStatus>;

    /// Queue bytes for transmission. Returns the number accepted.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Read buffered bytes. Returns the number read.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Bytes still waiting in the output queue.
    fn bytes_to_write(&self) -> io::Result<u32>;

    /// Bytes waiting in the input queue.
    fn bytes_to_read(&self) -> io::Result<u32>;

    /// Deassert RTS and DTR.
    fn clear_control_lines(&mut self) -> io::Result<()>;

    /// Drop everything in both queues.
    fn purge(&mut self) -> io::Result<()>;

    /// Enable driver event notifications. Optional.
    fn arm_events(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Give the port back to the OS.
    fn release(self) -> io::Result<()>;
}
