use std::io;
use std::time::Duration;

use log::{debug, info, warn};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::status::OpenStatus;

use super::{AcquireError, Device, Port};

/// Line settings: 8N1, no handshaking.
const DATA_BITS: DataBits = DataBits::Eight;
const STOP_BITS: StopBits = StopBits::One;
const PARITY: Parity = Parity::None;
const FLOW_CONTROL: FlowControl = FlowControl::None;

/// Read timeout for opened ports. Reads only ever ask for bytes already queued.
const READ_TIMEOUT: Duration = Duration::from_millis(10);

#[cfg(windows)]
const DEFAULT_PREFIX: &str = "COM";
#[cfg(not(windows))]
const DEFAULT_PREFIX: &str = "/dev/ttyS";

/// A device backed by the host's native serial ports.
///
/// Channel `n` maps to `COMn` on Windows and `/dev/ttyS{n-1}` elsewhere.
#[derive(Debug, Clone)]
pub struct SerialDevice {
    prefix: String,
    zero_based: bool,
}

impl SerialDevice {
    pub fn new() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            zero_based: cfg!(not(windows)),
        }
    }

    /// Map channel `n` to `{prefix}{n-1}`, e.g. `/dev/ttyUSB` for USB adapters.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            zero_based: true,
        }
    }

    /// OS path for a channel, or `None` for channel 0.
    pub fn port_name(&self, channel: u32) -> Option<String> {
        if channel == 0 {
            return None;
        }
        let index = if self.zero_based { channel - 1 } else { channel };
        Some(format!("{}{}", self.prefix, index))
    }
}

impl Default for SerialDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for SerialDevice {
    type Port = SerialChannelPort;

    fn acquire(&mut self, channel: u32) -> Result<Self::Port, AcquireError> {
        let name = self.port_name(channel).ok_or(AcquireError::BadChannel)?;
        debug!("opening {} for channel {}", name, channel);

        // The line is configured properly once buffers are sized.
        let port = serialport::new(&name, crate::config::DEFAULT_BAUD_RATE)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(classify)?;

        info!("opened {}", name);
        Ok(SerialChannelPort { name, port })
    }
}

/// Map a `serialport` open failure onto an acquire category.
fn classify(e: serialport::Error) -> AcquireError {
    match e.kind() {
        serialport::ErrorKind::NoDevice => AcquireError::NotAvailable,
        serialport::ErrorKind::InvalidInput => AcquireError::InvalidParams,
        serialport::ErrorKind::Io(io::ErrorKind::NotFound) => AcquireError::BadChannel,
        serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied)
        | serialport::ErrorKind::Io(io::ErrorKind::AddrInUse)
        | serialport::ErrorKind::Io(io::ErrorKind::ResourceBusy) => AcquireError::InUse,
        serialport::ErrorKind::Io(io::ErrorKind::OutOfMemory) => AcquireError::OutOfMemory,
        _ => {
            warn!("unclassified open failure: {}", e);
            AcquireError::Io(e.into())
        }
    }
}

/// A channel port backed by a native serial port.
pub struct SerialChannelPort {
    name: String,
    port: Box<dyn SerialPort>,
}

impl Port for SerialChannelPort {
    fn setup_buffers(&mut self, recv: u32, send: u32) -> io::Result<OpenStatus> {
        // Queue sizes belong to the OS driver and are not adjustable here.
        debug!("{}: requested queues recv={} send={}", self.name, recv, send);
        Ok(OpenStatus::OK)
    }

    fn apply_line(&mut self, baud_rate: u32) -> io::Result<OpenStatus> {
        self.port.set_baud_rate(baud_rate)?;
        self.port.set_data_bits(DATA_BITS)?;
        self.port.set_stop_bits(STOP_BITS)?;
        self.port.set_parity(PARITY)?;
        self.port.set_flow_control(FLOW_CONTROL)?;

        // Read back what the driver actually accepted.
        let mut adjusted = OpenStatus::OK;
        if self.port.baud_rate()? != baud_rate {
            adjusted |= OpenStatus::BAUD_ADJUSTED;
        }
        if self.port.data_bits()? != DATA_BITS {
            adjusted |= OpenStatus::BITS_ADJUSTED;
        }
        if self.port.stop_bits()? != STOP_BITS {
            adjusted |= OpenStatus::STOP_ADJUSTED;
        }
        if self.port.parity()? != PARITY {
            adjusted |= OpenStatus::PARITY_ADJUSTED;
        }
        if self.port.flow_control()? != FLOW_CONTROL {
            adjusted |= OpenStatus::MODE_ADJUSTED;
        }
        if !adjusted.is_empty() {
            warn!("{}: driver adjusted line settings: {:?}", self.name, adjusted);
        }
        Ok(adjusted)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::Write::write(&mut self.port, buf)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match io::Read::read(&mut self.port, buf) {
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            other => other,
        }
    }

    fn bytes_to_write(&self) -> io::Result<u32> {
        Ok(self.port.bytes_to_write()?)
    }

    fn bytes_to_read(&self) -> io::Result<u32> {
        Ok(self.port.bytes_to_read()?)
    }

    fn clear_control_lines(&mut self) -> io::Result<()> {
        self.port.write_request_to_send(false)?;
        self.port.write_data_terminal_ready(false)?;
        Ok(())
    }

    fn purge(&mut self) -> io::Result<()> {
        Ok(self.port.clear(ClearBuffer::All)?)
    }

    fn release(self) -> io::Result<()> {
        info!("closed {}", self.name);
        drop(self.port);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_zero_has_no_port() {
        assert_eq!(SerialDevice::new().port_name(0), None);
    }

    #[test]
    fn test_prefix_mapping_is_zero_based() {
        let device = SerialDevice::with_prefix("/dev/ttyUSB");
        assert_eq!(device.port_name(1).as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(device.port_name(3).as_deref(), Some("/dev/ttyUSB2"));
    }

    #[cfg(windows)]
    #[test]
    fn test_default_mapping_windows() {
        assert_eq!(SerialDevice::new().port_name(3).as_deref(), Some("COM3"));
    }

    #[cfg(not(windows))]
    #[test]
    fn test_default_mapping_unix() {
        assert_eq!(SerialDevice::new().port_name(3).as_deref(), Some("/dev/ttyS2"));
    }

    #[test]
    fn test_acquire_channel_zero() {
        let err = SerialDevice::new().acquire(0).err();
        assert!(matches!(err, Some(AcquireError::BadChannel)));
    }

    #[test]
    fn test_classify_no_device() {
        let err = serialport::Error::new(serialport::ErrorKind::NoDevice, "gone");
        assert_eq!(classify(err).status(), OpenStatus::CHANNEL_NOT_AVAILABLE);
    }

    #[test]
    fn test_classify_busy() {
        let err = serialport::Error::new(
            serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied),
            "busy",
        );
        assert_eq!(classify(err).status(), OpenStatus::CHANNEL_IN_USE);
    }
}
