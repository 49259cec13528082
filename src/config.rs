use std::time::Duration;

/// Default serial baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 9600;
/// Default size, in bytes, requested for each driver queue.
pub const DEFAULT_BUFFER_CAPACITY: u32 = 0x10000;

/// Bits per byte on the wire with 8N1 framing (1 start + 8 data + 1 stop).
pub const BITS_PER_BYTE: u64 = 10;

/// Parameters for one serial channel.
///
/// Nothing is validated here. The device decides what it supports when the channel
/// is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Logical channel number, starting at 1.
    pub channel_id: u32,
    /// Serial baud rate.
    pub baud_rate: u32,
    /// Size of the driver's transmit queue. Larger sends are chunked to this size.
    pub send_buffer_capacity: u32,
    /// Size of the driver's receive queue.
    pub recv_buffer_capacity: u32,
}

impl ChannelConfig {
    pub fn new(channel_id: u32) -> Self {
        Self {
            channel_id,
            baud_rate: DEFAULT_BAUD_RATE,
            send_buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            recv_buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_buffer_capacities(mut self, send: u32, recv: u32) -> Self {
        self.send_buffer_capacity = send;
        self.recv_buffer_capacity = recv;
        self
    }

    /// Expected time on the wire for `bytes` at this baud rate.
    ///
    /// Zero when the baud rate is zero; such a config never opens.
    pub fn transmit_time(&self, bytes: usize) -> Duration {
        if self.baud_rate == 0 {
            return Duration::ZERO;
        }
        let bits = bytes as u64 * BITS_PER_BYTE;
        Duration::from_micros(bits * 1_000_000 / u64::from(self.baud_rate))
    }
}

/// Poll cadence for the chunked send loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendTiming {
    /// Slack added to each chunk's expected drain time.
    pub margin: Duration,
    /// Pause between ordinary polls. Zero just yields the processor.
    pub short_yield: Duration,
    /// Pause used on every `long_yield_every`-th poll.
    pub long_yield: Duration,
    pub long_yield_every: u32,
}

impl Default for SendTiming {
    fn default() -> Self {
        Self {
            margin: Duration::from_secs(1),
            short_yield: Duration::ZERO,
            long_yield: Duration::from_millis(10),
            long_yield_every: 16,
        }
    }
}

impl SendTiming {
    /// Pause to use after poll number `poll` (1-based).
    pub fn pause_for(&self, poll: u32) -> Duration {
        if self.long_yield_every != 0 && poll % self.long_yield_every == 0 {
            self.long_yield
        } else {
            self.short_yield
        }
    }
}
