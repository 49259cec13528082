use std::io;

use log::{debug, info, trace, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{ChannelConfig, SendTiming};
use crate::device::{Device, Port};
use crate::error::{ChannelError, Result};
use crate::status::OpenStatus;

/// Baud rate every standard rate divides evenly. Rates that don't are flagged as adjusted.
pub const REFERENCE_BAUD: u32 = 115_200;

/// Lifecycle of a channel. The port exists only while open.
enum State<P> {
    Closed,
    Open(P),
    Errored,
}

/// A serial channel session.
///
/// Owns the port while open and releases it on `close` or drop. All calls are
/// synchronous; only a chunked `send` blocks, and only until each chunk drains or
/// times out.
pub struct Channel<D: Device, C: Clock = SystemClock> {
    device: D,
    clock: C,
    timing: SendTiming,
    config: ChannelConfig,
    state: State<D::Port>,
}

impl<D: Device> Channel<D, SystemClock> {
    /// Create a closed channel. `config` is used by [`Channel::open_pending`].
    pub fn new(device: D, config: ChannelConfig) -> Self {
        Self::with_clock(device, config, SystemClock::new())
    }

    /// Create a channel and open it right away.
    ///
    /// A failed open is logged, not returned. Check [`Channel::valid`] before use.
    pub fn connect(device: D, config: ChannelConfig) -> Self {
        let mut channel = Self::new(device, config);
        match channel.open_pending() {
            Ok(status) if !status.is_empty() => {
                info!("channel {} open with adjustments: {:?}", config.channel_id, status)
            }
            Ok(_) => {}
            Err(e) => warn!("{}", e),
        }
        channel
    }
}

impl<D: Device, C: Clock> Channel<D, C> {
    pub fn with_clock(device: D, config: ChannelConfig, clock: C) -> Self {
        Self {
            device,
            clock,
            timing: SendTiming::default(),
            config,
            state: State::Closed,
        }
    }

    pub fn with_timing(mut self, timing: SendTiming) -> Self {
        self.timing = timing;
        self
    }

    /// The negotiated config while open, otherwise the pending one.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, State::Open(_))
    }

    pub fn is_errored(&self) -> bool {
        matches!(self.state, State::Errored)
    }

    /// True when the channel is open and usable for I/O.
    pub fn valid(&self) -> bool {
        self.is_open()
    }

    // --- Lifecycle ---

    /// Open the channel described by `config`.
    ///
    /// On success returns the advisory flags (empty if nothing was adjusted). On failure
    /// the error carries the fatal flags and the channel is left errored with no port
    /// held. Opening an already open channel fails with `CHANNEL_IN_USE` and changes
    /// nothing.
    pub fn open(&mut self, config: ChannelConfig) -> Result<OpenStatus> {
        if self.is_open() {
            return Err(ChannelError::Open {
                channel: config.channel_id,
                status: OpenStatus::CHANNEL_IN_USE,
            });
        }

        match self.negotiate(&config) {
            Ok((port, status)) => {
                self.config = config;
                self.state = State::Open(port);
                info!(
                    "channel {} open at {} baud",
                    config.channel_id, config.baud_rate
                );
                if let State::Open(port) = &mut self.state
                    && let Err(e) = port.arm_events()
                {
                    warn!("channel {}: event mask not set: {}", config.channel_id, e);
                }
                Ok(status)
            }
            Err(status) => {
                self.state = State::Errored;
                warn!("channel {} failed to open: {:?}", config.channel_id, status);
                Err(ChannelError::Open {
                    channel: config.channel_id,
                    status,
                })
            }
        }
    }

    /// Open using the pending config.
    pub fn open_pending(&mut self) -> Result<OpenStatus> {
        self.open(self.config)
    }

    /// Acquire and configure a port. The port is released on every failure path.
    fn negotiate(
        &mut self,
        config: &ChannelConfig,
    ) -> std::result::Result<(D::Port, OpenStatus), OpenStatus> {
        if config.channel_id == 0 {
            return Err(OpenStatus::BAD_CHANNEL_NUMBER);
        }
        if config.baud_rate == 0 {
            return Err(OpenStatus::INVALID_PARAMS);
        }
        if config.send_buffer_capacity == 0 || config.recv_buffer_capacity == 0 {
            return Err(OpenStatus::BAD_BUFFER_SIZE);
        }

        let mut port = self
            .device
            .acquire(config.channel_id)
            .map_err(|e| {
                debug!("channel {}: acquire failed: {}", config.channel_id, e);
                e.status()
            })?;

        let mut status = OpenStatus::OK;

        match port.setup_buffers(config.recv_buffer_capacity, config.send_buffer_capacity) {
            Ok(adjusted) => status |= adjusted.advisory(),
            Err(e) => {
                debug!("channel {}: buffer setup failed: {}", config.channel_id, e);
                release_quietly(port, config.channel_id);
                return Err(OpenStatus::BAD_BUFFER_SIZE);
            }
        }

        match port.apply_line(config.baud_rate) {
            Ok(adjusted) => status |= adjusted.advisory(),
            Err(e) => {
                debug!("channel {}: line setup failed: {}", config.channel_id, e);
                release_quietly(port, config.channel_id);
                return Err(OpenStatus::INVALID_PARAMS);
            }
        }

        if REFERENCE_BAUD % config.baud_rate != 0 {
            status |= OpenStatus::BAUD_ADJUSTED;
        }

        Ok((port, status))
    }

    /// Close the channel.
    ///
    /// Lowers the control lines, purges both queues and releases the port. The channel
    /// ends up closed even if a step fails; the first failure is returned.
    pub fn close(&mut self) -> Result<()> {
        let mut port = match std::mem::replace(&mut self.state, State::Closed) {
            State::Open(port) => port,
            other => {
                self.state = other;
                return Err(ChannelError::NotOpen);
            }
        };

        let lines = port.clear_control_lines();
        let purge = port.purge();
        let release = port.release();

        info!("channel {} closed", self.config.channel_id);
        lines.and(purge).and(release).map_err(ChannelError::Io)
    }

    // --- Configuration ---

    /// Change the pending channel number. Only allowed while closed.
    pub fn set_channel(&mut self, channel_id: u32) -> Result<()> {
        self.ensure_closed()?;
        self.config.channel_id = channel_id;
        Ok(())
    }

    /// Change the pending baud rate. Only allowed while closed.
    pub fn set_baud(&mut self, baud_rate: u32) -> Result<()> {
        self.ensure_closed()?;
        self.config.baud_rate = baud_rate;
        Ok(())
    }

    fn ensure_closed(&self) -> Result<()> {
        match self.state {
            State::Closed => Ok(()),
            _ => Err(ChannelError::ConfigLocked),
        }
    }

    // --- Receive ---

    /// Bytes waiting in the input queue. Zero when not open.
    pub fn recv_ready(&self) -> u32 {
        let State::Open(port) = &self.state else {
            return 0;
        };
        port.bytes_to_read().unwrap_or_else(|e| {
            warn!("input queue query failed: {}", e);
            0
        })
    }

    /// Read whatever is already buffered into `buf`, replacing its contents.
    ///
    /// Never blocks: with nothing pending, returns 0 without reading. Returns the
    /// final length of `buf`.
    pub fn recv(&mut self, buf: &mut Vec<u8>) -> usize {
        let ready = self.recv_ready() as usize;
        if ready == 0 {
            return 0;
        }
        let State::Open(port) = &mut self.state else {
            return 0;
        };

        *buf = vec![0u8; ready];
        let n = port.read(buf).unwrap_or_else(|e| {
            warn!("read failed: {}", e);
            0
        });
        buf.truncate(n.min(ready));
        trace!("RX: {:02X?}", buf);
        buf.len()
    }

    // --- Send ---

    /// True while the output queue still holds bytes. False when not open.
    pub fn send_in_progress(&self) -> bool {
        let State::Open(port) = &self.state else {
            return false;
        };
        match port.bytes_to_write() {
            Ok(n) => n != 0,
            Err(e) => {
                warn!("output queue query failed: {}", e);
                false
            }
        }
    }

    /// Transmit `data`.
    ///
    /// Payloads smaller than the send buffer go out in one write and return without
    /// waiting for the hardware. Larger payloads are split into buffer-sized chunks, and
    /// each chunk must drain before its deadline. The first failing chunk aborts the
    /// send; bytes already written are not recalled.
    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.is_open() {
            return Err(ChannelError::NotOpen);
        }
        if data.is_empty() {
            return Ok(());
        }
        if self.send_in_progress() {
            return Err(ChannelError::SendInProgress);
        }

        let capacity = self.config.send_buffer_capacity as usize;
        if data.len() < capacity {
            return self.write_chunk(data);
        }

        for (index, chunk) in data.chunks(capacity).enumerate() {
            let offset = index * capacity;
            debug!(
                "chunk {} at offset {}: {} of {} bytes",
                index,
                offset,
                chunk.len(),
                data.len()
            );
            let written = self.write_chunk(chunk);
            let drained = self.wait_for_drain(chunk.len());
            written?;
            if !drained {
                warn!("chunk at offset {} did not drain in time", offset);
                return Err(ChannelError::DrainTimeout { offset });
            }
        }
        Ok(())
    }

    /// Send a single byte.
    pub fn send_byte(&mut self, byte: u8) -> Result<()> {
        self.send(&[byte])
    }

    /// Send the bytes produced by an iterator.
    pub fn send_iter<I: IntoIterator<Item = u8>>(&mut self, bytes: I) -> Result<()> {
        let data: Vec<u8> = bytes.into_iter().collect();
        self.send(&data)
    }

    /// One write; succeeds only if the whole slice was accepted.
    fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        let State::Open(port) = &mut self.state else {
            return Err(ChannelError::NotOpen);
        };
        trace!("TX: {:02X?}", chunk);
        let written = match port.write(chunk) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => 0,
            Err(e) => return Err(ChannelError::Io(e)),
        };
        if written != chunk.len() {
            return Err(ChannelError::ShortWrite {
                written,
                expected: chunk.len(),
            });
        }
        Ok(())
    }

    /// Poll until the output queue is empty or the chunk's deadline passes.
    ///
    /// Returns false once the deadline has passed, even if the queue is empty by then.
    fn wait_for_drain(&self, chunk_len: usize) -> bool {
        let deadline =
            self.clock.now() + self.config.transmit_time(chunk_len) + self.timing.margin;

        let mut polls: u32 = 0;
        loop {
            let timed_out = self.clock.now() > deadline;
            if timed_out || !self.send_in_progress() {
                return !timed_out;
            }
            polls = polls.wrapping_add(1);
            self.clock.pause(self.timing.pause_for(polls));
        }
    }
}

/// Release a port on an open failure path, logging any error.
fn release_quietly<P: Port>(port: P, channel: u32) {
    if let Err(e) = port.release() {
        warn!("channel {}: release after failed open: {}", channel, e);
    }
}

impl<D: Device, C: Clock> Drop for Channel<D, C> {
    fn drop(&mut self) {
        if self.is_open()
            && let Err(e) = self.close()
        {
            warn!("channel {}: close on drop: {}", self.config.channel_id, e);
        }
    }
}
