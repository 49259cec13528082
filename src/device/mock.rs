//! Scripted in-memory device for unit tests.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use crate::status::OpenStatus;

use super::{AcquireError, Device, Port};

/// How long written data takes to drain, measured in `bytes_to_write` polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drain {
    /// The output queue empties as soon as the write returns.
    Immediate,
    /// The queue reports pending bytes for this many polls after each write.
    AfterPolls(u32),
    /// The queue never empties.
    Never,
}

/// Call counters and scripted behaviour, shared between the device and its port.
#[derive(Debug)]
pub struct MockState {
    pub acquires: u32,
    pub releases: u32,
    pub reads: u32,
    pub clears: u32,
    pub purges: u32,
    pub writes: Vec<Vec<u8>>,
    pub armed: bool,

    /// Returned by the next acquire.
    pub acquire_error: Option<AcquireError>,
    pub fail_buffers: bool,
    pub fail_line: bool,
    pub fail_arm: bool,
    pub fail_purge: bool,
    pub buffer_flags: OpenStatus,
    pub line_flags: OpenStatus,
    /// Cap on bytes accepted per write.
    pub write_limit: Option<usize>,
    pub drain: Drain,
    /// Write (0-based index) whose drain never finishes.
    pub stuck_write: Option<usize>,
    pub pending_polls: u32,
    pub out_queue: u32,
    pub incoming: Vec<u8>,
    /// Cap on bytes returned per read.
    pub read_limit: Option<usize>,
    pub last_baud: Option<u32>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            acquires: 0,
            releases: 0,
            reads: 0,
            clears: 0,
            purges: 0,
            writes: Vec::new(),
            armed: false,
            acquire_error: None,
            fail_buffers: false,
            fail_line: false,
            fail_arm: false,
            fail_purge: false,
            buffer_flags: OpenStatus::OK,
            line_flags: OpenStatus::OK,
            write_limit: None,
            drain: Drain::Immediate,
            stuck_write: None,
            pending_polls: 0,
            out_queue: 0,
            incoming: Vec::new(),
            read_limit: None,
            last_baud: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockDevice {
    pub state: Rc<RefCell<MockState>>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, f: impl FnOnce(&mut MockState)) {
        f(&mut self.state.borrow_mut());
    }

    pub fn state(&self) -> std::cell::Ref<'_, MockState> {
        self.state.borrow()
    }
}

impl Device for MockDevice {
    type Port = MockPort;

    fn acquire(&mut self, _channel: u32) -> Result<Self::Port, AcquireError> {
        let mut state = self.state.borrow_mut();
        if let Some(e) = state.acquire_error.take() {
            return Err(e);
        }
        state.acquires += 1;
        Ok(MockPort {
            state: Rc::clone(&self.state),
        })
    }
}

#[derive(Debug)]
pub struct MockPort {
    state: Rc<RefCell<MockState>>,
}

fn scripted_failure(what: &str) -> io::Error {
    io::Error::other(format!("scripted {what} failure"))
}

impl Port for MockPort {
    fn setup_buffers(&mut self, _recv: u32, _send: u32) -> io::Result<OpenStatus> {
        let state = self.state.borrow();
        if state.fail_buffers {
            return Err(scripted_failure("buffer"));
        }
        Ok(state.buffer_flags)
    }

    fn apply_line(&mut self, baud_rate: u32) -> io::Result<OpenStatus> {
        let mut state = self.state.borrow_mut();
        if state.fail_line {
            return Err(scripted_failure("line"));
        }
        state.last_baud = Some(baud_rate);
        Ok(state.line_flags)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.borrow_mut();
        let index = state.writes.len();
        let accepted = state.write_limit.map_or(buf.len(), |limit| buf.len().min(limit));
        state.writes.push(buf[..accepted].to_vec());
        state.out_queue = accepted as u32;
        let pending = match state.drain {
            _ if state.stuck_write == Some(index) => u32::MAX,
            Drain::Immediate => 0,
            Drain::AfterPolls(n) => n,
            Drain::Never => u32::MAX,
        };
        state.pending_polls = pending;
        if state.pending_polls == 0 {
            state.out_queue = 0;
        }
        Ok(accepted)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.borrow_mut();
        state.reads += 1;
        let available = state.incoming.len().min(buf.len());
        let n = state.read_limit.map_or(available, |limit| available.min(limit));
        buf[..n].copy_from_slice(&state.incoming[..n]);
        state.incoming.drain(..n);
        Ok(n)
    }

    fn bytes_to_write(&self) -> io::Result<u32> {
        let mut state = self.state.borrow_mut();
        if state.pending_polls == 0 {
            state.out_queue = 0;
        } else if state.pending_polls != u32::MAX {
            state.pending_polls -= 1;
        }
        Ok(state.out_queue)
    }

    fn bytes_to_read(&self) -> io::Result<u32> {
        Ok(self.state.borrow().incoming.len() as u32)
    }

    fn clear_control_lines(&mut self) -> io::Result<()> {
        self.state.borrow_mut().clears += 1;
        Ok(())
    }

    fn purge(&mut self) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        state.purges += 1;
        if state.fail_purge {
            return Err(scripted_failure("purge"));
        }
        state.out_queue = 0;
        state.pending_polls = 0;
        Ok(())
    }

    fn arm_events(&mut self) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_arm {
            return Err(scripted_failure("event mask"));
        }
        state.armed = true;
        Ok(())
    }

    fn release(self) -> io::Result<()> {
        self.state.borrow_mut().releases += 1;
        Ok(())
    }
}
