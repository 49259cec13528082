use thiserror::Error;

use crate::status::OpenStatus;

pub type Result<T> = std::result::Result<T, ChannelError>;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel {channel} failed to open: {status:?}")]
    Open { channel: u32, status: OpenStatus },

    #[error("channel is not open")]
    NotOpen,

    #[error("previous transmission still draining")]
    SendInProgress,

    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    #[error("timeout waiting for chunk at offset {offset} to drain")]
    DrainTimeout { offset: usize },

    #[error("configuration cannot change while the channel is open or faulted")]
    ConfigLocked,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChannelError {
    /// The open status carried by an open failure, or `OpenStatus::OK` for other errors.
    pub fn open_status(&self) -> OpenStatus {
        match self {
            Self::Open { status, .. } => *status,
            _ => OpenStatus::OK,
        }
    }
}
