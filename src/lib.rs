pub mod channel;
pub mod clock;
pub mod config;
pub mod device;
pub mod error;
pub mod status;

pub use channel::Channel;
pub use clock::{Clock, SystemClock};
pub use config::{ChannelConfig, SendTiming};
pub use device::{AcquireError, Device, Port};
pub use error::{ChannelError, Result};
pub use status::OpenStatus;
