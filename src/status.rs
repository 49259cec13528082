use bitflags::bitflags;

bitflags! {
    /// Outcome of opening a channel.
    ///
    /// The low byte holds fatal conditions. Bits from `0x100` upward are advisory: the
    /// driver substituted a nearby supported value and the channel is still usable.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpenStatus: u32 {
        const BAD_CHANNEL_NUMBER      = 0x0000_0001;
        const CHANNEL_IN_USE          = 0x0000_0002;
        const CHANNEL_NOT_AVAILABLE   = 0x0000_0004;
        const NOT_ENOUGH_MEMORY       = 0x0000_0008;
        const INVALID_PARAMS          = 0x0000_0010;
        const BAD_BUFFER_SIZE         = 0x0000_0020;

        const BAUD_ADJUSTED           = 0x0000_0100;
        const BITS_ADJUSTED           = 0x0000_0200;
        const STOP_ADJUSTED           = 0x0000_0400;
        const PARITY_ADJUSTED         = 0x0000_0800;
        const MODE_ADJUSTED           = 0x0000_1000;
        const RECEIVE_BUFFER_ADJUSTED = 0x0000_2000;
        const SEND_BUFFER_ADJUSTED    = 0x0000_4000;
    }
}

impl OpenStatus {
    /// No flags set: opened exactly as requested.
    pub const OK: Self = Self::empty();

    /// Every fatal flag. A status is a failure iff it intersects this mask.
    pub const ERROR: Self = Self::BAD_CHANNEL_NUMBER
        .union(Self::CHANNEL_IN_USE)
        .union(Self::CHANNEL_NOT_AVAILABLE)
        .union(Self::NOT_ENOUGH_MEMORY)
        .union(Self::INVALID_PARAMS)
        .union(Self::BAD_BUFFER_SIZE);

    /// Every "adjusted" flag.
    pub const ADVISORY: Self = Self::BAUD_ADJUSTED
        .union(Self::BITS_ADJUSTED)
        .union(Self::STOP_ADJUSTED)
        .union(Self::PARITY_ADJUSTED)
        .union(Self::MODE_ADJUSTED)
        .union(Self::RECEIVE_BUFFER_ADJUSTED)
        .union(Self::SEND_BUFFER_ADJUSTED);

    pub fn is_error(self) -> bool {
        self.intersects(Self::ERROR)
    }

    pub fn fatal(self) -> Self {
        self & Self::ERROR
    }

    pub fn advisory(self) -> Self {
        self & Self::ADVISORY
    }
}
