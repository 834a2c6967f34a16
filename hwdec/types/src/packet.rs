/*!
    Compressed packets handed to the parser.
*/

use bitflags::bitflags;

use crate::Pts;

bitflags! {
    /**
        Flags attached to a compressed packet.
    */
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct PacketFlags: u32 {
        /// Last packet of the stream; the parser drains all pending pictures.
        const END_OF_STREAM = 1 << 0;
        /// The packet carries a valid presentation timestamp.
        const TIMESTAMP = 1 << 1;
        /// The packet follows a discontinuity (e.g. a seek).
        const DISCONTINUITY = 1 << 2;
    }
}

/**
    A compressed packet borrowed for the duration of one decode call.
*/
#[derive(Clone, Copy, Debug)]
pub struct SourcePacket<'a> {
    /// Compressed bytes, empty for the end-of-stream packet
    pub payload: &'a [u8],
    /// Presentation timestamp in clock-rate ticks
    pub pts: Pts,
    /// Packet flags
    pub flags: PacketFlags,
}

impl<'a> SourcePacket<'a> {
    /**
        Create a packet carrying a valid timestamp.

        An empty payload is automatically flagged as end of stream.
    */
    pub fn new(payload: &'a [u8], pts: Pts) -> Self {
        let mut flags = PacketFlags::TIMESTAMP;
        if payload.is_empty() {
            flags |= PacketFlags::END_OF_STREAM;
        }
        Self {
            payload,
            pts,
            flags,
        }
    }

    /**
        Create the zero-length packet that signals the end of the stream.
    */
    pub fn end_of_stream() -> Self {
        Self {
            payload: &[],
            pts: Pts(0),
            flags: PacketFlags::END_OF_STREAM,
        }
    }

    /**
        Add flags to this packet.
    */
    pub fn with_flags(mut self, flags: PacketFlags) -> Self {
        self.flags |= flags;
        self
    }

    /**
        Returns true if this packet ends the stream.
    */
    #[inline]
    pub fn is_end_of_stream(&self) -> bool {
        self.payload.is_empty() || self.flags.contains(PacketFlags::END_OF_STREAM)
    }
}
