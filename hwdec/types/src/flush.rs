/*!
    Reconfiguration flush modes.
*/

/**
    What a flush callback does with the frames it drains when the decoder
    is reconfigured.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FlushMode {
    /// Drain and release frames without looking at them
    #[default]
    None,
    /// Write drained frames to the output file
    DumpToFile,
    /// Fold drained frames into the running checksum
    Checksum,
}

impl FlushMode {
    /**
        Pick the flush mode for a sink: dumping wins over checksumming.
    */
    pub const fn select(dump_to_file: bool, checksum: bool) -> Self {
        if dump_to_file {
            Self::DumpToFile
        } else if checksum {
            Self::Checksum
        } else {
            Self::None
        }
    }
}
