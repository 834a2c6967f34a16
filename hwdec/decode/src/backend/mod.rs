/*!
    Decode backends driven by a session.
*/

mod ffmpeg;
mod hardware;
mod hw;
mod software;

pub use ffmpeg::FfmpegCodec;
pub use hardware::{
    DecodeCaps, DecoderCreateInfo, HardwareBackend, HwDecoder, MappedFrame, SurfaceLayout,
};
pub use software::{CodecPacket, PlanarFrame, Received, SoftwareBackend, SoftwareCodec};

use hwdec_types::{MemoryKind, Result};

use crate::config::{BackendKind, DecoderConfig};
use crate::pool::Evicted;

/**
    The backend a session drives, chosen at construction.
*/
pub enum Backend {
    Hardware(HardwareBackend),
    Software(SoftwareBackend),
}

impl Backend {
    pub fn hardware(decoder: Box<dyn HwDecoder>) -> Self {
        Self::Hardware(HardwareBackend::new(decoder))
    }

    /**
        Software backend around an already opened codec.
    */
    pub fn software(codec: Box<dyn SoftwareCodec>, config: &DecoderConfig) -> Result<Self> {
        SoftwareBackend::new(codec, config.threading, None).map(Self::Software)
    }

    /**
        Software backend around an ffmpeg decoder opened from `config`.
    */
    pub fn ffmpeg(config: &DecoderConfig) -> Result<Self> {
        let codec = FfmpegCodec::open(config)?;
        Self::software(Box::new(codec), config)
    }

    pub const fn kind(&self) -> BackendKind {
        match self {
            Self::Hardware(_) => BackendKind::Hardware,
            Self::Software(_) => BackendKind::Software,
        }
    }

    /**
        Returns true if frames can be placed in `mem_kind` memory.
    */
    pub const fn supports(&self, mem_kind: MemoryKind) -> bool {
        match self {
            Self::Hardware(_) => true,
            Self::Software(_) => mem_kind.is_copied(),
        }
    }

    /**
        Return the driver resources of an evicted slot.
    */
    pub(crate) fn release(&mut self, evicted: &Evicted) -> Result<()> {
        match self {
            Self::Hardware(backend) => backend.release(evicted),
            Self::Software(_) => Ok(()),
        }
    }
}
