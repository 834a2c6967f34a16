/*!
    Decoder session configuration.
*/

use serde::{Deserialize, Serialize};

use hwdec_types::{CodecId, Error, MemoryKind, Rect, Result};

/// Clock rate used for timestamps when none is configured.
pub const DEFAULT_CLOCK_RATE: u32 = 1000;

/// Worker threads used by the ffmpeg codec when none is configured.
pub const DEFAULT_DECODE_THREADS: u32 = 4;

/**
    Hardware device type for the ffmpeg-accelerated software backend.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum HwDevice {
    /// VideoToolbox (macOS)
    VideoToolbox,
    /// VAAPI (Linux - AMD, Intel)
    Vaapi,
    /// CUDA/NVDEC (NVIDIA)
    Cuda,
}

/**
    How the software backend schedules decode work.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Threading {
    /// Decode on the caller's thread inside the decode callback
    SingleThreaded,
    /// Decode on a dedicated worker fed through a packet queue
    #[default]
    WorkerThread,
}

/**
    Which decode backend a session drives.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    /// Vendor hardware decoder behind [`HwDecoder`](crate::HwDecoder)
    #[default]
    Hardware,
    /// Software codec behind [`SoftwareCodec`](crate::SoftwareCodec)
    Software,
}

/**
    Parameters for constructing the external bitstream parser.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParserParams {
    pub codec: CodecId,
    pub clock_rate: u32,
    /// Number of pictures the parser may hold back before display
    pub max_display_delay: u32,
    /// Initial decode surface count, raised by the sequence callback
    pub max_num_decode_surfaces: u32,
    /// Report SEI messages through `on_sei`
    pub extract_sei: bool,
    /// Display every picture as soon as it is decoded
    pub force_zero_latency: bool,
}

/**
    Configuration for a decoder session.
*/
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// GPU device ordinal
    pub device_id: u32,
    /// Backend driven by the session
    pub backend: BackendKind,
    /// Scheduling of the software backend
    pub threading: Threading,
    /// Where output frames are placed
    pub mem_kind: MemoryKind,
    /// Codec the stream is expected to carry
    pub codec: CodecId,
    /// Output crop relative to the display area (None = whole display area)
    pub crop: Option<Rect>,
    /// Collect SEI messages and hand them to the session's SEI sink
    pub extract_sei: bool,
    /// Pictures the parser may hold back before display
    pub display_delay: u32,
    /// Display every picture as soon as it is decoded
    pub force_zero_latency: bool,
    /// Flush and rebuild on every sequence callback, even without a change
    pub force_reconfigure_flush: bool,
    /// Maximum coded width to size the decoder for (0 = from stream)
    pub max_width: u32,
    /// Maximum coded height to size the decoder for (0 = from stream)
    pub max_height: u32,
    /// Timestamp clock rate in Hz
    pub clock_rate: u32,
    /// Threads used inside the ffmpeg codec
    pub decode_threads: u32,
    /// Hardware device for the ffmpeg codec (None = pure software)
    pub hw_device: Option<HwDevice>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            device_id: 0,
            backend: BackendKind::Hardware,
            threading: Threading::WorkerThread,
            mem_kind: MemoryKind::DeviceInternal,
            codec: CodecId::H264,
            crop: None,
            extract_sei: false,
            display_delay: 1,
            force_zero_latency: false,
            force_reconfigure_flush: false,
            max_width: 0,
            max_height: 0,
            clock_rate: DEFAULT_CLOCK_RATE,
            decode_threads: DEFAULT_DECODE_THREADS,
            hw_device: None,
        }
    }
}

impl DecoderConfig {
    /**
        Create a hardware decoding config for the given codec.
    */
    pub fn new(codec: CodecId) -> Self {
        Self {
            codec,
            ..Self::default()
        }
    }

    /**
        Create a software decoding config for the given codec.

        Software decoding cannot hand out driver surfaces, so frames are
        copied to host memory.
    */
    pub fn software(codec: CodecId) -> Self {
        Self {
            codec,
            backend: BackendKind::Software,
            mem_kind: MemoryKind::HostCopied,
            ..Self::default()
        }
    }

    /**
        Parse a config from JSON. Missing fields take their default values.
    */
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::invalid_parameter(format!("decoder config: {e}")))
    }

    pub fn with_device_id(mut self, device_id: u32) -> Self {
        self.device_id = device_id;
        self
    }

    pub fn with_threading(mut self, threading: Threading) -> Self {
        self.threading = threading;
        self
    }

    pub fn with_mem_kind(mut self, mem_kind: MemoryKind) -> Self {
        self.mem_kind = mem_kind;
        self
    }

    /**
        Crop the output to `crop`, relative to the stream's display area.
    */
    pub fn with_crop(mut self, crop: Rect) -> Self {
        self.crop = (!crop.is_zero()).then_some(crop);
        self
    }

    pub fn with_sei_extraction(mut self, enabled: bool) -> Self {
        self.extract_sei = enabled;
        self
    }

    pub fn with_display_delay(mut self, delay: u32) -> Self {
        self.display_delay = delay;
        self
    }

    pub fn with_zero_latency(mut self, enabled: bool) -> Self {
        self.force_zero_latency = enabled;
        self
    }

    pub fn with_reconfigure_flush(mut self, forced: bool) -> Self {
        self.force_reconfigure_flush = forced;
        self
    }

    /**
        Size the decoder for at least `width` x `height` coded pixels.
    */
    pub fn with_max_size(mut self, width: u32, height: u32) -> Self {
        self.max_width = width;
        self.max_height = height;
        self
    }

    pub fn with_clock_rate(mut self, clock_rate: u32) -> Self {
        self.clock_rate = clock_rate;
        self
    }

    pub fn with_decode_threads(mut self, threads: u32) -> Self {
        self.decode_threads = threads;
        self
    }

    pub fn with_hw_device(mut self, device: HwDevice) -> Self {
        self.hw_device = Some(device);
        self
    }

    /**
        Check the config for combinations no backend can honour.
    */
    pub fn validate(&self) -> Result<()> {
        if let Some(crop) = &self.crop {
            crate::geometry::validate_crop(crop)?;
        }
        if self.clock_rate == 0 {
            return Err(Error::invalid_parameter("clock rate must be non-zero"));
        }
        if self.backend == BackendKind::Software
            && matches!(
                self.mem_kind,
                MemoryKind::DeviceInternal | MemoryKind::NotMapped
            )
        {
            return Err(Error::unsupported(format!(
                "software decoding does not support {:?} output",
                self.mem_kind
            )));
        }
        Ok(())
    }

    /**
        Parameters for constructing the bitstream parser for this session.
    */
    pub fn parser_params(&self) -> ParserParams {
        ParserParams {
            codec: self.codec,
            clock_rate: self.clock_rate,
            max_display_delay: if self.force_zero_latency {
                0
            } else {
                self.display_delay
            },
            max_num_decode_surfaces: 1,
            extract_sei: self.extract_sei,
            force_zero_latency: self.force_zero_latency,
        }
    }
}
