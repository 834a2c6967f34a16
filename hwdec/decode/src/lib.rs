/*!
    Decoder sessions for the hwdec harness.

    A [`DecoderSession`] accepts compressed packets, drives an external
    bitstream parser, decodes pictures on a hardware or software backend and
    hands out decoded frames in display order. It reconfigures itself when
    the stream changes resolution.

    # Features

    - `videotoolbox`: Enable VideoToolbox acceleration of the ffmpeg codec (macOS)
    - `vaapi`: Enable VAAPI acceleration of the ffmpeg codec (Linux)
    - `cuda`: Enable CUDA/NVDEC acceleration of the ffmpeg codec (NVIDIA)

    # Example

    ```ignore
    use hwdec_decode::{Backend, DecoderConfig, DecoderSession};
    use hwdec_types::{CodecId, SourcePacket};

    let config = DecoderConfig::software(CodecId::H264);
    let backend = Backend::ffmpeg(&config)?;
    let mut session = DecoderSession::new(config, parser, backend)?;

    for (payload, pts) in packets {
        session.decode(&SourcePacket::new(&payload, pts))?;
        while let Some(frame) = session.get_frame() {
            // Process frame
            session.release_frame(&frame)?;
        }
    }

    // Flush remaining frames
    session.decode(&SourcePacket::end_of_stream())?;
    while let Some(frame) = session.get_frame() {
        session.release_frame(&frame)?;
    }
    ```

    # Memory Placement

    Where frames end up is chosen with [`MemoryKind`](hwdec_types::MemoryKind):
    driver surfaces mapped in place, copies in device memory, copies in host
    memory, or not mapped at all. Device memory is reached through a
    [`DeviceStream`]; [`HostStream`] emulates one in host memory.
*/

pub use hwdec_types::{Error, Result};

mod assembler;
mod backend;
mod config;
mod device;
mod geometry;
mod parser;
mod pool;
mod queue;
mod sei;
mod session;

pub use assembler::{Destination, PlaneCopy, PlaneSource, copy_planes, plan};
pub use backend::{
    Backend, CodecPacket, DecodeCaps, DecoderCreateInfo, FfmpegCodec, HardwareBackend, HwDecoder,
    MappedFrame, PlanarFrame, Received, SoftwareBackend, SoftwareCodec, SurfaceLayout,
};
pub use config::{
    BackendKind, DEFAULT_CLOCK_RATE, DEFAULT_DECODE_THREADS, DecoderConfig, HwDevice,
    ParserParams, Threading,
};
pub use device::{Copy2d, CopySource, DeviceBuffer, DevicePtr, DeviceStream, HostStream};
pub use geometry::{Geometry, validate_crop};
pub use parser::{ParserCallbacks, VideoParser};
pub use pool::{DecodedFrame, Evicted, FramePool, MappedPicture, Surface};
pub use queue::WorkQueue;
pub use sei::{SeiSink, forwards_sei};
pub use session::{
    DecodeStatus, DecoderSession, FlushHandle, ReconfigureFlush, SessionState,
};
