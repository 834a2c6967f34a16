/*!
    Shared types for the hwdec crates.

    This crate defines the vocabulary that crosses crate boundaries: what the
    parser reports, what the decode session hands out and how errors look.
    It has no dependency on any decoder backend.

    # Stream Description

    - [`CodecId`] and [`ChromaFormat`] - What is being decoded
    - [`VideoFormat`] - Sequence parameters reported by the parser
    - [`Rect`], [`Dim`] and [`Rational`] - Geometry and frame rates

    # Parser Records

    - [`SourcePacket`] and [`PacketFlags`] - Compressed input
    - [`PictureParams`], [`DisplayInfo`] and [`SeiMessageInfo`] - Per-picture callbacks

    # Output

    - [`SurfaceFormat`] and [`MemoryKind`] - Output pixel layout and placement
    - [`OutputSurfaceInfo`] and [`PlaneLayout`] - Caller-visible surface description
    - [`FlushMode`] - What happens to frames drained on reconfiguration

    # Error Handling

    - [`Error`] and [`Result`] - Common error types
*/

mod codec;
mod error;
mod flush;
mod format;
mod packet;
mod picture;
mod rational;
mod rect;
mod surface;
mod timestamp;
mod video_format;

pub use codec::{ChromaFormat, CodecId};
pub use error::{Error, Result};
pub use flush::FlushMode;
pub use format::{MemoryKind, SurfaceFormat};
pub use packet::{PacketFlags, SourcePacket};
pub use picture::{
    DisplayInfo, PictureParams, SEI_TYPE_TIME_CODE, SEI_TYPE_USER_DATA_UNREGISTERED, SeiMessage,
    SeiMessageInfo,
};
pub use rational::Rational;
pub use rect::{Dim, Rect};
pub use surface::{OutputSurfaceInfo, PlaneLayout};
pub use timestamp::Pts;
pub use video_format::VideoFormat;
