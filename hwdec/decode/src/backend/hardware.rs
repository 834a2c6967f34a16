/*!
    Hardware decode backend.

    Drives a vendor decoder through [`HwDecoder`] and turns displayed
    pictures into pool slots according to the session's memory kind.
*/

use std::sync::Arc;

use tracing::{debug, warn};

use hwdec_types::{
    ChromaFormat, CodecId, Dim, Error, MemoryKind, PictureParams, Pts, Rect, Result,
    SurfaceFormat,
};

use crate::assembler::{self, PlaneSource};
use crate::device::{DeviceBuffer, DevicePtr, DeviceStream};
use crate::geometry::Geometry;
use crate::pool::{Evicted, FramePool, MappedPicture, Surface};

/**
    What the hardware supports for one codec, chroma format and bit depth.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodeCaps {
    pub supported: bool,
    pub min_width: u32,
    pub min_height: u32,
    pub max_width: u32,
    pub max_height: u32,
}

impl DecodeCaps {
    /**
        Returns true if a `width` x `height` stream fits within the limits.
    */
    pub fn fits(&self, width: u32, height: u32) -> bool {
        (self.min_width..=self.max_width).contains(&width)
            && (self.min_height..=self.max_height).contains(&height)
    }
}

/**
    Parameters for creating or reconfiguring the hardware decoder.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecoderCreateInfo {
    pub device_id: u32,
    pub codec: CodecId,
    pub chroma_format: ChromaFormat,
    pub bit_depth_minus8: u8,
    pub surface_format: SurfaceFormat,
    /// Coded size of the current sequence
    pub coded: Dim,
    /// Largest coded size the decoder must be able to handle
    pub max: Dim,
    pub display_area: Rect,
    /// Output size after cropping
    pub target: Dim,
    pub num_decode_surfaces: u32,
}

/**
    Pitch and vertical stride of the decoder's output surfaces.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceLayout {
    pub pitch: u32,
    pub vstride: u32,
}

/**
    A decoded picture mapped into device memory.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MappedFrame {
    pub ptr: DevicePtr,
    pub pitch: u32,
    pub vstride: u32,
}

/**
    Vendor hardware decoder.

    The decoder is closed when the implementation is dropped.
*/
pub trait HwDecoder: Send {
    fn capabilities(
        &self,
        codec: CodecId,
        chroma_format: ChromaFormat,
        bit_depth_minus8: u8,
    ) -> Result<DecodeCaps>;

    fn create(&mut self, info: &DecoderCreateInfo) -> Result<SurfaceLayout>;

    fn decode_picture(&mut self, params: &PictureParams<'_>) -> Result<()>;

    /**
        Map the decoded picture in slot `picture_index`. Luma starts at the
        returned pointer, chroma planes follow at `pitch * vstride`.
    */
    fn map_picture(&mut self, picture_index: u32) -> Result<MappedFrame>;

    fn unmap_picture(&mut self, picture_index: u32) -> Result<()>;

    fn reconfigure(&mut self, info: &DecoderCreateInfo) -> Result<SurfaceLayout>;

    /**
        Stream used for copies out of mapped pictures.
    */
    fn stream(&self) -> Arc<dyn DeviceStream>;
}

/**
    Start of every plane of a mapped picture.
*/
fn mapped_planes(geometry: &Geometry, frame: &MappedFrame) -> (Vec<usize>, Vec<PlaneSource<'static>>) {
    let format = geometry.surface_format;
    let pitch = frame.pitch as usize;
    let chroma_pitch = pitch * format.chroma_components() as usize
        / format.chroma_width_divisor() as usize;
    let chroma_vstride = frame
        .vstride
        .div_ceil(format.chroma_height_divisor()) as usize;
    let luma_size = pitch * frame.vstride as usize;

    let mut pitches = vec![pitch];
    let mut sources = vec![PlaneSource::Device(frame.ptr)];
    for plane in 0..geometry.num_chroma_planes as usize {
        pitches.push(chroma_pitch);
        sources.push(PlaneSource::Device(
            frame.ptr.add(luma_size + plane * chroma_pitch * chroma_vstride),
        ));
    }
    (pitches, sources)
}

pub struct HardwareBackend {
    decoder: Box<dyn HwDecoder>,
    stream: Arc<dyn DeviceStream>,
    created: bool,
}

impl HardwareBackend {
    pub fn new(decoder: Box<dyn HwDecoder>) -> Self {
        let stream = decoder.stream();
        Self {
            decoder,
            stream,
            created: false,
        }
    }

    /**
        Check support, then create the decoder. Returns the layout of its
        output surfaces.
    */
    pub fn configure(&mut self, info: &DecoderCreateInfo) -> Result<SurfaceLayout> {
        let caps = self
            .decoder
            .capabilities(info.codec, info.chroma_format, info.bit_depth_minus8)?;
        if !caps.supported {
            return Err(Error::unsupported(format!(
                "{} {:?} at {} bits is not supported by device {}",
                info.codec.name(),
                info.chroma_format,
                info.bit_depth_minus8 + 8,
                info.device_id
            )));
        }
        if !caps.fits(info.coded.width, info.coded.height) {
            return Err(Error::unsupported(format!(
                "{}x{} is outside the supported range {}x{} to {}x{}",
                info.coded.width,
                info.coded.height,
                caps.min_width,
                caps.min_height,
                caps.max_width,
                caps.max_height
            )));
        }
        let layout = self.decoder.create(info)?;
        self.created = true;
        debug!(?layout, "hardware decoder created");
        Ok(layout)
    }

    pub fn reconfigure(&mut self, info: &DecoderCreateInfo) -> Result<SurfaceLayout> {
        if !self.created {
            return Err(Error::runtime("reconfigure before the decoder was created"));
        }
        let layout = self.decoder.reconfigure(info)?;
        debug!(?layout, "hardware decoder reconfigured");
        Ok(layout)
    }

    pub fn decode(&mut self, params: &PictureParams<'_>) -> Result<()> {
        self.decoder.decode_picture(params)
    }

    /**
        Turn the displayed picture into a pool slot.
    */
    pub fn display(
        &mut self,
        pts: Pts,
        picture_index: u32,
        geometry: &Geometry,
        pool: &FramePool,
    ) -> Result<()> {
        match pool.mem_kind() {
            MemoryKind::NotMapped => {
                pool.materialize(pts, picture_index, 0, || Ok(Surface::NotMapped), |_| Ok(()))
            }
            MemoryKind::DeviceInternal => {
                let frame = self.decoder.map_picture(picture_index)?;
                let len = geometry
                    .with_surface_layout(frame.pitch, frame.vstride)
                    .surface_size();
                let mapped = MappedPicture {
                    picture_index,
                    ptr: frame.ptr,
                    pitch: frame.pitch,
                    vstride: frame.vstride,
                    len,
                    stream: Arc::clone(&self.stream),
                };
                let result = pool.materialize(
                    pts,
                    picture_index,
                    len,
                    || Ok(Surface::Mapped(mapped)),
                    |_| Ok(()),
                );
                if result.is_err() {
                    self.unmap(picture_index);
                }
                result
            }
            MemoryKind::DeviceCopied | MemoryKind::HostCopied => {
                let frame = self.decoder.map_picture(picture_index)?;
                let result = self.copy_out(pts, picture_index, &frame, geometry, pool);
                self.decoder.unmap_picture(picture_index)?;
                result
            }
        }
    }

    fn copy_out(
        &self,
        pts: Pts,
        picture_index: u32,
        frame: &MappedFrame,
        geometry: &Geometry,
        pool: &FramePool,
    ) -> Result<()> {
        let (pitches, sources) = mapped_planes(geometry, frame);
        let plan = assembler::plan(geometry, &pitches)?;
        let frame_size = geometry.frame_size();
        let stream = &self.stream;

        if pool.mem_kind() == MemoryKind::DeviceCopied {
            pool.materialize(
                pts,
                picture_index,
                frame_size,
                || Ok(Surface::Device(DeviceBuffer::alloc(stream, frame_size)?)),
                |surface| assembler::fill_surface(surface, &plan, &sources, Some(stream)),
            )
        } else {
            pool.materialize(
                pts,
                picture_index,
                frame_size,
                || Ok(Surface::Host(vec![0u8; frame_size].into_boxed_slice())),
                |surface| assembler::fill_surface(surface, &plan, &sources, Some(stream)),
            )
        }
    }

    /**
        Give back the driver resources of an evicted slot.
    */
    pub fn release(&mut self, evicted: &Evicted) -> Result<()> {
        if let Surface::Mapped(mapped) = evicted.surface.as_ref() {
            self.decoder.unmap_picture(mapped.picture_index)?;
        }
        Ok(())
    }

    fn unmap(&mut self, picture_index: u32) {
        if let Err(e) = self.decoder.unmap_picture(picture_index) {
            warn!(picture_index, "failed to unmap picture: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use hwdec_types::{Rational, VideoFormat};

    use super::*;

    fn geometry(format: SurfaceFormat, chroma: ChromaFormat) -> Geometry {
        let video = VideoFormat {
            codec: CodecId::Hevc,
            chroma_format: chroma,
            bit_depth_luma_minus8: 0,
            bit_depth_chroma_minus8: 0,
            coded_width: 64,
            coded_height: 32,
            display_area: Rect::from_size(64, 32),
            frame_rate: Rational::new(25, 1),
            progressive: true,
            min_num_decode_surfaces: 4,
            max_size: None,
        };
        Geometry::derive(&video, format, None).unwrap()
    }

    fn frame() -> MappedFrame {
        MappedFrame {
            ptr: DevicePtr::new(9),
            pitch: 128,
            vstride: 48,
        }
    }

    #[test]
    fn semi_planar_chroma_follows_luma() {
        let geometry = geometry(SurfaceFormat::Nv12, ChromaFormat::Yuv420);
        let (pitches, sources) = mapped_planes(&geometry, &frame());
        assert_eq!(pitches, vec![128, 128]);
        match sources[1] {
            PlaneSource::Device(ptr) => assert_eq!(ptr.offset, 128 * 48),
            PlaneSource::Host(_) => panic!("expected a device plane"),
        }
    }

    #[test]
    fn planar_444_chroma_planes_are_consecutive() {
        let geometry = geometry(SurfaceFormat::Yuv444, ChromaFormat::Yuv444);
        let (pitches, sources) = mapped_planes(&geometry, &frame());
        assert_eq!(pitches, vec![128, 128, 128]);
        let offsets: Vec<usize> = sources
            .iter()
            .map(|source| match source {
                PlaneSource::Device(ptr) => ptr.offset,
                PlaneSource::Host(_) => usize::MAX,
            })
            .collect();
        assert_eq!(offsets, vec![0, 128 * 48, 2 * 128 * 48]);
    }

    #[test]
    fn monochrome_has_only_luma() {
        let geometry = geometry(SurfaceFormat::Nv12, ChromaFormat::Monochrome);
        let (pitches, sources) = mapped_planes(&geometry, &frame());
        assert_eq!(pitches.len(), 1);
        assert_eq!(sources.len(), 1);
    }

    #[test]
    fn caps_bounds() {
        let caps = DecodeCaps {
            supported: true,
            min_width: 64,
            min_height: 64,
            max_width: 4096,
            max_height: 2304,
        };
        assert!(caps.fits(1920, 1080));
        assert!(!caps.fits(32, 1080));
        assert!(!caps.fits(4096, 4096));
    }
}
