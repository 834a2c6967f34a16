/*!
    Output surface assembly.

    Copies the visible part of a decoded picture, plane by plane, into a
    packed output frame. Luma is addressed at the display origin plus the
    crop offset; chroma uses the same origin scaled by the surface format's
    subsampling. Semi-planar chroma rows carry interleaved Cb/Cr.
*/

use std::sync::Arc;

use hwdec_types::{Error, Result};

use crate::device::{Copy2d, CopySource, DevicePtr, DeviceStream};
use crate::geometry::Geometry;
use crate::pool::Surface;

/**
    One plane's worth of copying, relative to the plane's source and the
    destination frame.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaneCopy {
    /// Offset of the first copied byte within the source plane
    pub src_offset: usize,
    /// Offset of the plane within the destination frame
    pub dst_offset: usize,
    pub copy: Copy2d,
}

impl PlaneCopy {
    /**
        Returns true if source and destination rows are back to back, so a
        single linear copy suffices.
    */
    pub fn is_contiguous(&self) -> bool {
        self.copy.src_pitch == self.copy.width_bytes && self.copy.dst_pitch == self.copy.width_bytes
    }

    fn effective(&self) -> Copy2d {
        if self.is_contiguous() {
            Copy2d::linear(self.copy.width_bytes * self.copy.rows)
        } else {
            self.copy
        }
    }
}

/**
    Plan the copies for every plane of the output.

    `src_pitches` holds the pitch of each source plane, luma first; it must
    cover every plane the geometry outputs.

    Only the visible area is read from the source. When an odd display size
    was rounded up, the destination keeps its even pitch and row count and
    the extra column or row is left as it was.
*/
pub fn plan(geometry: &Geometry, src_pitches: &[usize]) -> Result<Vec<PlaneCopy>> {
    let planes = 1 + geometry.num_chroma_planes as usize;
    if src_pitches.len() < planes {
        return Err(Error::invalid_parameter(format!(
            "decoded picture has {} planes, output needs {planes}",
            src_pitches.len()
        )));
    }

    let format = geometry.surface_format;
    let bpp = geometry.bytes_per_pixel as usize;
    let (left, top) = geometry.visible_origin();
    let (left, top) = (left as usize, top as usize);
    let (visible_width, visible_height) = geometry.visible_size();

    let luma_rows = geometry.target_height as usize;
    let luma_bytes = geometry.luma_row_bytes();
    let mut copies = Vec::with_capacity(planes);
    copies.push(PlaneCopy {
        src_offset: top * src_pitches[0] + left * bpp,
        dst_offset: 0,
        copy: Copy2d {
            src_pitch: src_pitches[0],
            dst_pitch: luma_bytes,
            width_bytes: visible_width as usize * bpp,
            rows: visible_height as usize,
        },
    });

    let chroma_top = top / format.chroma_height_divisor() as usize;
    let chroma_left = left / format.chroma_width_divisor() as usize;
    let components = format.chroma_components() as usize;
    let chroma_bytes = geometry.chroma_row_bytes();
    let chroma_rows = geometry.chroma_height as usize;
    let (visible_chroma_width, visible_chroma_rows) = geometry.visible_chroma_size();
    for (plane, &pitch) in src_pitches.iter().enumerate().take(planes).skip(1) {
        copies.push(PlaneCopy {
            src_offset: chroma_top * pitch + chroma_left * components * bpp,
            dst_offset: luma_bytes * luma_rows + (plane - 1) * chroma_bytes * chroma_rows,
            copy: Copy2d {
                src_pitch: pitch,
                dst_pitch: chroma_bytes,
                width_bytes: visible_chroma_width as usize * components * bpp,
                rows: visible_chroma_rows as usize,
            },
        });
    }
    Ok(copies)
}

/**
    Where a source plane lives.
*/
#[derive(Clone, Copy, Debug)]
pub enum PlaneSource<'a> {
    Host(&'a [u8]),
    Device(DevicePtr),
}

/**
    Where the assembled frame goes.
*/
pub enum Destination<'a> {
    Host(&'a mut [u8]),
    Device {
        ptr: DevicePtr,
        stream: &'a Arc<dyn DeviceStream>,
    },
}

fn host_rows(src: &[u8], dst: &mut [u8], plane: &PlaneCopy) -> Result<()> {
    let copy = plane.effective();
    let src_end = plane.src_offset + copy.extent(copy.src_pitch);
    let dst_end = plane.dst_offset + copy.extent(copy.dst_pitch);
    if src_end > src.len() || dst_end > dst.len() {
        return Err(Error::invalid_parameter(format!(
            "plane copy out of bounds (source {src_end}/{}, destination {dst_end}/{})",
            src.len(),
            dst.len()
        )));
    }
    let src = &src[plane.src_offset..src_end];
    let dst = &mut dst[plane.dst_offset..dst_end];
    for row in 0..copy.rows {
        let from = row * copy.src_pitch;
        let to = row * copy.dst_pitch;
        dst[to..to + copy.width_bytes].copy_from_slice(&src[from..from + copy.width_bytes]);
    }
    Ok(())
}

fn check_host_source(src: &[u8], plane: &PlaneCopy) -> Result<()> {
    let copy = plane.effective();
    let end = plane.src_offset + copy.extent(copy.src_pitch);
    if end > src.len() {
        return Err(Error::invalid_parameter(format!(
            "host plane holds {} bytes, copy needs {end}",
            src.len()
        )));
    }
    Ok(())
}

fn copy_plane(
    plane: &PlaneCopy,
    source: &PlaneSource<'_>,
    destination: &mut Destination<'_>,
    download_stream: Option<&Arc<dyn DeviceStream>>,
) -> Result<()> {
    match (source, destination) {
        (PlaneSource::Host(src), Destination::Host(dst)) => host_rows(src, dst, plane),
        (PlaneSource::Host(src), Destination::Device { ptr, stream }) => {
            let src = src
                .get(plane.src_offset..)
                .ok_or_else(|| Error::invalid_parameter("plane offset beyond decoded picture"))?;
            stream.copy_2d_async(CopySource::Host(src), ptr.add(plane.dst_offset), plane.effective())
        }
        (PlaneSource::Device(src), Destination::Device { ptr, stream }) => stream.copy_2d_async(
            CopySource::Device(src.add(plane.src_offset)),
            ptr.add(plane.dst_offset),
            plane.effective(),
        ),
        (PlaneSource::Device(src), Destination::Host(dst)) => {
            let stream = download_stream.ok_or_else(|| {
                Error::invalid_parameter("device source without a stream to download from")
            })?;
            let dst = dst
                .get_mut(plane.dst_offset..)
                .ok_or_else(|| Error::invalid_parameter("plane offset beyond output frame"))?;
            stream.download_2d(src.add(plane.src_offset), dst, plane.effective())
        }
    }
}

/**
    Execute a copy plan.

    Host sources are bounds-checked before anything is queued. Device-bound
    copies are queued on the stream, which is synchronized before returning
    even when a later plane fails, so no copy outlives the call.
    Device-to-host copies block per plane.

    `sources[i]` is the start of plane `i` of the decoded picture.
*/
pub fn copy_planes(
    plan: &[PlaneCopy],
    sources: &[PlaneSource<'_>],
    mut destination: Destination<'_>,
    download_stream: Option<&Arc<dyn DeviceStream>>,
) -> Result<()> {
    if sources.len() < plan.len() {
        return Err(Error::invalid_parameter("missing source plane"));
    }
    for (plane, source) in plan.iter().zip(sources) {
        if let PlaneSource::Host(src) = source {
            check_host_source(src, plane)?;
        }
    }

    let copied = plan
        .iter()
        .zip(sources)
        .try_for_each(|(plane, source)| {
            copy_plane(plane, source, &mut destination, download_stream)
        });
    match destination {
        Destination::Device { stream, .. } => {
            let synchronized = stream.synchronize();
            copied.and(synchronized)
        }
        Destination::Host(_) => copied,
    }
}

/**
    Copy a decoded picture into the backing memory of a pool slot.
*/
pub fn fill_surface(
    surface: &mut Surface,
    plan: &[PlaneCopy],
    sources: &[PlaneSource<'_>],
    download_stream: Option<&Arc<dyn DeviceStream>>,
) -> Result<()> {
    let destination = match surface {
        Surface::Host(bytes) => Destination::Host(&mut bytes[..]),
        Surface::Device(buffer) => Destination::Device {
            ptr: buffer.ptr(),
            stream: buffer.stream(),
        },
        _ => return Err(Error::invalid_parameter("frame slot cannot hold a copied picture")),
    };
    copy_planes(plan, sources, destination, download_stream)
}
