/*!
    Description of the output surfaces handed to callers.
*/

use crate::{Error, MemoryKind, Result, SurfaceFormat};

/**
    Geometry and placement of decoded output surfaces.

    Valid until the next reconfiguration. For copied memory kinds the planes
    are packed tightly (`output_pitch` equals the visible row size and the
    visible area starts at the origin). Driver-internal surfaces keep the
    decoder's pitch and vertical stride, and the visible area starts at
    `visible_left`/`visible_top`.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OutputSurfaceInfo {
    /// Visible width in pixels, always even
    pub output_width: u32,
    /// Visible height in pixels, always even
    pub output_height: u32,
    /// Luma pitch in bytes
    pub output_pitch: u32,
    /// Rows allocated per luma plane
    pub output_vstride: u32,
    /// Visible chroma samples per row, per component
    pub chroma_width: u32,
    /// Visible chroma rows
    pub chroma_height: u32,
    /// Bytes per stored sample, 1 or 2
    pub bytes_per_pixel: u32,
    /// Significant bits per sample
    pub bit_depth: u32,
    /// Number of chroma planes (0, 1 or 2)
    pub num_chroma_planes: u32,
    /// Total surface size in bytes, including all planes
    pub output_surface_size_in_bytes: u64,
    /// Pixel layout of the surface
    pub surface_format: SurfaceFormat,
    /// Where the surface lives
    pub mem_kind: MemoryKind,
    /// Left edge of the visible area within the surface
    pub visible_left: u32,
    /// Top edge of the visible area within the surface
    pub visible_top: u32,
}

/**
    Byte layout of the visible part of one plane.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaneLayout {
    /// Offset of the first visible byte
    pub offset: usize,
    /// Distance between rows in bytes
    pub pitch: usize,
    /// Visible bytes per row
    pub row_bytes: usize,
    /// Visible rows
    pub rows: usize,
}

impl PlaneLayout {
    /**
        Number of bytes a buffer must hold for this plane to be readable.
    */
    pub fn required_len(&self) -> usize {
        if self.rows == 0 {
            return self.offset;
        }
        self.offset + (self.rows - 1) * self.pitch + self.row_bytes
    }

    /**
        Iterate over the visible rows of this plane within `bytes`.

        Fails if `bytes` is too short to hold the plane.
    */
    pub fn rows<'a>(self, bytes: &'a [u8]) -> Result<impl Iterator<Item = &'a [u8]> + 'a> {
        let needed = self.required_len();
        if bytes.len() < needed {
            return Err(Error::invalid_parameter(format!(
                "surface holds {} bytes, plane needs {needed}",
                bytes.len()
            )));
        }
        let layout = self;
        Ok((0..layout.rows).map(move |row| {
            let start = layout.offset + row * layout.pitch;
            &bytes[start..start + layout.row_bytes]
        }))
    }
}

impl OutputSurfaceInfo {
    /**
        Total number of planes, luma included.
    */
    #[inline]
    pub const fn plane_count(&self) -> u32 {
        1 + self.num_chroma_planes
    }

    /**
        Pitch in bytes of each chroma plane.
    */
    pub const fn chroma_pitch(&self) -> u32 {
        self.output_pitch * self.surface_format.chroma_components()
            / self.surface_format.chroma_width_divisor()
    }

    /**
        Rows allocated per chroma plane.
    */
    pub const fn chroma_vstride(&self) -> u32 {
        self.output_vstride
            .div_ceil(self.surface_format.chroma_height_divisor())
    }

    /**
        Visible layout of plane `plane` (0 is luma), or `None` if the surface
        has no such plane.
    */
    pub fn plane_layout(&self, plane: u32) -> Option<PlaneLayout> {
        if plane > self.num_chroma_planes {
            return None;
        }
        let bpp = self.bytes_per_pixel as usize;
        let pitch = self.output_pitch as usize;
        if plane == 0 {
            return Some(PlaneLayout {
                offset: self.visible_top as usize * pitch + self.visible_left as usize * bpp,
                pitch,
                row_bytes: self.output_width as usize * bpp,
                rows: self.output_height as usize,
            });
        }

        let format = self.surface_format;
        let components = format.chroma_components() as usize;
        let chroma_pitch = self.chroma_pitch() as usize;
        let base = pitch * self.output_vstride as usize
            + (plane as usize - 1) * chroma_pitch * self.chroma_vstride() as usize;
        let top = (self.visible_top / format.chroma_height_divisor()) as usize;
        let left = (self.visible_left / format.chroma_width_divisor()) as usize;
        Some(PlaneLayout {
            offset: base + top * chroma_pitch + left * components * bpp,
            pitch: chroma_pitch,
            row_bytes: self.chroma_width as usize * components * bpp,
            rows: self.chroma_height as usize,
        })
    }

    /**
        Size in bytes of the visible image with all planes packed tightly.
    */
    pub fn visible_size_in_bytes(&self) -> usize {
        (0..self.plane_count())
            .filter_map(|plane| self.plane_layout(plane))
            .map(|layout| layout.row_bytes * layout.rows)
            .sum()
    }
}

static_assertions::assert_impl_all!(OutputSurfaceInfo: Send, Sync, Copy);
