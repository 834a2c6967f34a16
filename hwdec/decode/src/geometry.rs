/*!
    Plane-copy geometry.

    Pure arithmetic that turns a sequence description, an output surface
    format and an optional crop into the sizes and strides every other part
    of the session works with.
*/

use hwdec_types::{
    ChromaFormat, Dim, Error, MemoryKind, OutputSurfaceInfo, Rect, Result, SurfaceFormat,
    VideoFormat,
};

/**
    Check that a crop rectangle is usable.

    Both dimensions must be non-zero and even, so that subsampled chroma
    planes cover exactly half the luma rows and columns.
*/
pub fn validate_crop(crop: &Rect) -> Result<()> {
    if crop.right <= crop.left || crop.bottom <= crop.top {
        return Err(Error::invalid_parameter(format!(
            "crop rectangle {crop:?} is empty"
        )));
    }
    if crop.width() % 2 != 0 || crop.height() % 2 != 0 {
        return Err(Error::invalid_parameter(format!(
            "crop size {}x{} must be even",
            crop.width(),
            crop.height()
        )));
    }
    Ok(())
}

/**
    Output geometry of a configured session.

    Recomputed on every reconfiguration.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    /// Coded size of the sequence
    pub coded: Dim,
    /// Display area within the coded picture
    pub display_area: Rect,
    /// Crop relative to the display area, zero if not cropping
    pub crop: Rect,
    /// Output width, always even
    pub target_width: u32,
    /// Output height, always even
    pub target_height: u32,
    /// Chroma samples per row, per component
    pub chroma_width: u32,
    /// Chroma rows
    pub chroma_height: u32,
    pub num_chroma_planes: u32,
    pub bytes_per_pixel: u32,
    pub bit_depth: u32,
    pub surface_format: SurfaceFormat,
    /// Luma pitch in bytes of the decoded surface
    pub surface_stride: u32,
    /// Rows per luma plane of the decoded surface
    pub surface_vstride: u32,
    /// Rows per chroma plane of the decoded surface
    pub chroma_vstride: u32,
}

impl Geometry {
    /**
        Derive the geometry for a sequence.

        Without a crop the output covers the display area rounded up to even
        dimensions. With a crop the output covers exactly the crop.
    */
    pub fn derive(
        format: &VideoFormat,
        surface_format: SurfaceFormat,
        crop: Option<Rect>,
    ) -> Result<Self> {
        let crop = crop.filter(|c| !c.is_zero());
        let (target_width, target_height) = match &crop {
            Some(crop) => {
                validate_crop(crop)?;
                if crop.right > format.display_area.width()
                    || crop.bottom > format.display_area.height()
                {
                    return Err(Error::invalid_parameter(format!(
                        "crop {crop:?} exceeds display area {:?}",
                        format.display_area
                    )));
                }
                ((crop.width() + 1) & !1, (crop.height() + 1) & !1)
            }
            None => (
                (format.display_area.width() + 1) & !1,
                (format.display_area.height() + 1) & !1,
            ),
        };
        if target_width == 0 || target_height == 0 {
            return Err(Error::invalid_parameter(format!(
                "display area {:?} is empty",
                format.display_area
            )));
        }

        let bytes_per_pixel = format.bytes_per_sample();
        let num_chroma_planes = if format.chroma_format == ChromaFormat::Monochrome {
            0
        } else {
            surface_format.chroma_plane_count()
        };
        let chroma_height = target_height.div_ceil(surface_format.chroma_height_divisor());

        Ok(Self {
            coded: format.coded_size(),
            display_area: format.display_area,
            crop: crop.unwrap_or_default(),
            target_width,
            target_height,
            chroma_width: target_width.div_ceil(surface_format.chroma_width_divisor()),
            chroma_height,
            num_chroma_planes,
            bytes_per_pixel,
            bit_depth: format.bit_depth(),
            surface_format,
            surface_stride: target_width * bytes_per_pixel,
            surface_vstride: target_height,
            chroma_vstride: chroma_height,
        })
    }

    /**
        Use the pitch and vertical stride of the decoder's own surfaces.
    */
    pub fn with_surface_layout(mut self, pitch: u32, vstride: u32) -> Self {
        self.surface_stride = pitch;
        self.surface_vstride = vstride;
        self.chroma_vstride = vstride.div_ceil(self.surface_format.chroma_height_divisor());
        self
    }

    /**
        Left and top edge of the output within the decoded picture.
    */
    pub fn visible_origin(&self) -> (u32, u32) {
        (
            self.display_area.left + self.crop.left,
            self.display_area.top + self.crop.top,
        )
    }

    /**
        Size of the picture area that is copied out of the decoded surface.

        Matches the output size except when an odd display area was rounded
        up; the extra row or column of the output is never written.
    */
    pub fn visible_size(&self) -> (u32, u32) {
        if self.crop.is_zero() {
            (self.display_area.width(), self.display_area.height())
        } else {
            (self.crop.width(), self.crop.height())
        }
    }

    /**
        Chroma samples per row and chroma rows covered by the visible area.
    */
    pub fn visible_chroma_size(&self) -> (u32, u32) {
        let (width, height) = self.visible_size();
        (
            width.div_ceil(self.surface_format.chroma_width_divisor()),
            height.div_ceil(self.surface_format.chroma_height_divisor()),
        )
    }

    /**
        Bytes of one output row of the luma plane.
    */
    pub fn luma_row_bytes(&self) -> usize {
        self.target_width as usize * self.bytes_per_pixel as usize
    }

    /**
        Bytes of one output row of a chroma plane.
    */
    pub fn chroma_row_bytes(&self) -> usize {
        self.chroma_width as usize
            * self.surface_format.chroma_components() as usize
            * self.bytes_per_pixel as usize
    }

    /**
        Size in bytes of one packed output frame (all planes, no padding).
    */
    pub fn frame_size(&self) -> usize {
        self.luma_row_bytes() * self.target_height as usize
            + self.chroma_row_bytes()
                * self.chroma_height as usize
                * self.num_chroma_planes as usize
    }

    /**
        Size in bytes of one decoder-owned surface at the current strides.
    */
    pub fn surface_size(&self) -> usize {
        let chroma_pitch = self.surface_stride as usize
            * self.surface_format.chroma_components() as usize
            / self.surface_format.chroma_width_divisor() as usize;
        self.surface_stride as usize * self.surface_vstride as usize
            + chroma_pitch * self.chroma_vstride as usize * self.num_chroma_planes as usize
    }

    /**
        Caller-visible description of the output surfaces for `mem_kind`.
    */
    pub fn surface_info(&self, mem_kind: MemoryKind) -> OutputSurfaceInfo {
        let internal = mem_kind == MemoryKind::DeviceInternal;
        let (visible_left, visible_top) = if internal {
            self.visible_origin()
        } else {
            (0, 0)
        };
        let (output_pitch, output_vstride, size) = if internal {
            (self.surface_stride, self.surface_vstride, self.surface_size())
        } else {
            (
                self.luma_row_bytes() as u32,
                self.target_height,
                self.frame_size(),
            )
        };
        OutputSurfaceInfo {
            output_width: self.target_width,
            output_height: self.target_height,
            output_pitch,
            output_vstride,
            chroma_width: self.chroma_width,
            chroma_height: self.chroma_height,
            bytes_per_pixel: self.bytes_per_pixel,
            bit_depth: self.bit_depth,
            num_chroma_planes: self.num_chroma_planes,
            output_surface_size_in_bytes: size as u64,
            surface_format: self.surface_format,
            mem_kind,
            visible_left,
            visible_top,
        }
    }
}
