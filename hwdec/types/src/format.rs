/*!
    Output surface formats and memory placement.
*/

use crate::ChromaFormat;

/**
    Pixel layout of a decoded output surface.

    Hardware decoders produce semi-planar surfaces (interleaved Cb/Cr), the
    software decoder produces fully planar ones.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum SurfaceFormat {
    /// Semi-planar 4:2:0, 8-bit
    Nv12,
    /// Semi-planar 4:2:0, 16-bit container, MSB aligned
    P016,
    /// Planar 4:4:4, 8-bit
    Yuv444,
    /// Planar 4:4:4, 16-bit container, MSB aligned
    Yuv444_16Bit,
    /// Planar 4:2:0, 8-bit
    Yuv420,
    /// Planar 4:2:0, 16-bit container, LSB aligned
    Yuv420_16Bit,
}

impl SurfaceFormat {
    /**
        Pick the hardware output format for a coded chroma format and bit depth.

        4:2:2 and monochrome streams are delivered in the 4:2:0 semi-planar
        layouts; monochrome surfaces simply carry no chroma planes.
    */
    pub const fn for_hardware(chroma: ChromaFormat, bit_depth: u32) -> Self {
        let high_depth = bit_depth > 8;
        match chroma {
            ChromaFormat::Yuv444 if high_depth => Self::Yuv444_16Bit,
            ChromaFormat::Yuv444 => Self::Yuv444,
            _ if high_depth => Self::P016,
            _ => Self::Nv12,
        }
    }

    /**
        Pick the planar output format of the software decoder.

        Returns `None` for 4:2:2 and for high bit depth 4:4:4, which the
        software path does not deliver.
    */
    pub const fn for_software(chroma: ChromaFormat, bit_depth: u32) -> Option<Self> {
        let high_depth = bit_depth > 8;
        match chroma {
            ChromaFormat::Yuv422 => None,
            ChromaFormat::Yuv444 if high_depth => None,
            ChromaFormat::Yuv444 => Some(Self::Yuv444),
            _ if high_depth => Some(Self::Yuv420_16Bit),
            _ => Some(Self::Yuv420),
        }
    }

    /**
        Returns true for semi-planar formats (one interleaved chroma plane).
    */
    pub const fn is_semi_planar(self) -> bool {
        matches!(self, Self::Nv12 | Self::P016)
    }

    /**
        Returns true if the format stores samples in a 16-bit container.
    */
    pub const fn is_16bit(self) -> bool {
        matches!(self, Self::P016 | Self::Yuv444_16Bit | Self::Yuv420_16Bit)
    }

    /**
        Returns true if 16-bit samples are stored in the most significant bits.
    */
    pub const fn is_msb_aligned(self) -> bool {
        matches!(self, Self::P016 | Self::Yuv444_16Bit)
    }

    /**
        Number of chroma planes in the surface.
    */
    pub const fn chroma_plane_count(self) -> u32 {
        if self.is_semi_planar() { 1 } else { 2 }
    }

    /**
        Horizontal chroma subsampling divisor.
    */
    pub const fn chroma_width_divisor(self) -> u32 {
        match self {
            Self::Nv12 | Self::P016 | Self::Yuv420 | Self::Yuv420_16Bit => 2,
            Self::Yuv444 | Self::Yuv444_16Bit => 1,
        }
    }

    /**
        Vertical chroma subsampling divisor.
    */
    pub const fn chroma_height_divisor(self) -> u32 {
        self.chroma_width_divisor()
    }

    /**
        Interleaved chroma components per sample position in a chroma plane.
    */
    pub const fn chroma_components(self) -> u32 {
        if self.is_semi_planar() { 2 } else { 1 }
    }
}

/**
    Where decoded output frames live and how they get there.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MemoryKind {
    /// Driver-owned device surface, mapped until the frame is released.
    #[default]
    DeviceInternal,
    /// Copied into a session-owned device buffer.
    DeviceCopied,
    /// Copied into a session-owned host buffer.
    HostCopied,
    /// Decoded but never mapped; only frame counts are reported.
    NotMapped,
}

impl MemoryKind {
    /**
        Returns true if frames of this kind are readable without a device transfer.
    */
    pub const fn is_host(self) -> bool {
        matches!(self, Self::HostCopied)
    }

    /**
        Returns true if the session copies decoded planes into its own buffers.
    */
    pub const fn is_copied(self) -> bool {
        matches!(self, Self::DeviceCopied | Self::HostCopied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hardware_format_selection() {
        assert_eq!(
            SurfaceFormat::for_hardware(ChromaFormat::Yuv420, 8),
            SurfaceFormat::Nv12
        );
        assert_eq!(
            SurfaceFormat::for_hardware(ChromaFormat::Yuv420, 10),
            SurfaceFormat::P016
        );
        assert_eq!(
            SurfaceFormat::for_hardware(ChromaFormat::Yuv444, 8),
            SurfaceFormat::Yuv444
        );
        assert_eq!(
            SurfaceFormat::for_hardware(ChromaFormat::Yuv444, 12),
            SurfaceFormat::Yuv444_16Bit
        );
        assert_eq!(
            SurfaceFormat::for_hardware(ChromaFormat::Monochrome, 8),
            SurfaceFormat::Nv12
        );
    }

    #[test]
    fn software_format_selection() {
        assert_eq!(
            SurfaceFormat::for_software(ChromaFormat::Yuv420, 8),
            Some(SurfaceFormat::Yuv420)
        );
        assert_eq!(
            SurfaceFormat::for_software(ChromaFormat::Monochrome, 10),
            Some(SurfaceFormat::Yuv420_16Bit)
        );
        assert_eq!(
            SurfaceFormat::for_software(ChromaFormat::Yuv444, 8),
            Some(SurfaceFormat::Yuv444)
        );
        assert_eq!(SurfaceFormat::for_software(ChromaFormat::Yuv444, 10), None);
        assert_eq!(SurfaceFormat::for_software(ChromaFormat::Yuv422, 8), None);
    }

    #[test]
    fn chroma_layout() {
        assert_eq!(SurfaceFormat::Nv12.chroma_plane_count(), 1);
        assert_eq!(SurfaceFormat::Yuv420.chroma_plane_count(), 2);
        assert_eq!(SurfaceFormat::Yuv444.chroma_width_divisor(), 1);
        assert_eq!(SurfaceFormat::P016.chroma_height_divisor(), 2);
        assert_eq!(SurfaceFormat::Nv12.chroma_components(), 2);
        assert_eq!(SurfaceFormat::Yuv420_16Bit.chroma_components(), 1);
    }

    #[test]
    fn sample_alignment() {
        assert!(SurfaceFormat::P016.is_msb_aligned());
        assert!(SurfaceFormat::Yuv420_16Bit.is_16bit());
        assert!(!SurfaceFormat::Yuv420_16Bit.is_msb_aligned());
        assert!(!SurfaceFormat::Nv12.is_16bit());
    }

    #[test]
    fn memory_kinds() {
        assert_eq!(MemoryKind::default(), MemoryKind::DeviceInternal);
        assert!(MemoryKind::HostCopied.is_host());
        assert!(MemoryKind::DeviceCopied.is_copied());
        assert!(!MemoryKind::NotMapped.is_copied());
    }
}
