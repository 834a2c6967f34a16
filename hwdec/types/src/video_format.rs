/*!
    Sequence-level stream description reported by the parser.
*/

use crate::{ChromaFormat, CodecId, Dim, Rational, Rect};

/**
    Video format of a coded sequence.

    Delivered by the parser whenever a sequence header is seen, both at the
    start of a stream and whenever the stream parameters change.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VideoFormat {
    /// Codec of the sequence
    pub codec: CodecId,
    /// Chroma subsampling of the coded pictures
    pub chroma_format: ChromaFormat,
    /// Luma bit depth minus 8
    pub bit_depth_luma_minus8: u8,
    /// Chroma bit depth minus 8
    pub bit_depth_chroma_minus8: u8,
    /// Coded width in pixels, including any alignment padding
    pub coded_width: u32,
    /// Coded height in pixels, including any alignment padding
    pub coded_height: u32,
    /// Visible area within the coded picture
    pub display_area: Rect,
    /// Frame rate, zero denominator if unknown
    pub frame_rate: Rational,
    /// Progressive (true) or interlaced (false) sequence
    pub progressive: bool,
    /// Minimum number of decode surfaces the sequence needs
    pub min_num_decode_surfaces: u32,
    /// Maximum picture size from the sequence header, if the codec signals one (AV1)
    pub max_size: Option<Dim>,
}

impl VideoFormat {
    /**
        Luma bit depth in bits.
    */
    #[inline]
    pub const fn bit_depth(&self) -> u32 {
        self.bit_depth_luma_minus8 as u32 + 8
    }

    /**
        Bytes used to store one sample: 1 for 8-bit, 2 otherwise.
    */
    #[inline]
    pub const fn bytes_per_sample(&self) -> u32 {
        if self.bit_depth_luma_minus8 > 0 { 2 } else { 1 }
    }

    #[inline]
    pub const fn coded_size(&self) -> Dim {
        Dim::new(self.coded_width, self.coded_height)
    }

    /**
        Name of the first parameter that differs from `other` in a way that
        cannot be handled by reconfiguring an existing decoder.
    */
    pub fn incompatible_change(&self, other: &Self) -> Option<&'static str> {
        if self.codec != other.codec {
            Some("codec")
        } else if self.chroma_format != other.chroma_format {
            Some("chroma format")
        } else if self.bit_depth_luma_minus8 != other.bit_depth_luma_minus8 {
            Some("bit depth")
        } else {
            None
        }
    }
}

static_assertions::assert_impl_all!(VideoFormat: Send, Sync);
