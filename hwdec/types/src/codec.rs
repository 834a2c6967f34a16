/*!
    Codec and chroma format identification.
*/

/**
    Compressed video codecs understood by the decode backends.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum CodecId {
    /// MPEG-1 Video
    Mpeg1,
    /// MPEG-2 Video
    Mpeg2,
    /// MPEG-4 Part 2
    Mpeg4,
    /// H.264 / AVC
    H264,
    /// H.265 / HEVC
    Hevc,
    /// VP8
    Vp8,
    /// VP9
    Vp9,
    /// Motion JPEG
    Jpeg,
    /// AV1
    Av1,
}

impl CodecId {
    /**
        Human readable codec name, used in session logs.
    */
    pub const fn name(self) -> &'static str {
        match self {
            Self::Mpeg1 => "MPEG-1 (MPEG1VIDEO)",
            Self::Mpeg2 => "MPEG-2 (MPEG2VIDEO)",
            Self::Mpeg4 => "MPEG-4 (MPEG4)",
            Self::H264 => "AVC/H.264",
            Self::Hevc => "H.265/HEVC",
            Self::Vp8 => "VP8",
            Self::Vp9 => "VP9",
            Self::Jpeg => "M-JPEG",
            Self::Av1 => "AV1",
        }
    }

    /**
        Returns true if SEI payloads of this codec are filtered by payload type.

        H.264 and HEVC carry several SEI kinds of which only user data is
        forwarded. AV1 metadata OBUs are forwarded as-is.
    */
    pub const fn filters_sei(self) -> bool {
        matches!(self, Self::H264 | Self::Hevc)
    }
}

/**
    Chroma subsampling of the coded stream.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChromaFormat {
    /// Luma only
    Monochrome,
    /// 4:2:0, both chroma axes halved
    Yuv420,
    /// 4:2:2, horizontal chroma axis halved
    Yuv422,
    /// 4:4:4, full resolution chroma
    Yuv444,
}

impl ChromaFormat {
    /**
        Returns true if the stream carries no chroma planes.
    */
    pub const fn is_monochrome(self) -> bool {
        matches!(self, Self::Monochrome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_names() {
        assert_eq!(CodecId::H264.name(), "AVC/H.264");
        assert_eq!(CodecId::Hevc.name(), "H.265/HEVC");
        assert_eq!(CodecId::Av1.name(), "AV1");
    }

    #[test]
    fn sei_filtering() {
        assert!(CodecId::H264.filters_sei());
        assert!(CodecId::Hevc.filters_sei());
        assert!(!CodecId::Av1.filters_sei());
        assert!(!CodecId::Vp9.filters_sei());
    }

    #[test]
    fn monochrome() {
        assert!(ChromaFormat::Monochrome.is_monochrome());
        assert!(!ChromaFormat::Yuv420.is_monochrome());
    }
}
