/*!
    Per-picture records exchanged with the parser.
*/

use crate::Pts;

/// H.264/HEVC SEI payload type of unregistered user data.
pub const SEI_TYPE_USER_DATA_UNREGISTERED: u32 = 5;
/// H.264/HEVC SEI payload type of time codes.
pub const SEI_TYPE_TIME_CODE: u32 = 136;

/**
    A picture ready to be submitted to the decoder.

    The parser hands out an opaque index into its decode picture buffer
    together with the compressed slice data of the picture.
*/
#[derive(Clone, Debug)]
pub struct PictureParams<'a> {
    /// Decode surface index chosen by the parser
    pub picture_index: u32,
    /// Slice data for the picture
    pub bitstream: &'a [u8],
    /// True if the picture is used as a reference
    pub is_reference: bool,
    /// True for intra-only pictures
    pub is_intra: bool,
}

/**
    A decoded picture ready for display, in display order.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayInfo {
    /// Decode surface index of the picture
    pub picture_index: u32,
    /// Presentation timestamp of the picture
    pub pts: Pts,
    /// Progressive frame (true) or field pair (false)
    pub progressive_frame: bool,
    /// Top field is displayed first
    pub top_field_first: bool,
}

impl DisplayInfo {
    pub const fn new(picture_index: u32, pts: Pts) -> Self {
        Self {
            picture_index,
            pts,
            progressive_frame: true,
            top_field_first: false,
        }
    }
}

/**
    A single SEI (or AV1 metadata) payload.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeiMessage {
    pub payload_type: u32,
    pub payload: Vec<u8>,
}

/**
    All SEI payloads the parser found for one picture.
*/
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SeiMessageInfo {
    pub picture_index: u32,
    pub messages: Vec<SeiMessage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_info_defaults_to_progressive() {
        let info = DisplayInfo::new(3, Pts(120));
        assert!(info.progressive_frame);
        assert_eq!(info.picture_index, 3);
        assert_eq!(info.pts, Pts(120));
    }
}
