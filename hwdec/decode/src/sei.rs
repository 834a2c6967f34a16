/*!
    SEI message side channel.

    SEI messages arrive in decode order but belong to a picture, so they are
    held until that picture is displayed.
*/

use std::collections::HashMap;

use hwdec_types::{
    CodecId, Pts, Result, SEI_TYPE_USER_DATA_UNREGISTERED, SeiMessage, SeiMessageInfo,
};

/**
    Receiver of SEI payloads, in display order.
*/
pub trait SeiSink: Send {
    fn write_sei(&mut self, pts: Pts, message: &SeiMessage) -> Result<()>;
}

/**
    Returns true if a payload of `payload_type` is forwarded for `codec`.

    H.264 and HEVC only forward unregistered user data; everything else
    (AV1 metadata included) is forwarded unfiltered.
*/
pub fn forwards_sei(codec: CodecId, payload_type: u32) -> bool {
    !codec.filters_sei() || payload_type == SEI_TYPE_USER_DATA_UNREGISTERED
}

#[derive(Default)]
pub(crate) struct SeiStore {
    pending: HashMap<u32, Vec<SeiMessage>>,
}

impl SeiStore {
    pub fn store(&mut self, info: SeiMessageInfo) {
        self.pending
            .entry(info.picture_index)
            .or_default()
            .extend(info.messages);
    }

    /**
        Take the messages of a displayed picture that should be forwarded.
    */
    pub fn take_for_display(&mut self, picture_index: u32, codec: CodecId) -> Vec<SeiMessage> {
        self.pending
            .remove(&picture_index)
            .unwrap_or_default()
            .into_iter()
            .filter(|message| forwards_sei(codec, message.payload_type))
            .collect()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
