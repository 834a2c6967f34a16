/*!
    Interface to the external bitstream parser.

    The parser turns compressed packets into callbacks. The session
    implements [`ParserCallbacks`]; a parser implementation drives them from
    [`VideoParser::parse`].
*/

use hwdec_types::{DisplayInfo, PictureParams, Result, SeiMessageInfo, SourcePacket, VideoFormat};

/**
    Callbacks raised by a parser while it consumes a packet.

    An error returned from any callback must abort the current `parse` call
    and be returned from it.
*/
pub trait ParserCallbacks {
    /**
        A sequence header was parsed, at stream start or on a parameter change.

        Returns the number of decode surfaces the parser should use.
    */
    fn on_sequence(&mut self, format: &VideoFormat) -> Result<u32>;

    /**
        A picture is ready to be decoded.
    */
    fn on_picture_decode(&mut self, params: &PictureParams<'_>) -> Result<()>;

    /**
        A decoded picture is due for display.
    */
    fn on_picture_display(&mut self, info: &DisplayInfo) -> Result<()>;

    /**
        SEI messages were parsed for a picture.
    */
    fn on_sei(&mut self, info: SeiMessageInfo) -> Result<()>;
}

/**
    A bitstream parser for one elementary stream.
*/
pub trait VideoParser: Send {
    /**
        Parse one packet, raising callbacks as pictures are found.

        An end-of-stream packet makes the parser display every picture it
        still holds.
    */
    fn parse(&mut self, packet: &SourcePacket<'_>, callbacks: &mut dyn ParserCallbacks)
    -> Result<()>;
}
