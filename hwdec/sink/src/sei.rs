/*!
    SEI payload output.
*/

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::trace;

use hwdec_decode::SeiSink;
use hwdec_types::{Pts, Result, SeiMessage};

/**
    Appends raw SEI payloads to a writer, in display order.
*/
#[derive(Debug)]
pub struct SeiWriter<W: Write> {
    writer: W,
    messages: usize,
    bytes: usize,
}

impl SeiWriter<BufWriter<File>> {
    /**
        Create (or truncate) the file at `path` and write payloads to it.
    */
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> SeiWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            messages: 0,
            bytes: 0,
        }
    }

    pub fn messages_written(&self) -> usize {
        self.messages
    }

    pub fn bytes_written(&self) -> usize {
        self.bytes
    }

    /**
        Flush and return the inner writer.
    */
    pub fn into_inner(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write + Send> SeiSink for SeiWriter<W> {
    fn write_sei(&mut self, pts: Pts, message: &SeiMessage) -> Result<()> {
        trace!(
            %pts,
            payload_type = message.payload_type,
            size = message.payload.len(),
            "writing SEI payload"
        );
        self.writer.write_all(&message.payload)?;
        self.messages += 1;
        self.bytes += message.payload.len();
        Ok(())
    }
}
