/*!
    The frame sink shared by the caller loop and the reconfiguration flush.
*/

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use hwdec_decode::{DecodedFrame, FlushHandle, ReconfigureFlush};
use hwdec_types::{FlushMode, MemoryKind, OutputSurfaceInfo, Result};

use crate::checksum::{FrameChecksum, verify_against_file};
use crate::config::SinkConfig;
use crate::writer::FrameWriter;

/**
    Summary of everything a sink consumed.
*/
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SinkReport {
    /// Frames handed to the sink, flushed frames included
    pub frames: usize,
    /// Frames drained by reconfiguration flushes
    pub flushed: usize,
    /// Files frames were dumped into, in order
    pub files: Vec<PathBuf>,
    /// Hex MD5 digest, if checksumming was enabled
    pub digest: Option<String>,
    /// Result of the comparison against the reference digest, if one was given
    pub matches_reference: Option<bool>,
}

struct SinkState {
    writer: Option<FrameWriter>,
    checksum: Option<FrameChecksum>,
    reference: Option<PathBuf>,
    frames: usize,
    flushed: usize,
}

impl SinkState {
    fn consume(
        &mut self,
        frame: &DecodedFrame,
        info: &OutputSurfaceInfo,
        reconfigured: bool,
        mode: Option<FlushMode>,
    ) -> Result<()> {
        self.frames += 1;
        if info.mem_kind == MemoryKind::NotMapped {
            return Ok(());
        }

        let dump = mode.is_none_or(|mode| mode == FlushMode::DumpToFile);
        let checksum = mode.is_none_or(|mode| mode == FlushMode::Checksum);
        let writer = self.writer.as_mut().filter(|_| dump);
        let hasher = self.checksum.as_mut().filter(|_| checksum);
        if writer.is_none() && hasher.is_none() {
            return Ok(());
        }

        let bytes = frame.copy_to_host()?;
        if let Some(writer) = writer {
            writer.write_surface(&bytes, info, reconfigured)?;
        }
        if let Some(hasher) = hasher {
            hasher.update(&bytes, info)?;
        }
        Ok(())
    }
}

/**
    Output side of a decode run: dumps frames to a file, folds them into a
    checksum, or both, as configured.

    The caller feeds every frame it takes from the session through
    [`FrameSink::consume`]. A clone of the sink registered as the
    session's reconfiguration flush handles the frames drained when the
    stream changes, in the mode given by [`FrameSink::flush_mode`]. Both
    handles share the same output file and digest.
*/
#[derive(Clone)]
pub struct FrameSink {
    state: Arc<Mutex<SinkState>>,
    mode: FlushMode,
}

impl FrameSink {
    pub fn new(config: &SinkConfig) -> Self {
        let state = SinkState {
            writer: config.output_path.as_ref().map(FrameWriter::new),
            checksum: config.checksum.then(FrameChecksum::new),
            reference: config.checksum_reference.clone(),
            frames: 0,
            flushed: 0,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            mode: config.flush_mode(),
        }
    }

    /**
        Mode to register this sink's reconfiguration flush with.
    */
    pub fn flush_mode(&self) -> FlushMode {
        self.mode
    }

    /**
        Dump and/or checksum a frame taken from the session.

        `reconfigured` must be the session's reconfiguration flag as of
        this frame, so that dumping switches to a new file.
    */
    pub fn consume(
        &self,
        frame: &DecodedFrame,
        info: &OutputSurfaceInfo,
        reconfigured: bool,
    ) -> Result<()> {
        self.state.lock().consume(frame, info, reconfigured, None)
    }

    /**
        Frames handed to the sink so far.
    */
    pub fn frames(&self) -> usize {
        self.state.lock().frames
    }

    /**
        Flush the output file, finish the digest and compare it against the
        reference, if any.

        The sink stops dumping and checksumming afterwards; frames are still
        counted.
    */
    pub fn finish(&self) -> Result<SinkReport> {
        let mut state = self.state.lock();
        let mut report = SinkReport {
            frames: state.frames,
            flushed: state.flushed,
            ..SinkReport::default()
        };

        if let Some(mut writer) = state.writer.take() {
            writer.flush()?;
            info!(
                frames = writer.frames_written(),
                path = %writer.path().display(),
                "saved frames"
            );
            report.files = writer.files().to_vec();
        }

        if let Some(checksum) = state.checksum.take() {
            let digest = checksum.finalize();
            info!(%digest, "MD5 message digest");
            if let Some(reference) = state.reference.take() {
                report.matches_reference = Some(verify_against_file(&digest, reference)?);
            }
            report.digest = Some(digest);
        }
        Ok(report)
    }
}

impl ReconfigureFlush for FrameSink {
    fn flush(&mut self, handle: &mut FlushHandle<'_>, mode: FlushMode) -> Result<usize> {
        let info = *handle.output_surface_info();
        let mut state = self.state.lock();
        let mut count = 0;
        while let Some(frame) = handle.get_frame() {
            state.consume(&frame, &info, false, Some(mode))?;
            handle.release_frame(&frame)?;
            count += 1;
        }
        state.flushed += count;
        debug!(count, ?mode, "sink drained frames");
        Ok(count)
    }
}

static_assertions::assert_impl_all!(FrameSink: Send, Sync, Clone);
