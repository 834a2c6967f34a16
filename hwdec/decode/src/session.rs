/*!
    The decoder session.

    A session owns the parser, the backend and the frame pool. It drives
    the parser with packets, configures or reconfigures the backend when the
    parser reports a sequence, and turns displayed pictures into frames the
    caller pulls with [`DecoderSession::get_frame`].
*/

use std::mem;

use tracing::{debug, info, warn};

use hwdec_types::{
    CodecId, Dim, DisplayInfo, Error, FlushMode, OutputSurfaceInfo, PacketFlags, PictureParams,
    Pts, Result, SeiMessageInfo, SourcePacket, SurfaceFormat, VideoFormat,
};

use crate::backend::{Backend, CodecPacket, DecoderCreateInfo, SurfaceLayout};
use crate::config::DecoderConfig;
use crate::geometry::Geometry;
use crate::parser::{ParserCallbacks, VideoParser};
use crate::pool::{DecodedFrame, FramePool};
use crate::sei::{SeiSink, SeiStore};

/**
    Lifecycle of a session.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No sequence seen yet
    #[default]
    Uninitialized,
    /// Backend created, no picture decoded yet
    Configured,
    /// Pictures are being decoded and displayed
    Decoding,
    /// Rebuilding after a sequence change
    Reconfiguring,
    /// End of stream reached, frames still to be pulled
    Flushing,
    /// Every frame has been pulled
    Terminal,
}

/**
    Result of one [`DecoderSession::decode`] call.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodeStatus {
    /// Frames waiting to be pulled with `get_frame`
    pub frames_ready: usize,
    /// Pictures submitted for decoding during this call
    pub pictures_decoded: usize,
}

/**
    Drains pending frames before a reconfiguration discards them.

    Returns the number of frames it consumed, which is added to
    [`DecoderSession::num_flushed_frames`].
*/
pub trait ReconfigureFlush: Send {
    fn flush(&mut self, handle: &mut FlushHandle<'_>, mode: FlushMode) -> Result<usize>;
}

/**
    Access to the frames of a session while it is being reconfigured.
*/
pub struct FlushHandle<'a> {
    pool: &'a FramePool,
    backend: &'a mut Backend,
    info: OutputSurfaceInfo,
}

impl FlushHandle<'_> {
    pub fn get_frame(&mut self) -> Option<DecodedFrame> {
        self.pool.pop()
    }

    /**
        Release a flushed frame. Frames must be released in the order they
        were pulled.
    */
    pub fn release_frame(&mut self, frame: &DecodedFrame) -> Result<()> {
        if let Some(evicted) = self.pool.release(frame.pts(), true)? {
            self.backend.release(&evicted)?;
        }
        Ok(())
    }

    /**
        Surface description of the frames being flushed, i.e. of the
        sequence before the change.
    */
    pub fn output_surface_info(&self) -> &OutputSurfaceInfo {
        &self.info
    }
}

struct SessionCore {
    config: DecoderConfig,
    backend: Backend,
    pool: FramePool,
    state: SessionState,
    format: Option<VideoFormat>,
    geometry: Option<Geometry>,
    max: Dim,
    num_decode_surfaces: u32,
    reconfigured: bool,
    num_flushed: usize,
    pictures_decoded: usize,
    flush: Option<(Box<dyn ReconfigureFlush>, FlushMode)>,
    sei_sink: Option<Box<dyn SeiSink>>,
    sei: SeiStore,
    pending_packet: Option<CodecPacket>,
    aborted: Option<String>,
}

impl SessionCore {
    fn geometry(&self) -> Result<Geometry> {
        self.geometry
            .ok_or_else(|| Error::runtime("picture reported before any sequence header"))
    }

    fn surface_format(&self, format: &VideoFormat) -> Result<SurfaceFormat> {
        match &self.backend {
            Backend::Hardware(_) => Ok(SurfaceFormat::for_hardware(
                format.chroma_format,
                format.bit_depth(),
            )),
            Backend::Software(backend) => backend.output_format(format),
        }
    }

    /**
        Largest coded size seen so far, including the configured maximum and
        the AV1 sequence header maximum.
    */
    fn track_max_size(&mut self, format: &VideoFormat) {
        let mut max = self
            .max
            .max(Dim::new(self.config.max_width, self.config.max_height))
            .max(format.coded_size());
        if let (CodecId::Av1, Some(seq_max)) = (format.codec, format.max_size) {
            max = max.max(seq_max);
        }
        self.max = max;
    }

    fn create_info(&self, format: &VideoFormat, geometry: &Geometry) -> DecoderCreateInfo {
        DecoderCreateInfo {
            device_id: self.config.device_id,
            codec: format.codec,
            chroma_format: format.chroma_format,
            bit_depth_minus8: format.bit_depth_luma_minus8,
            surface_format: geometry.surface_format,
            coded: format.coded_size(),
            max: self.max,
            display_area: format.display_area,
            target: Dim::new(geometry.target_width, geometry.target_height),
            num_decode_surfaces: self.num_decode_surfaces,
        }
    }

    fn configure(&mut self, format: &VideoFormat) -> Result<u32> {
        let surface_format = self.surface_format(format)?;
        let mut geometry = Geometry::derive(format, surface_format, self.config.crop)?;
        self.num_decode_surfaces = format.min_num_decode_surfaces.max(1);
        self.track_max_size(format);

        let info = self.create_info(format, &geometry);
        if let Backend::Hardware(backend) = &mut self.backend {
            let layout = backend.configure(&info)?;
            geometry = geometry.with_surface_layout(layout.pitch, layout.vstride);
        }

        log_sequence(format, &geometry, self.num_decode_surfaces, "configured");
        self.format = Some(format.clone());
        self.geometry = Some(geometry);
        self.state = SessionState::Configured;
        Ok(self.num_decode_surfaces)
    }

    /**
        Hand the pending frames to the flush callback, if any.
    */
    fn run_flush(&mut self) -> Result<()> {
        let Some((mut flush, mode)) = self.flush.take() else {
            return Ok(());
        };
        let Some(geometry) = self.geometry else {
            self.flush = Some((flush, mode));
            return Ok(());
        };
        let mut handle = FlushHandle {
            pool: &self.pool,
            backend: &mut self.backend,
            info: geometry.surface_info(self.config.mem_kind),
        };
        let result = flush.flush(&mut handle, mode);
        self.flush = Some((flush, mode));
        let flushed = result?;
        debug!(flushed, ?mode, "flushed frames before reconfiguration");
        self.num_flushed += flushed;
        Ok(())
    }

    /**
        Drop every slot and return its driver resources.
    */
    fn clear_pool(&mut self) -> Result<()> {
        for evicted in self.pool.clear() {
            self.backend.release(&evicted)?;
        }
        Ok(())
    }

    fn reconfigure(&mut self, current: VideoFormat, format: &VideoFormat) -> Result<u32> {
        if let Some(what) = current.incompatible_change(format) {
            return Err(Error::unsupported(format!(
                "reconfiguration with a {what} change is not supported"
            )));
        }
        let coded_changed = current.coded_size() != format.coded_size();
        let display_changed = current.display_area != format.display_area;
        let forced = self.config.force_reconfigure_flush;
        if !coded_changed && !display_changed && !forced {
            return Ok(self.num_decode_surfaces);
        }

        let previous = self.state;
        self.state = SessionState::Reconfiguring;
        self.run_flush()?;
        self.clear_pool()?;
        self.sei.clear();

        let old = self.geometry()?;
        let mut geometry = Geometry::derive(format, self.surface_format(format)?, self.config.crop)?;
        self.num_decode_surfaces = self.num_decode_surfaces.max(format.min_num_decode_surfaces);
        self.track_max_size(format);

        let info = self.create_info(format, &geometry);
        if let Backend::Hardware(backend) = &mut self.backend {
            // the decoder keeps its surfaces unless the coded size changed
            let layout = if coded_changed {
                backend.reconfigure(&info)?
            } else {
                SurfaceLayout {
                    pitch: old.surface_stride,
                    vstride: old.surface_vstride,
                }
            };
            geometry = geometry.with_surface_layout(layout.pitch, layout.vstride);
        }

        if coded_changed {
            log_sequence(format, &geometry, self.num_decode_surfaces, "resolution changed");
        } else {
            debug!(display_area = ?format.display_area, "display area changed");
        }
        self.format = Some(format.clone());
        self.geometry = Some(geometry);
        self.state = match previous {
            SessionState::Configured => SessionState::Configured,
            _ => SessionState::Decoding,
        };

        if display_changed && !coded_changed {
            return Ok(self.num_decode_surfaces);
        }
        self.reconfigured = true;
        Ok(self.num_decode_surfaces)
    }

    fn mark_decoding(&mut self) {
        if self.state == SessionState::Configured {
            self.state = SessionState::Decoding;
        }
    }

    /**
        Materialize every frame the software codec still holds.
    */
    fn display_remaining(&mut self) -> Result<()> {
        let Some(geometry) = self.geometry else {
            return Ok(());
        };
        if let Backend::Software(backend) = &mut self.backend {
            while backend.display(Pts::default(), u32::MAX, &geometry, &self.pool)? {}
        }
        Ok(())
    }
}

impl ParserCallbacks for SessionCore {
    fn on_sequence(&mut self, format: &VideoFormat) -> Result<u32> {
        match self.format.clone() {
            Some(current) => self.reconfigure(current, format),
            None => self.configure(format),
        }
    }

    fn on_picture_decode(&mut self, params: &PictureParams<'_>) -> Result<()> {
        self.geometry()?;
        let result = match &mut self.backend {
            Backend::Hardware(backend) => backend.decode(params),
            Backend::Software(backend) => match self.pending_packet.take() {
                Some(packet) => backend.decode(packet),
                None => Ok(()),
            },
        };
        if let Err(e) = result {
            let message = format!("decoding picture {} failed: {e}", params.picture_index);
            warn!("{message}, aborting session");
            self.aborted = Some(message.clone());
            return Err(Error::runtime(message));
        }
        self.pictures_decoded += 1;
        self.mark_decoding();
        Ok(())
    }

    fn on_picture_display(&mut self, info: &DisplayInfo) -> Result<()> {
        let geometry = self.geometry()?;
        let displayed = match &mut self.backend {
            Backend::Hardware(backend) => {
                backend.display(info.pts, info.picture_index, &geometry, &self.pool)?;
                true
            }
            Backend::Software(backend) => {
                backend.display(info.pts, info.picture_index, &geometry, &self.pool)?
            }
        };

        let codec = self
            .format
            .as_ref()
            .map_or(self.config.codec, |format| format.codec);
        let messages = self.sei.take_for_display(info.picture_index, codec);
        if let (true, Some(sink)) = (displayed, &mut self.sei_sink) {
            for message in &messages {
                sink.write_sei(info.pts, message)?;
            }
        }
        self.mark_decoding();
        Ok(())
    }

    fn on_sei(&mut self, info: SeiMessageInfo) -> Result<()> {
        if self.config.extract_sei {
            self.sei.store(info);
        }
        Ok(())
    }
}

impl Drop for SessionCore {
    fn drop(&mut self) {
        for evicted in self.pool.clear() {
            if let Err(e) = self.backend.release(&evicted) {
                warn!(pts = %evicted.pts, "failed to release frame on teardown: {e}");
            }
        }
        debug!(
            pictures = self.pictures_decoded,
            flushed = self.num_flushed,
            "decoder session closed"
        );
    }
}

fn log_sequence(format: &VideoFormat, geometry: &Geometry, surfaces: u32, event: &str) {
    info!(
        codec = format.codec.name(),
        frame_rate = %format.frame_rate,
        progressive = format.progressive,
        coded = format_args!("{}x{}", format.coded_width, format.coded_height),
        display_area = format_args!(
            "[{}, {}, {}, {}]",
            format.display_area.left,
            format.display_area.top,
            format.display_area.right,
            format.display_area.bottom
        ),
        chroma = ?format.chroma_format,
        bit_depth = format.bit_depth(),
        surfaces,
        crop = ?geometry.crop,
        target = format_args!("{}x{}", geometry.target_width, geometry.target_height),
        surface_format = ?geometry.surface_format,
        "decoder {event}"
    );
}

/**
    A decoding session for one elementary stream.

    ```ignore
    let config = DecoderConfig::new(CodecId::Hevc).with_mem_kind(MemoryKind::HostCopied);
    let mut session = DecoderSession::new(config, parser, Backend::hardware(decoder))?;

    for packet in packets {
        session.decode(&packet)?;
        while let Some(frame) = session.get_frame() {
            // use frame
            session.release_frame(&frame)?;
        }
    }
    session.decode(&SourcePacket::end_of_stream())?;
    while let Some(frame) = session.get_frame() {
        session.release_frame(&frame)?;
    }
    ```
*/
pub struct DecoderSession {
    parser: Box<dyn VideoParser>,
    core: SessionCore,
}

impl DecoderSession {
    /**
        Create a session. The backend is configured once the parser reports
        the first sequence.
    */
    pub fn new(
        config: DecoderConfig,
        parser: Box<dyn VideoParser>,
        backend: Backend,
    ) -> Result<Self> {
        config.validate()?;
        if backend.kind() != config.backend {
            return Err(Error::invalid_parameter(format!(
                "config selects the {:?} backend, got {:?}",
                config.backend,
                backend.kind()
            )));
        }
        if !backend.supports(config.mem_kind) {
            return Err(Error::unsupported(format!(
                "{:?} output is not supported by the {:?} backend",
                config.mem_kind,
                backend.kind()
            )));
        }

        Ok(Self {
            parser,
            core: SessionCore {
                pool: FramePool::new(config.mem_kind),
                config,
                backend,
                state: SessionState::Uninitialized,
                format: None,
                geometry: None,
                max: Dim::default(),
                num_decode_surfaces: 0,
                reconfigured: false,
                num_flushed: 0,
                pictures_decoded: 0,
                flush: None,
                sei_sink: None,
                sei: SeiStore::default(),
                pending_packet: None,
                aborted: None,
            },
        })
    }

    /**
        Decode one packet.

        Frames handed out by earlier calls that were not released may be
        reused for this call's output. An empty packet ends the stream:
        everything still buffered is output and the session starts flushing.
    */
    pub fn decode(&mut self, packet: &SourcePacket<'_>) -> Result<DecodeStatus> {
        if let Some(message) = &self.core.aborted {
            return Err(Error::runtime(format!("session aborted: {message}")));
        }
        if matches!(
            self.core.state,
            SessionState::Flushing | SessionState::Terminal
        ) {
            return Err(Error::invalid_parameter("stream has already ended"));
        }

        let decoded_before = self.core.pictures_decoded;
        let end_of_stream = packet.is_end_of_stream();
        self.core.pool.begin_round();

        if let Backend::Software(backend) = &mut self.core.backend {
            if packet.flags.contains(PacketFlags::DISCONTINUITY) {
                backend.reset()?;
            }
            if !packet.payload.is_empty() {
                self.core.pending_packet = Some(CodecPacket {
                    data: packet.payload.to_vec(),
                    pts: packet.pts,
                });
            }
            if end_of_stream {
                backend.drain()?;
            }
        }

        let result = self.parser.parse(packet, &mut self.core);
        self.core.pending_packet = None;
        result?;

        if end_of_stream {
            self.core.display_remaining()?;
            self.core.state = SessionState::Flushing;
            debug!(
                frames_ready = self.core.pool.ready_count(),
                "end of stream reached"
            );
        }

        Ok(DecodeStatus {
            frames_ready: self.core.pool.ready_count(),
            pictures_decoded: self.core.pictures_decoded - decoded_before,
        })
    }

    /**
        Pull the oldest decoded frame.

        Returns `None` when nothing is pending; after end of stream this
        moves the session to [`SessionState::Terminal`].
    */
    pub fn get_frame(&mut self) -> Option<DecodedFrame> {
        let frame = self.core.pool.pop();
        if frame.is_none() && self.core.state == SessionState::Flushing {
            self.core.state = SessionState::Terminal;
        }
        frame
    }

    /**
        Release a frame pulled with [`get_frame`](Self::get_frame).

        Driver surfaces are unmapped and must be released in the order they
        were pulled. Copied frames are recycled by the next `decode` call, so
        releasing them is a no-op.
    */
    pub fn release_frame(&mut self, frame: &DecodedFrame) -> Result<()> {
        if let Some(evicted) = self.core.pool.release(frame.pts(), false)? {
            self.core.backend.release(&evicted)?;
        }
        Ok(())
    }

    /**
        Layout of the output frames, once the first sequence is known.
        Stays valid until the next reconfiguration.
    */
    pub fn output_surface_info(&self) -> Option<OutputSurfaceInfo> {
        self.core
            .geometry
            .map(|geometry| geometry.surface_info(self.core.config.mem_kind))
    }

    /**
        Frames consumed by the flush callback across all reconfigurations.
    */
    pub fn num_flushed_frames(&self) -> usize {
        self.core.num_flushed
    }

    pub fn state(&self) -> SessionState {
        self.core.state
    }

    pub fn geometry(&self) -> Option<&Geometry> {
        self.core.geometry.as_ref()
    }

    pub fn video_format(&self) -> Option<&VideoFormat> {
        self.core.format.as_ref()
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.core.config
    }

    /**
        Returns true once after each reconfiguration that changed the coded
        size (or was forced), so output files can be rotated.
    */
    pub fn take_reconfigured(&mut self) -> bool {
        mem::take(&mut self.core.reconfigured)
    }

    /**
        Register the callback that drains pending frames on reconfiguration.
    */
    pub fn set_reconfigure_flush(&mut self, flush: Box<dyn ReconfigureFlush>, mode: FlushMode) {
        self.core.flush = Some((flush, mode));
    }

    /**
        Register where extracted SEI messages go. Only used when the config
        enables SEI extraction.
    */
    pub fn set_sei_sink(&mut self, sink: Box<dyn SeiSink>) {
        self.core.sei_sink = Some(sink);
    }
}

static_assertions::assert_impl_all!(DecoderSession: Send);
