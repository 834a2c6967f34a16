#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use hwdec_decode::{
    CodecPacket, Copy2d, CopySource, DecodeCaps, DecoderCreateInfo, DeviceBuffer, DeviceStream,
    FlushHandle, HostStream, HwDecoder, MappedFrame, ParserCallbacks, PlanarFrame, Received,
    ReconfigureFlush, SeiSink, SoftwareCodec, SurfaceLayout, VideoParser,
};
use hwdec_types::{
    ChromaFormat, CodecId, DisplayInfo, Error, FlushMode, PictureParams, Pts, Rational, Rect,
    Result, SEI_TYPE_TIME_CODE, SEI_TYPE_USER_DATA_UNREGISTERED, SeiMessage, SeiMessageInfo,
    SourcePacket, SurfaceFormat, VideoFormat,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("hwdec_decode=debug")
        .try_init();
}

/// Payload announcing a `width` x `height` picture.
pub fn payload(width: u16, height: u16) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(4);
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes
}

/// Payload with a display area smaller than the coded picture.
pub fn payload_with_display(width: u16, height: u16, display_w: u16, display_h: u16) -> Vec<u8> {
    let mut bytes = payload(width, height);
    bytes.extend_from_slice(&display_w.to_be_bytes());
    bytes.extend_from_slice(&display_h.to_be_bytes());
    bytes
}

/// (width, height, display width, display height) of a payload.
pub fn dims(payload: &[u8]) -> Result<(u32, u32, u32, u32)> {
    let read = |i: usize| -> Result<u32> {
        payload
            .get(i..i + 2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]) as u32)
            .ok_or_else(|| Error::invalid_parameter("truncated test payload"))
    };
    let (width, height) = (read(0)?, read(2)?);
    if payload.len() >= 8 {
        Ok((width, height, read(4)?, read(6)?))
    } else {
        Ok((width, height, width, height))
    }
}

/**
    Parser double. Every packet carries one picture, displayed after
    `delay` further pictures. Held pictures are displayed before a new
    sequence is announced and at end of stream.
*/
pub struct ScriptedParser {
    codec: CodecId,
    delay: usize,
    current: Option<VideoFormat>,
    surfaces: u32,
    decoded: u32,
    packets: usize,
    held: VecDeque<DisplayInfo>,
    pub emit_sei: bool,
    pub repeat_sequence: bool,
    pub switch_codec: Option<(usize, CodecId)>,
}

impl ScriptedParser {
    pub fn new(codec: CodecId, delay: usize) -> Self {
        Self {
            codec,
            delay,
            current: None,
            surfaces: 1,
            decoded: 0,
            packets: 0,
            held: VecDeque::new(),
            emit_sei: false,
            repeat_sequence: false,
            switch_codec: None,
        }
    }

    fn format(&self, width: u32, height: u32, display_w: u32, display_h: u32) -> VideoFormat {
        VideoFormat {
            codec: self.codec,
            chroma_format: ChromaFormat::Yuv420,
            bit_depth_luma_minus8: 0,
            bit_depth_chroma_minus8: 0,
            coded_width: width.next_multiple_of(16),
            coded_height: height.next_multiple_of(16),
            display_area: Rect::from_size(display_w, display_h),
            frame_rate: Rational::new(30000, 1001),
            progressive: true,
            min_num_decode_surfaces: 4,
            max_size: None,
        }
    }

    fn display_held(&mut self, keep: usize, callbacks: &mut dyn ParserCallbacks) -> Result<()> {
        while self.held.len() > keep {
            if let Some(info) = self.held.pop_front() {
                callbacks.on_picture_display(&info)?;
            }
        }
        Ok(())
    }
}

impl VideoParser for ScriptedParser {
    fn parse(
        &mut self,
        packet: &SourcePacket<'_>,
        callbacks: &mut dyn ParserCallbacks,
    ) -> Result<()> {
        if packet.is_end_of_stream() {
            return self.display_held(0, callbacks);
        }

        match self.switch_codec {
            Some((at, codec)) if at == self.packets => self.codec = codec,
            _ => {}
        }
        self.packets += 1;

        let (width, height, display_w, display_h) = dims(packet.payload)?;
        let format = self.format(width, height, display_w, display_h);
        if self.current.as_ref() != Some(&format) || self.repeat_sequence {
            if self.current.is_some() {
                self.display_held(0, callbacks)?;
            }
            self.surfaces = callbacks.on_sequence(&format)?.max(1);
            self.current = Some(format);
        }

        let picture_index = self.decoded % self.surfaces;
        if self.emit_sei {
            callbacks.on_sei(SeiMessageInfo {
                picture_index,
                messages: vec![
                    SeiMessage {
                        payload_type: SEI_TYPE_USER_DATA_UNREGISTERED,
                        payload: packet.pts.0.to_le_bytes().to_vec(),
                    },
                    SeiMessage {
                        payload_type: SEI_TYPE_TIME_CODE,
                        payload: vec![0; 4],
                    },
                ],
            })?;
        }
        callbacks.on_picture_decode(&PictureParams {
            picture_index,
            bitstream: packet.payload,
            is_reference: true,
            is_intra: self.decoded == 0,
        })?;
        self.decoded += 1;

        self.held.push_back(DisplayInfo::new(picture_index, packet.pts));
        self.display_held(self.delay, callbacks)
    }
}

#[derive(Debug, Default)]
pub struct HwStats {
    pub created: usize,
    pub reconfigured: usize,
    pub decoded: usize,
    pub mapped: usize,
    pub unmapped: usize,
    pub last_info: Option<DecoderCreateInfo>,
}

/**
    Hardware decoder double backed by host-emulated device memory. Each
    decoded surface has its luma filled with the decode count and its chroma
    with 0x80.
*/
pub struct MockHwDecoder {
    stream: Arc<dyn DeviceStream>,
    stats: Arc<Mutex<HwStats>>,
    surfaces: Vec<DeviceBuffer>,
    layout: SurfaceLayout,
    pub fail_decode_at: Option<usize>,
}

impl MockHwDecoder {
    pub fn new() -> (Self, Arc<Mutex<HwStats>>) {
        let stats = Arc::new(Mutex::new(HwStats::default()));
        let decoder = Self {
            stream: Arc::new(HostStream::new()),
            stats: Arc::clone(&stats),
            surfaces: Vec::new(),
            layout: SurfaceLayout {
                pitch: 0,
                vstride: 0,
            },
            fail_decode_at: None,
        };
        (decoder, stats)
    }

    fn allocate(&mut self, info: &DecoderCreateInfo) -> Result<SurfaceLayout> {
        let bpp = if info.bit_depth_minus8 > 0 { 2 } else { 1 };
        let layout = SurfaceLayout {
            pitch: (info.max.width * bpp).next_multiple_of(64),
            vstride: info.max.height.next_multiple_of(16),
        };
        let len = layout.pitch as usize * layout.vstride as usize * 3;
        self.surfaces = (0..info.num_decode_surfaces)
            .map(|_| DeviceBuffer::alloc(&self.stream, len))
            .collect::<Result<_>>()?;
        self.layout = layout;
        self.stats.lock().last_info = Some(*info);
        Ok(layout)
    }
}

impl HwDecoder for MockHwDecoder {
    fn capabilities(&self, _: CodecId, _: ChromaFormat, _: u8) -> Result<DecodeCaps> {
        Ok(DecodeCaps {
            supported: true,
            min_width: 16,
            min_height: 16,
            max_width: 8192,
            max_height: 8192,
        })
    }

    fn create(&mut self, info: &DecoderCreateInfo) -> Result<SurfaceLayout> {
        self.stats.lock().created += 1;
        self.allocate(info)
    }

    fn decode_picture(&mut self, params: &PictureParams<'_>) -> Result<()> {
        let decoded = {
            let mut stats = self.stats.lock();
            stats.decoded += 1;
            stats.decoded
        };
        if self.fail_decode_at == Some(decoded) {
            return Err(Error::runtime("bitstream error"));
        }
        let surface = self
            .surfaces
            .get(params.picture_index as usize)
            .ok_or_else(|| Error::invalid_parameter("picture index out of range"))?;
        let luma = self.layout.pitch as usize * self.layout.vstride as usize;
        let mut data = vec![decoded as u8; luma];
        data.resize(surface.len(), 0x80);
        self.stream
            .copy_2d_async(CopySource::Host(&data), surface.ptr(), Copy2d::linear(data.len()))?;
        self.stream.synchronize()
    }

    fn map_picture(&mut self, picture_index: u32) -> Result<MappedFrame> {
        let surface = self
            .surfaces
            .get(picture_index as usize)
            .ok_or_else(|| Error::invalid_parameter("picture index out of range"))?;
        self.stats.lock().mapped += 1;
        Ok(MappedFrame {
            ptr: surface.ptr(),
            pitch: self.layout.pitch,
            vstride: self.layout.vstride,
        })
    }

    fn unmap_picture(&mut self, _picture_index: u32) -> Result<()> {
        self.stats.lock().unmapped += 1;
        Ok(())
    }

    fn reconfigure(&mut self, info: &DecoderCreateInfo) -> Result<SurfaceLayout> {
        self.stats.lock().reconfigured += 1;
        self.allocate(info)
    }

    fn stream(&self) -> Arc<dyn DeviceStream> {
        Arc::clone(&self.stream)
    }
}

pub struct MockFrame {
    planes: Vec<Vec<u8>>,
    pitches: Vec<usize>,
    pts: Pts,
}

impl PlanarFrame for MockFrame {
    fn surface_format(&self) -> SurfaceFormat {
        SurfaceFormat::Yuv420
    }

    fn plane_count(&self) -> usize {
        self.planes.len()
    }

    fn plane(&self, index: usize) -> &[u8] {
        &self.planes[index]
    }

    fn pitch(&self, index: usize) -> usize {
        self.pitches[index]
    }

    fn pts(&self) -> Option<Pts> {
        Some(self.pts)
    }
}

/**
    Software codec double. Every packet decodes to one padded planar 4:2:0
    frame whose luma holds the packet pts and whose chroma planes hold 0x80
    and 0x90. Planes cover the display area only, rounded up for chroma.
*/
pub struct MockCodec {
    codec: CodecId,
    pending: VecDeque<CodecPacket>,
    draining: bool,
}

impl MockCodec {
    pub fn new(codec: CodecId) -> Self {
        Self {
            codec,
            pending: VecDeque::new(),
            draining: false,
        }
    }

    fn frame(packet: &CodecPacket) -> Result<MockFrame> {
        let (_, _, width, height) = dims(&packet.data)?;
        let (width, height) = (width as usize, height as usize);
        let luma_pitch = width + 32;
        let chroma_pitch = width.div_ceil(2) + 16;
        let chroma_rows = height.div_ceil(2);
        let value = packet.pts.0 as u8;
        Ok(MockFrame {
            planes: vec![
                vec![value; luma_pitch * height],
                vec![0x80; chroma_pitch * chroma_rows],
                vec![0x90; chroma_pitch * chroma_rows],
            ],
            pitches: vec![luma_pitch, chroma_pitch, chroma_pitch],
            pts: packet.pts,
        })
    }
}

impl SoftwareCodec for MockCodec {
    fn codec(&self) -> CodecId {
        self.codec
    }

    fn send_packet(&mut self, packet: Option<&CodecPacket>) -> Result<()> {
        match packet {
            Some(packet) => self.pending.push_back(packet.clone()),
            None => self.draining = true,
        }
        Ok(())
    }

    fn receive_frame(&mut self) -> Result<Received> {
        match self.pending.pop_front() {
            Some(packet) => Ok(Received::Frame(Box::new(Self::frame(&packet)?))),
            None if self.draining => Ok(Received::Eof),
            None => Ok(Received::Again),
        }
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.draining = false;
    }
}

/**
    Flush callback that pulls and releases every pending frame.
*/
#[derive(Clone, Default)]
pub struct RecordingFlush {
    pub flushed: Arc<Mutex<Vec<(Pts, u32)>>>,
    pub modes: Arc<Mutex<Vec<FlushMode>>>,
}

impl ReconfigureFlush for RecordingFlush {
    fn flush(&mut self, handle: &mut FlushHandle<'_>, mode: FlushMode) -> Result<usize> {
        self.modes.lock().push(mode);
        let width = handle.output_surface_info().output_width;
        let mut count = 0;
        while let Some(frame) = handle.get_frame() {
            self.flushed.lock().push((frame.pts(), width));
            handle.release_frame(&frame)?;
            count += 1;
        }
        Ok(count)
    }
}

#[derive(Clone, Default)]
pub struct RecordingSei {
    pub messages: Arc<Mutex<Vec<(Pts, u32)>>>,
}

impl SeiSink for RecordingSei {
    fn write_sei(&mut self, pts: Pts, message: &SeiMessage) -> Result<()> {
        self.messages.lock().push((pts, message.payload_type));
        Ok(())
    }
}
