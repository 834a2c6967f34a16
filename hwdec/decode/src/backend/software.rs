/*!
    Software decode backend.

    Feeds whole packets to a [`SoftwareCodec`], either inline on the
    caller's thread or through a dedicated decode worker, and copies the
    planar frames it produces into pool slots.
*/

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use hwdec_types::{CodecId, Error, MemoryKind, Pts, Result, SurfaceFormat, VideoFormat};

use crate::assembler::{self, PlaneSource};
use crate::config::Threading;
use crate::device::{DeviceBuffer, DeviceStream, HostStream};
use crate::geometry::Geometry;
use crate::pool::{FramePool, Surface};
use crate::queue::WorkQueue;

/**
    A decoded frame in planar host memory.
*/
pub trait PlanarFrame: Send {
    fn surface_format(&self) -> SurfaceFormat;

    fn plane_count(&self) -> usize;

    /**
        Bytes of plane `index`, starting at its first row.
    */
    fn plane(&self, index: usize) -> &[u8];

    fn pitch(&self, index: usize) -> usize;

    /**
        Timestamp carried through the codec, if any.
    */
    fn pts(&self) -> Option<Pts>;
}

/**
    Outcome of asking the codec for a frame.
*/
pub enum Received {
    Frame(Box<dyn PlanarFrame>),
    /// More input is needed
    Again,
    /// The codec is fully drained
    Eof,
}

/**
    A compressed packet owned by the codec input path.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodecPacket {
    pub data: Vec<u8>,
    pub pts: Pts,
}

/**
    Software decoder library.

    The codec is opened when the implementation is constructed.
*/
pub trait SoftwareCodec: Send {
    fn codec(&self) -> CodecId;

    /**
        Surface format frames of `format` will be delivered in.
    */
    fn output_format(&self, format: &VideoFormat) -> Result<SurfaceFormat> {
        SurfaceFormat::for_software(format.chroma_format, format.bit_depth()).ok_or_else(|| {
            Error::unsupported(format!(
                "software decoding of {:?} at {} bits",
                format.chroma_format,
                format.bit_depth()
            ))
        })
    }

    /**
        Submit a packet, or `None` to start draining.
    */
    fn send_packet(&mut self, packet: Option<&CodecPacket>) -> Result<()>;

    fn receive_frame(&mut self) -> Result<Received>;

    /**
        Drop all buffered state, e.g. after a seek.
    */
    fn reset(&mut self);
}

enum WorkItem {
    Packet(CodecPacket),
    Drain,
    Reset,
}

struct Shared {
    codec: Mutex<Box<dyn SoftwareCodec>>,
    frames: WorkQueue<Box<dyn PlanarFrame>>,
    error: Mutex<Option<String>>,
    in_flight: AtomicUsize,
    decoded: AtomicUsize,
}

impl Shared {
    fn process(&self, item: WorkItem) -> Result<()> {
        let mut codec = self.codec.lock();
        match item {
            WorkItem::Packet(packet) => {
                codec.send_packet(Some(&packet))?;
                self.receive(codec.as_mut())
            }
            WorkItem::Drain => {
                codec.send_packet(None)?;
                self.receive(codec.as_mut())
            }
            WorkItem::Reset => {
                codec.reset();
                self.frames.reset();
                Ok(())
            }
        }
    }

    fn receive(&self, codec: &mut dyn SoftwareCodec) -> Result<()> {
        loop {
            match codec.receive_frame()? {
                Received::Frame(frame) => {
                    self.decoded.fetch_add(1, Ordering::Relaxed);
                    self.frames.push(frame);
                }
                Received::Again => return Ok(()),
                Received::Eof => {
                    self.frames.set_end_of_stream();
                    return Ok(());
                }
            }
        }
    }

    fn fail(&self, error: &Error) {
        *self.error.lock() = Some(error.to_string());
        self.frames.set_end_of_stream();
    }

    fn check_error(&self) -> Result<()> {
        match self.error.lock().as_ref() {
            Some(message) => Err(Error::runtime(format!("decode worker failed: {message}"))),
            None => Ok(()),
        }
    }
}

fn run_worker(shared: Arc<Shared>, packets: Arc<WorkQueue<WorkItem>>) {
    while let Some(item) = packets.pop_blocking() {
        if let Err(e) = shared.process(item) {
            warn!("software decode failed: {e}");
            shared.fail(&e);
        }
        shared.in_flight.fetch_sub(1, Ordering::SeqCst);
        shared.frames.wake();
    }
    debug!(
        frames = shared.decoded.load(Ordering::Relaxed),
        "decode worker exiting"
    );
}

struct Worker {
    packets: Arc<WorkQueue<WorkItem>>,
    handle: Option<JoinHandle<()>>,
}

pub struct SoftwareBackend {
    codec_id: CodecId,
    shared: Arc<Shared>,
    worker: Option<Worker>,
    stream: Arc<dyn DeviceStream>,
}

impl SoftwareBackend {
    /**
        Wrap an opened codec. Device-copied output goes through `stream`,
        or a host-emulated stream when none is given.
    */
    pub fn new(
        codec: Box<dyn SoftwareCodec>,
        threading: Threading,
        stream: Option<Arc<dyn DeviceStream>>,
    ) -> Result<Self> {
        let codec_id = codec.codec();
        let shared = Arc::new(Shared {
            codec: Mutex::new(codec),
            frames: WorkQueue::new(),
            error: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            decoded: AtomicUsize::new(0),
        });

        let worker = match threading {
            Threading::SingleThreaded => None,
            Threading::WorkerThread => {
                let packets = Arc::new(WorkQueue::new());
                let handle = thread::Builder::new().name("hwdec-decode".into()).spawn({
                    let shared = Arc::clone(&shared);
                    let packets = Arc::clone(&packets);
                    move || run_worker(shared, packets)
                })?;
                Some(Worker {
                    packets,
                    handle: Some(handle),
                })
            }
        };

        Ok(Self {
            codec_id,
            shared,
            worker,
            stream: stream.unwrap_or_else(|| Arc::new(HostStream::new())),
        })
    }

    pub fn codec_id(&self) -> CodecId {
        self.codec_id
    }

    /**
        Surface format for a sequence, rejecting streams of another codec.
    */
    pub fn output_format(&self, format: &VideoFormat) -> Result<SurfaceFormat> {
        if format.codec != self.codec_id {
            return Err(Error::unsupported(format!(
                "software codec was opened for {}, stream is {}",
                self.codec_id.name(),
                format.codec.name()
            )));
        }
        self.shared.codec.lock().output_format(format)
    }

    fn submit(&mut self, item: WorkItem) -> Result<()> {
        match &self.worker {
            Some(worker) => {
                self.shared.in_flight.fetch_add(1, Ordering::SeqCst);
                if !worker.packets.push(item) {
                    self.shared.in_flight.fetch_sub(1, Ordering::SeqCst);
                    return Err(Error::runtime("decode worker has stopped"));
                }
                self.shared.check_error()
            }
            None => self.shared.process(item),
        }
    }

    pub fn decode(&mut self, packet: CodecPacket) -> Result<()> {
        trace!(pts = %packet.pts, len = packet.data.len(), "submitting packet");
        self.submit(WorkItem::Packet(packet))
    }

    /**
        Ask the codec for everything it still buffers.
    */
    pub fn drain(&mut self) -> Result<()> {
        self.submit(WorkItem::Drain)
    }

    pub fn reset(&mut self) -> Result<()> {
        self.submit(WorkItem::Reset)
    }

    /**
        Next decoded frame. In worker mode this waits while the worker still
        has input to process.
    */
    fn next_frame(&self) -> Result<Option<Box<dyn PlanarFrame>>> {
        let frame = match &self.worker {
            Some(_) => {
                let shared = &self.shared;
                shared
                    .frames
                    .pop_blocking_while(|| shared.in_flight.load(Ordering::SeqCst) > 0)
            }
            None => self.shared.frames.try_pop(),
        };
        if frame.is_none() {
            self.shared.check_error()?;
        }
        Ok(frame)
    }

    /**
        Copy the next decoded frame into a pool slot. Returns false when no
        frame is available.
    */
    pub fn display(
        &mut self,
        pts: Pts,
        picture_index: u32,
        geometry: &Geometry,
        pool: &FramePool,
    ) -> Result<bool> {
        let Some(frame) = self.next_frame()? else {
            return Ok(false);
        };
        let pts = frame.pts().unwrap_or(pts);
        self.materialize(frame.as_ref(), pts, picture_index, geometry, pool)?;
        Ok(true)
    }

    fn materialize(
        &self,
        frame: &dyn PlanarFrame,
        pts: Pts,
        picture_index: u32,
        geometry: &Geometry,
        pool: &FramePool,
    ) -> Result<()> {
        if frame.surface_format() != geometry.surface_format {
            return Err(Error::unsupported(format!(
                "decoded frame is {:?}, session expects {:?}",
                frame.surface_format(),
                geometry.surface_format
            )));
        }
        let planes = frame
            .plane_count()
            .min(1 + geometry.num_chroma_planes as usize);
        let pitches: Vec<usize> = (0..planes).map(|i| frame.pitch(i)).collect();
        let sources: Vec<PlaneSource<'_>> =
            (0..planes).map(|i| PlaneSource::Host(frame.plane(i))).collect();
        let plan = assembler::plan(geometry, &pitches)?;
        let frame_size = geometry.frame_size();
        let stream = &self.stream;

        match pool.mem_kind() {
            MemoryKind::HostCopied => pool.materialize(
                pts,
                picture_index,
                frame_size,
                || Ok(Surface::Host(vec![0u8; frame_size].into_boxed_slice())),
                |surface| assembler::fill_surface(surface, &plan, &sources, None),
            ),
            MemoryKind::DeviceCopied => pool.materialize(
                pts,
                picture_index,
                frame_size,
                || Ok(Surface::Device(DeviceBuffer::alloc(stream, frame_size)?)),
                |surface| assembler::fill_surface(surface, &plan, &sources, None),
            ),
            kind => Err(Error::unsupported(format!(
                "software decoding does not support {kind:?} output"
            ))),
        }
    }

    /**
        Frames the codec has produced so far.
    */
    pub fn frames_decoded(&self) -> usize {
        self.shared.decoded.load(Ordering::Relaxed)
    }
}

impl Drop for SoftwareBackend {
    fn drop(&mut self) {
        if let Some(worker) = &mut self.worker {
            worker.packets.close();
            self.shared.frames.close();
            let panicked = worker
                .handle
                .take()
                .is_some_and(|handle| handle.join().is_err());
            if panicked {
                warn!("decode worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use hwdec_types::{ChromaFormat, Rational, Rect};

    use super::*;

    struct Frame {
        format: SurfaceFormat,
        pts: Pts,
        planes: Vec<Vec<u8>>,
        pitch: usize,
    }

    impl PlanarFrame for Frame {
        fn surface_format(&self) -> SurfaceFormat {
            self.format
        }
        fn plane_count(&self) -> usize {
            self.planes.len()
        }
        fn plane(&self, index: usize) -> &[u8] {
            &self.planes[index]
        }
        fn pitch(&self, index: usize) -> usize {
            if index == 0 { self.pitch } else { self.pitch / 2 }
        }
        fn pts(&self) -> Option<Pts> {
            Some(self.pts)
        }
    }

    /// Emits one 8x4 frame per packet, held back by `delay` packets.
    struct Codec {
        delay: usize,
        format: SurfaceFormat,
        held: VecDeque<Pts>,
        draining: bool,
    }

    impl Codec {
        fn new(delay: usize) -> Self {
            Self {
                delay,
                format: SurfaceFormat::Yuv420,
                held: VecDeque::new(),
                draining: false,
            }
        }

        fn frame(&self, pts: Pts) -> Box<dyn PlanarFrame> {
            let value = pts.0 as u8;
            Box::new(Frame {
                format: self.format,
                pts,
                planes: vec![vec![value; 8 * 4], vec![0x80; 4 * 2], vec![0x81; 4 * 2]],
                pitch: 8,
            })
        }
    }

    impl SoftwareCodec for Codec {
        fn codec(&self) -> CodecId {
            CodecId::Vp9
        }
        fn send_packet(&mut self, packet: Option<&CodecPacket>) -> Result<()> {
            match packet {
                Some(packet) => self.held.push_back(packet.pts),
                None => self.draining = true,
            }
            Ok(())
        }
        fn receive_frame(&mut self) -> Result<Received> {
            if self.held.len() > self.delay || (self.draining && !self.held.is_empty()) {
                let pts = self.held.pop_front().unwrap();
                return Ok(Received::Frame(self.frame(pts)));
            }
            Ok(if self.draining { Received::Eof } else { Received::Again })
        }
        fn reset(&mut self) {
            self.held.clear();
            self.draining = false;
        }
    }

    fn geometry() -> Geometry {
        let format = VideoFormat {
            codec: CodecId::Vp9,
            chroma_format: ChromaFormat::Yuv420,
            bit_depth_luma_minus8: 0,
            bit_depth_chroma_minus8: 0,
            coded_width: 8,
            coded_height: 4,
            display_area: Rect::from_size(8, 4),
            frame_rate: Rational::new(30, 1),
            progressive: true,
            min_num_decode_surfaces: 2,
            max_size: None,
        };
        Geometry::derive(&format, SurfaceFormat::Yuv420, None).unwrap()
    }

    fn packet(pts: i64) -> CodecPacket {
        CodecPacket {
            data: vec![0; 4],
            pts: Pts(pts),
        }
    }

    #[test]
    fn inline_decode_fills_host_slots() {
        let mut backend =
            SoftwareBackend::new(Box::new(Codec::new(0)), Threading::SingleThreaded, None)
                .unwrap();
        let pool = FramePool::new(MemoryKind::HostCopied);
        let geometry = geometry();

        backend.decode(packet(3)).unwrap();
        assert!(backend.display(Pts(0), 0, &geometry, &pool).unwrap());
        assert!(!backend.display(Pts(0), 1, &geometry, &pool).unwrap());

        let frame = pool.pop().unwrap();
        assert_eq!(frame.pts(), Pts(3));
        let bytes = frame.host_bytes().unwrap();
        assert_eq!(bytes.len(), geometry.frame_size());
        assert!(bytes[..32].iter().all(|&b| b == 3));
        assert!(bytes[32..40].iter().all(|&b| b == 0x80));
        assert!(bytes[40..].iter().all(|&b| b == 0x81));
        assert_eq!(backend.frames_decoded(), 1);
    }

    #[test]
    fn worker_display_does_not_wait_on_an_idle_codec() {
        let mut backend =
            SoftwareBackend::new(Box::new(Codec::new(1)), Threading::WorkerThread, None).unwrap();
        let pool = FramePool::new(MemoryKind::HostCopied);
        let geometry = geometry();

        backend.decode(packet(0)).unwrap();
        // held back by the codec
        assert!(!backend.display(Pts(0), 0, &geometry, &pool).unwrap());

        backend.decode(packet(1)).unwrap();
        assert!(backend.display(Pts(1), 1, &geometry, &pool).unwrap());

        backend.drain().unwrap();
        assert!(backend.display(Pts(0), 0, &geometry, &pool).unwrap());
        assert!(!backend.display(Pts(0), 0, &geometry, &pool).unwrap());

        let order: Vec<Pts> = std::iter::from_fn(|| pool.pop()).map(|f| f.pts()).collect();
        assert_eq!(order, vec![Pts(0), Pts(1)]);
    }

    #[test]
    fn device_copies_use_the_stream() {
        let mut backend =
            SoftwareBackend::new(Box::new(Codec::new(0)), Threading::SingleThreaded, None)
                .unwrap();
        let pool = FramePool::new(MemoryKind::DeviceCopied);
        let geometry = geometry();

        backend.decode(packet(9)).unwrap();
        assert!(backend.display(Pts(9), 0, &geometry, &pool).unwrap());
        let bytes = pool.pop().unwrap().copy_to_host().unwrap();
        assert!(bytes[..32].iter().all(|&b| b == 9));
    }

    #[test]
    fn mismatched_frame_format_is_unsupported() {
        let mut codec = Codec::new(0);
        codec.format = SurfaceFormat::Yuv444;
        let mut backend =
            SoftwareBackend::new(Box::new(codec), Threading::SingleThreaded, None).unwrap();
        let pool = FramePool::new(MemoryKind::HostCopied);

        backend.decode(packet(0)).unwrap();
        let err = backend.display(Pts(0), 0, &geometry(), &pool).unwrap_err();
        assert!(err.is_unsupported());
        assert!(pool.is_empty());
    }

    #[test]
    fn stream_of_another_codec_is_rejected() {
        let backend =
            SoftwareBackend::new(Box::new(Codec::new(0)), Threading::SingleThreaded, None)
                .unwrap();
        let mut format = VideoFormat {
            codec: CodecId::H264,
            chroma_format: ChromaFormat::Yuv420,
            bit_depth_luma_minus8: 0,
            bit_depth_chroma_minus8: 0,
            coded_width: 8,
            coded_height: 4,
            display_area: Rect::from_size(8, 4),
            frame_rate: Rational::new(30, 1),
            progressive: true,
            min_num_decode_surfaces: 2,
            max_size: None,
        };
        assert!(backend.output_format(&format).unwrap_err().is_unsupported());

        format.codec = CodecId::Vp9;
        format.chroma_format = ChromaFormat::Yuv422;
        assert!(backend.output_format(&format).unwrap_err().is_unsupported());
    }
}
