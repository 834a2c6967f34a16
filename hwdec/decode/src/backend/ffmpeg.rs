/*!
    Software codec implementation on top of ffmpeg.
*/

use ffmpeg_next::{
    codec::{self, decoder::Video as VideoDecoderFFmpeg, threading},
    error::EAGAIN,
    format::Pixel,
    util::frame::video::Video as VideoFrameFFmpeg,
};
use tracing::{debug, info};

use hwdec_types::{ChromaFormat, CodecId, Error, Pts, Result, SurfaceFormat, VideoFormat};

use super::hw::{self, HwDeviceContext};
use super::software::{CodecPacket, PlanarFrame, Received, SoftwareCodec};
use crate::config::DecoderConfig;

fn codec_error(e: ffmpeg_next::Error) -> Error {
    Error::runtime(format!("ffmpeg: {e}"))
}

const fn ffmpeg_codec_id(codec: CodecId) -> codec::Id {
    match codec {
        CodecId::Mpeg1 => codec::Id::MPEG1VIDEO,
        CodecId::Mpeg2 => codec::Id::MPEG2VIDEO,
        CodecId::Mpeg4 => codec::Id::MPEG4,
        CodecId::H264 => codec::Id::H264,
        CodecId::Hevc => codec::Id::HEVC,
        CodecId::Vp8 => codec::Id::VP8,
        CodecId::Vp9 => codec::Id::VP9,
        CodecId::Jpeg => codec::Id::MJPEG,
        CodecId::Av1 => codec::Id::AV1,
        _ => codec::Id::None,
    }
}

fn surface_format(pixel: Pixel) -> Option<SurfaceFormat> {
    match pixel {
        Pixel::YUV420P | Pixel::YUVJ420P | Pixel::GRAY8 => Some(SurfaceFormat::Yuv420),
        Pixel::YUV420P10LE | Pixel::YUV420P12LE | Pixel::GRAY10LE | Pixel::GRAY12LE => {
            Some(SurfaceFormat::Yuv420_16Bit)
        }
        Pixel::YUV444P | Pixel::YUVJ444P => Some(SurfaceFormat::Yuv444),
        Pixel::NV12 => Some(SurfaceFormat::Nv12),
        Pixel::P010LE | Pixel::P016LE => Some(SurfaceFormat::P016),
        _ => None,
    }
}

/**
    A decoded ffmpeg frame in host memory.
*/
struct FfmpegFrame {
    frame: VideoFrameFFmpeg,
    format: SurfaceFormat,
}

impl PlanarFrame for FfmpegFrame {
    fn surface_format(&self) -> SurfaceFormat {
        self.format
    }

    fn plane_count(&self) -> usize {
        self.frame.planes()
    }

    fn plane(&self, index: usize) -> &[u8] {
        self.frame.data(index)
    }

    fn pitch(&self, index: usize) -> usize {
        self.frame.stride(index)
    }

    fn pts(&self) -> Option<Pts> {
        self.frame.pts().map(Pts)
    }
}

/**
    ffmpeg video decoder, optionally accelerated through a hardware device.

    Hardware-accelerated frames are downloaded after decoding and arrive in
    the semi-planar formats.
*/
pub struct FfmpegCodec {
    codec: CodecId,
    decoder: VideoDecoderFFmpeg,
    hw: Option<HwDeviceContext>,
}

impl FfmpegCodec {
    /**
        Open a decoder for `config.codec`.

        Slice threading is used so every packet produces its picture before
        the next one is submitted.
    */
    pub fn open(config: &DecoderConfig) -> Result<Self> {
        ffmpeg_next::init().map_err(codec_error)?;

        let codec = ffmpeg_next::decoder::find(ffmpeg_codec_id(config.codec)).ok_or_else(|| {
            Error::unsupported(format!("no ffmpeg decoder for {}", config.codec.name()))
        })?;

        let mut context = codec::context::Context::new_with_codec(codec);
        context.set_threading(threading::Config {
            kind: threading::Type::Slice,
            count: config.decode_threads as usize,
            ..Default::default()
        });

        let hw = config.hw_device.and_then(HwDeviceContext::try_create);
        if let Some(hw) = &hw {
            unsafe {
                (*context.as_mut_ptr()).hw_device_ctx = hw.create_ref();
            }
        }

        let decoder = context.decoder().video().map_err(codec_error)?;
        info!(
            codec = config.codec.name(),
            threads = config.decode_threads,
            hw = hw.is_some(),
            "opened ffmpeg decoder"
        );

        Ok(Self {
            codec: config.codec,
            decoder,
            hw,
        })
    }

    pub fn is_hw_accelerated(&self) -> bool {
        self.hw.is_some()
    }
}

impl SoftwareCodec for FfmpegCodec {
    fn codec(&self) -> CodecId {
        self.codec
    }

    fn output_format(&self, format: &VideoFormat) -> Result<SurfaceFormat> {
        if !self.is_hw_accelerated() || format.chroma_format == ChromaFormat::Yuv422 {
            return SurfaceFormat::for_software(format.chroma_format, format.bit_depth())
                .ok_or_else(|| {
                    Error::unsupported(format!(
                        "ffmpeg output for {:?} at {} bits",
                        format.chroma_format,
                        format.bit_depth()
                    ))
                });
        }
        Ok(SurfaceFormat::for_hardware(
            format.chroma_format,
            format.bit_depth(),
        ))
    }

    fn send_packet(&mut self, packet: Option<&CodecPacket>) -> Result<()> {
        match packet {
            Some(packet) => {
                let mut ffmpeg_pkt = ffmpeg_next::Packet::copy(&packet.data);
                ffmpeg_pkt.set_pts(Some(packet.pts.0));
                self.decoder.send_packet(&ffmpeg_pkt)
            }
            None => self.decoder.send_eof(),
        }
        .map_err(codec_error)
    }

    fn receive_frame(&mut self) -> Result<Received> {
        let mut decoded = VideoFrameFFmpeg::empty();
        match self.decoder.receive_frame(&mut decoded) {
            Ok(()) => {
                let frame = if hw::is_hw_frame(&decoded) {
                    hw::transfer_hw_frame(&decoded).map_err(codec_error)?
                } else {
                    decoded
                };
                let format = surface_format(frame.format()).ok_or_else(|| {
                    Error::unsupported(format!("unsupported pixel format {:?}", frame.format()))
                })?;
                Ok(Received::Frame(Box::new(FfmpegFrame { frame, format })))
            }
            Err(ffmpeg_next::Error::Other { errno }) if errno == EAGAIN => Ok(Received::Again),
            Err(ffmpeg_next::Error::Eof) => Ok(Received::Eof),
            Err(e) => Err(codec_error(e)),
        }
    }

    fn reset(&mut self) {
        debug!("resetting ffmpeg decoder");
        self.decoder.flush();
    }
}
