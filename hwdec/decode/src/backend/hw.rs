/*!
    ffmpeg hardware device contexts for the software backend.
*/

use std::ptr;

use ffmpeg_next::{ffi, util::frame::video::Video as VideoFrameFFmpeg};
use tracing::debug;

use crate::config::HwDevice;

/**
    Owned reference to an ffmpeg hardware device context.
*/
pub(crate) struct HwDeviceContext {
    ctx: *mut ffi::AVBufferRef,
}

impl HwDeviceContext {
    /**
        Try to create a context for `device`.

        Returns None if the device is not compiled in or not present.
    */
    pub fn try_create(device: HwDevice) -> Option<Self> {
        let device_type = device_type(device)?;

        let mut hw_device_ctx: *mut ffi::AVBufferRef = ptr::null_mut();
        let ret = unsafe {
            ffi::av_hwdevice_ctx_create(
                &mut hw_device_ctx,
                device_type,
                ptr::null(),
                ptr::null_mut(),
                0,
            )
        };
        if ret < 0 || hw_device_ctx.is_null() {
            debug!(?device, ret, "hardware device unavailable");
            return None;
        }
        Some(Self { ctx: hw_device_ctx })
    }

    /**
        New reference to the context, to be owned by a codec context.
    */
    pub fn create_ref(&self) -> *mut ffi::AVBufferRef {
        unsafe { ffi::av_buffer_ref(self.ctx) }
    }
}

impl Drop for HwDeviceContext {
    fn drop(&mut self) {
        if !self.ctx.is_null() {
            unsafe {
                ffi::av_buffer_unref(&mut self.ctx);
            }
        }
    }
}

// SAFETY: The buffer reference is reference counted by ffmpeg and only
// passed to av_buffer_ref / av_buffer_unref.
unsafe impl Send for HwDeviceContext {}

fn device_type(device: HwDevice) -> Option<ffi::AVHWDeviceType> {
    match device {
        HwDevice::VideoToolbox if cfg!(feature = "videotoolbox") => {
            Some(ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_VIDEOTOOLBOX)
        }
        HwDevice::Vaapi if cfg!(feature = "vaapi") => {
            Some(ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_VAAPI)
        }
        HwDevice::Cuda if cfg!(feature = "cuda") => Some(ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_CUDA),
        _ => None,
    }
}

/**
    Check if a frame lives in device memory and needs a transfer.
*/
pub(crate) fn is_hw_frame(frame: &VideoFrameFFmpeg) -> bool {
    unsafe { !(*frame.as_ptr()).hw_frames_ctx.is_null() }
}

/**
    Download a hardware frame into a new software frame, keeping its pts.
*/
pub(crate) fn transfer_hw_frame(
    hw_frame: &VideoFrameFFmpeg,
) -> Result<VideoFrameFFmpeg, ffmpeg_next::Error> {
    let mut sw_frame = VideoFrameFFmpeg::empty();
    unsafe {
        let ret = ffi::av_hwframe_transfer_data(sw_frame.as_mut_ptr(), hw_frame.as_ptr(), 0);
        if ret < 0 {
            return Err(ffmpeg_next::Error::from(ret));
        }
        (*sw_frame.as_mut_ptr()).pts = (*hw_frame.as_ptr()).pts;
    }
    Ok(sw_frame)
}
