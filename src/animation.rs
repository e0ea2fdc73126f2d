//! libwebp animation decoder/encoder handles.
//!
//! `WebPAnimDecoder` and `WebPAnimEncoder` accept still images as well as
//! animations, so the sessions go through them for every container.

use crate::config::EncodeParams;
use crate::error::{DecodingError, Error, Result};
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::ptr;
use whereat::*;

/// Canvas-level information reported by the decoder.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AnimationInfo {
    pub width: u32,
    pub height: u32,
    pub frame_count: u32,
    pub loop_count: u32,
}

/// Owning wrapper around `WebPAnimDecoder`.
pub(crate) struct AnimationDecoder<'d> {
    decoder: *mut libwebp_sys::WebPAnimDecoder,
    info: AnimationInfo,
    // WebPAnimDecoder references the input for its whole lifetime.
    _data: core::marker::PhantomData<&'d [u8]>,
}

impl<'d> AnimationDecoder<'d> {
    pub fn new(data: &'d [u8], use_threads: bool) -> Result<Self> {
        let mut options = core::mem::MaybeUninit::<libwebp_sys::WebPAnimDecoderOptions>::uninit();
        let ok = unsafe { libwebp_sys::WebPAnimDecoderOptionsInit(options.as_mut_ptr()) };
        if ok == 0 {
            return Err(at!(Error::DecodeFailed(DecodingError::InvalidParam)));
        }
        let mut options = unsafe { options.assume_init() };

        options.color_mode = libwebp_sys::WEBP_CSP_MODE::MODE_RGBA;
        options.use_threads = use_threads as i32;

        let webp_data = libwebp_sys::WebPData {
            bytes: data.as_ptr(),
            size: data.len(),
        };

        let decoder = unsafe { libwebp_sys::WebPAnimDecoderNew(&webp_data, &options) };
        if decoder.is_null() {
            return Err(at!(Error::DecodeFailed(DecodingError::BitstreamError)));
        }

        let mut anim_info = libwebp_sys::WebPAnimInfo::default();
        let ok = unsafe { libwebp_sys::WebPAnimDecoderGetInfo(decoder, &mut anim_info) };
        if ok == 0 {
            unsafe { libwebp_sys::WebPAnimDecoderDelete(decoder) };
            return Err(at!(Error::DecodeFailed(DecodingError::BitstreamError)));
        }

        Ok(Self {
            decoder,
            info: AnimationInfo {
                width: anim_info.canvas_width,
                height: anim_info.canvas_height,
                frame_count: anim_info.frame_count,
                loop_count: anim_info.loop_count,
            },
            _data: core::marker::PhantomData,
        })
    }

    pub fn info(&self) -> AnimationInfo {
        self.info
    }

    /// Composite the next frame onto the canvas and append it to `out`.
    ///
    /// Returns the frame's end timestamp, or `None` after the last frame.
    pub fn next_frame_into(&mut self, out: &mut Vec<u8>) -> Result<Option<i32>> {
        if unsafe { libwebp_sys::WebPAnimDecoderHasMoreFrames(self.decoder) } == 0 {
            return Ok(None);
        }

        let mut buf: *mut u8 = ptr::null_mut();
        let mut timestamp: i32 = 0;
        let ok =
            unsafe { libwebp_sys::WebPAnimDecoderGetNext(self.decoder, &mut buf, &mut timestamp) };
        if ok == 0 || buf.is_null() {
            return Err(at!(Error::DecodeFailed(DecodingError::BitstreamError)));
        }

        // The canvas buffer is owned by the decoder and reused on the next call.
        let size = (self.info.width as usize) * (self.info.height as usize) * 4;
        let canvas = unsafe { core::slice::from_raw_parts(buf, size) };
        out.try_reserve(size)
            .map_err(|_| at!(Error::DecodeFailed(DecodingError::OutOfMemory)))?;
        out.extend_from_slice(canvas);

        Ok(Some(timestamp))
    }
}

impl Drop for AnimationDecoder<'_> {
    fn drop(&mut self) {
        if !self.decoder.is_null() {
            unsafe {
                libwebp_sys::WebPAnimDecoderDelete(self.decoder);
            }
        }
    }
}

/// Owning wrapper around `WebPAnimEncoder`.
pub(crate) struct AnimationEncoder {
    encoder: *mut libwebp_sys::WebPAnimEncoder,
    width: u32,
    height: u32,
    config: libwebp_sys::WebPConfig,
}

impl AnimationEncoder {
    pub fn new(width: u32, height: u32, params: &EncodeParams) -> Result<Self> {
        let config = params.to_libwebp()?;

        let mut options = core::mem::MaybeUninit::<libwebp_sys::WebPAnimEncoderOptions>::uninit();
        let ok = unsafe {
            libwebp_sys::WebPAnimEncoderOptionsInitInternal(
                options.as_mut_ptr(),
                libwebp_sys::WEBP_MUX_ABI_VERSION as i32,
            )
        };
        if ok == 0 {
            return Err(at!(Error::EncodeFailed(
                "failed to init encoder options".into()
            )));
        }
        let mut options = unsafe { options.assume_init() };

        options.allow_mixed = 0;
        options.anim_params.loop_count = params.loop_count() as i32;
        if let Some((kmin, kmax)) = params.keyframe_spacing() {
            options.kmin = kmin;
            options.kmax = kmax;
        }

        let encoder = unsafe {
            libwebp_sys::WebPAnimEncoderNewInternal(
                width as i32,
                height as i32,
                &options,
                libwebp_sys::WEBP_MUX_ABI_VERSION as i32,
            )
        };
        if encoder.is_null() {
            return Err(at!(Error::EncodeFailed(
                "failed to create encoder".into()
            )));
        }

        Ok(Self {
            encoder,
            width,
            height,
            config,
        })
    }

    /// Add one RGBA8 frame shown from `timestamp_ms`.
    pub fn add_frame_rgba(&mut self, data: &[u8], timestamp_ms: i32) -> Result<()> {
        let expected = (self.width as usize) * (self.height as usize) * 4;
        if data.len() < expected {
            return Err(at!(Error::BufferTooSmall {
                required: expected,
                actual: data.len(),
            }));
        }

        let mut picture = libwebp_sys::WebPPicture::new()
            .map_err(|_| at!(Error::EncodeFailed("failed to init picture".into())))?;

        picture.width = self.width as i32;
        picture.height = self.height as i32;
        picture.use_argb = 1;

        let stride = (self.width as usize * 4) as i32;
        let import_ok =
            unsafe { libwebp_sys::WebPPictureImportRGBA(&mut picture, data.as_ptr(), stride) };
        if import_ok == 0 {
            unsafe { libwebp_sys::WebPPictureFree(&mut picture) };
            return Err(at!(Error::EncodeFailed("out of memory".into())));
        }

        let ok = unsafe {
            libwebp_sys::WebPAnimEncoderAdd(self.encoder, &mut picture, timestamp_ms, &self.config)
        };

        unsafe { libwebp_sys::WebPPictureFree(&mut picture) };

        if ok == 0 {
            return Err(at!(Error::EncodeFailed(self.last_error())));
        }

        Ok(())
    }

    /// Close the frame list at `end_timestamp_ms` and assemble the container.
    pub fn finish(self, end_timestamp_ms: i32) -> Result<Vec<u8>> {
        // A NULL frame marks the end of the stream.
        let ok = unsafe {
            libwebp_sys::WebPAnimEncoderAdd(
                self.encoder,
                ptr::null_mut(),
                end_timestamp_ms,
                ptr::null(),
            )
        };
        if ok == 0 {
            return Err(at!(Error::EncodeFailed(format!(
                "failed to close frame list: {}",
                self.last_error()
            ))));
        }

        let mut webp_data = libwebp_sys::WebPData::default();
        let ok = unsafe { libwebp_sys::WebPAnimEncoderAssemble(self.encoder, &mut webp_data) };
        if ok == 0 {
            return Err(at!(Error::EncodeFailed(format!(
                "failed to assemble: {}",
                self.last_error()
            ))));
        }

        let result = unsafe {
            if webp_data.bytes.is_null() || webp_data.size == 0 {
                return Err(at!(Error::EncodeFailed("empty output".into())));
            }
            let slice = core::slice::from_raw_parts(webp_data.bytes, webp_data.size);
            let vec = slice.to_vec();
            libwebp_sys::WebPDataClear(&mut webp_data);
            vec
        };

        Ok(result)
    }

    fn last_error(&self) -> String {
        unsafe {
            let ptr = libwebp_sys::WebPAnimEncoderGetError(self.encoder);
            if ptr.is_null() {
                "unknown error".into()
            } else {
                core::ffi::CStr::from_ptr(ptr)
                    .to_str()
                    .unwrap_or("unknown error")
                    .into()
            }
        }
    }
}

impl Drop for AnimationEncoder {
    fn drop(&mut self) {
        if !self.encoder.is_null() {
            unsafe {
                libwebp_sys::WebPAnimEncoderDelete(self.encoder);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoder_creation() {
        assert!(AnimationEncoder::new(100, 100, &EncodeParams::default()).is_ok());
    }

    #[test]
    fn test_decoder_rejects_garbage() {
        assert!(AnimationDecoder::new(b"RIFF\0\0\0\0WEBP", false).is_err());
        assert!(AnimationDecoder::new(&[0u8; 64], false).is_err());
    }
}
