//! Single-use decode sessions.

use crate::animation::AnimationDecoder;
use crate::config::DecoderConfig;
use crate::error::{DecodingError, Error, Result};
use crate::image::{frame_len, ImageHandle, BYTES_PER_PIXEL};
use crate::types::{anim_loop_count, find_chunk, ContainerInfo};
use alloc::format;
use alloc::vec::Vec;
use whereat::*;

/// Lifecycle of a [`DecodeSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    /// No input consumed yet.
    Empty,
    /// Input decoded; frames are available.
    Loaded,
    /// Input rejected; the session reports zero frames.
    Failed,
}

#[derive(Debug, Clone, Copy)]
struct FrameMeta {
    delay_ms: u32,
}

/// Decodes one encoded buffer and hands out its frames.
///
/// `decode` may be called once. Frames are fully decoded up front and
/// handed out as [`ImageHandle`] views that borrow the session.
///
/// # Example
///
/// ```rust,no_run
/// use webp_session::DecodeSession;
///
/// let bytes: &[u8] = &[0u8; 100]; // placeholder
/// let mut session = DecodeSession::new();
/// session.decode(bytes)?;
///
/// let mut row = Vec::new();
/// for frame in session.frames() {
///     row.resize(frame.row_bytes(), 0);
///     for y in 0..frame.height() {
///         frame.read_row(y, &mut row)?;
///     }
/// }
/// # Ok::<(), webp_session::At<webp_session::Error>>(())
/// ```
#[derive(Debug)]
pub struct DecodeSession {
    config: DecoderConfig,
    state: DecodeState,
    width: u32,
    height: u32,
    channels: u8,
    loop_count: u32,
    frames: Vec<FrameMeta>,
    pixels: Vec<u8>,
}

impl Default for DecodeSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodeSession {
    /// Create an empty session with default configuration.
    pub fn new() -> Self {
        Self::with_config(DecoderConfig::default())
    }

    /// Create an empty session with the given configuration.
    pub fn with_config(config: DecoderConfig) -> Self {
        Self {
            config,
            state: DecodeState::Empty,
            width: 0,
            height: 0,
            channels: 0,
            loop_count: 0,
            frames: Vec::new(),
            pixels: Vec::new(),
        }
    }

    /// Decode `data` completely.
    ///
    /// Moves the session to [`DecodeState::Loaded`] on success and to
    /// [`DecodeState::Failed`] otherwise. A second call fails with
    /// [`Error::AlreadyDecoded`] whatever the outcome of the first.
    pub fn decode(&mut self, data: &[u8]) -> Result<()> {
        if self.state != DecodeState::Empty {
            return Err(at!(Error::AlreadyDecoded));
        }

        match self.decode_inner(data) {
            Ok(()) => {
                self.state = DecodeState::Loaded;
                tracing::debug!(
                    width = self.width,
                    height = self.height,
                    frames = self.frames.len(),
                    "decoded container"
                );
                Ok(())
            }
            Err(e) => {
                self.state = DecodeState::Failed;
                self.frames.clear();
                self.pixels = Vec::new();
                tracing::warn!(bytes = data.len(), error = %e.error(), "decode rejected");
                Err(e)
            }
        }
    }

    fn decode_inner(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(at!(Error::DecodeFailed(DecodingError::NotEnoughData)));
        }

        let container = ContainerInfo::probe(data)?;
        self.channels = container.channel_count();

        if let Some((width, height)) = self.config.scale {
            if container.has_animation {
                return Err(at!(Error::InvalidOption(
                    "scaling applies to still images only".into()
                )));
            }
            let frame_bytes = frame_len(width, height)?;
            self.config.limits.check(width, height, 1)?;
            decode_scaled(
                data,
                width,
                height,
                self.config.use_threads,
                frame_bytes,
                &mut self.pixels,
            )?;
            self.width = width;
            self.height = height;
            self.frames.push(FrameMeta { delay_ms: 0 });
            return Ok(());
        }

        // An animation header with no ANMF chunk has nothing to composite.
        if container.has_animation && find_chunk(data, b"ANMF").is_none() {
            self.config
                .limits
                .check(container.width, container.height, 0)?;
            self.width = container.width;
            self.height = container.height;
            self.loop_count = anim_loop_count(data).unwrap_or(0);
            return Ok(());
        }

        let mut decoder = AnimationDecoder::new(data, self.config.use_threads)?;
        let info = decoder.info();

        self.config
            .limits
            .check(info.width, info.height, info.frame_count)?;

        self.width = info.width;
        self.height = info.height;
        self.loop_count = info.loop_count;

        let total = decoded_len(info.width, info.height, info.frame_count)?;
        self.frames
            .try_reserve(info.frame_count as usize)
            .map_err(|_| at!(Error::DecodeFailed(DecodingError::OutOfMemory)))?;
        self.pixels
            .try_reserve(total)
            .map_err(|_| at!(Error::DecodeFailed(DecodingError::OutOfMemory)))?;

        let mut prev_end = 0i32;
        while let Some(end) = decoder.next_frame_into(&mut self.pixels)? {
            // Still images carry no timing.
            let delay_ms = if container.has_animation {
                end.saturating_sub(prev_end).max(0) as u32
            } else {
                0
            };
            prev_end = end;
            self.frames.push(FrameMeta { delay_ms });
        }

        Ok(())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DecodeState {
        self.state
    }

    /// Number of decoded frames; 0 unless the session is loaded.
    pub fn frame_count(&self) -> usize {
        match self.state {
            DecodeState::Loaded => self.frames.len(),
            DecodeState::Empty | DecodeState::Failed => 0,
        }
    }

    /// Animation repeat count: `Some(0)` loops forever, `Some(n)` plays
    /// `n` times.
    ///
    /// `None` when fewer than two frames were decoded, since a single
    /// frame has no loop semantics.
    pub fn loop_count(&self) -> Option<u32> {
        if self.frame_count() > 1 {
            Some(self.loop_count)
        } else {
            None
        }
    }

    /// Canvas dimensions once loaded.
    pub fn canvas_size(&self) -> Option<(u32, u32)> {
        match self.state {
            DecodeState::Loaded => Some((self.width, self.height)),
            DecodeState::Empty | DecodeState::Failed => None,
        }
    }

    /// View of frame `index`.
    ///
    /// Fails with [`Error::InvalidState`] before [`decode`](Self::decode)
    /// and with [`Error::OutOfRange`] for `index >= frame_count()`.
    pub fn frame(&self, index: usize) -> Result<ImageHandle<'_>> {
        if self.state == DecodeState::Empty {
            return Err(at!(Error::InvalidState("frame requested before decode")));
        }
        let len = self.frame_count();
        let meta = match self.frames.get(index) {
            Some(meta) if index < len => meta,
            _ => return Err(at!(Error::OutOfRange { index, len })),
        };

        let frame_bytes = self.width as usize * self.height as usize * BYTES_PER_PIXEL;
        let start = index * frame_bytes;
        Ok(ImageHandle::view(
            &self.pixels[start..start + frame_bytes],
            self.width,
            self.height,
            self.channels,
            meta.delay_ms,
        ))
    }

    /// Iterate over all frames in display order.
    pub fn frames(&self) -> Frames<'_> {
        Frames {
            session: self,
            next: 0,
        }
    }
}

/// Bytes needed to hold `frames` composited RGBA8 canvases.
fn decoded_len(width: u32, height: u32, frames: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(BYTES_PER_PIXEL))
        .and_then(|n| n.checked_mul(frames as usize))
        .ok_or_else(|| {
            at!(Error::LimitExceeded(format!(
                "{} frames of {}x{} overflow the address space",
                frames, width, height
            )))
        })
}

/// Decode a still image resized to `width` x `height` into `out`.
fn decode_scaled(
    data: &[u8],
    width: u32,
    height: u32,
    use_threads: bool,
    frame_bytes: usize,
    out: &mut Vec<u8>,
) -> Result<()> {
    let mut dec_config = libwebp_sys::WebPDecoderConfig::new()
        .map_err(|_| at!(Error::DecodeFailed(DecodingError::InvalidParam)))?;

    let status =
        unsafe { libwebp_sys::WebPGetFeatures(data.as_ptr(), data.len(), &mut dec_config.input) };
    if status != libwebp_sys::VP8StatusCode::VP8_STATUS_OK {
        return Err(at!(Error::DecodeFailed(DecodingError::from(status as i32))));
    }

    dec_config.output.colorspace = libwebp_sys::WEBP_CSP_MODE::MODE_RGBA;
    dec_config.options.use_scaling = 1;
    dec_config.options.scaled_width = width as i32;
    dec_config.options.scaled_height = height as i32;
    dec_config.options.use_threads = use_threads as i32;

    let status = unsafe { libwebp_sys::WebPDecode(data.as_ptr(), data.len(), &mut dec_config) };
    if status != libwebp_sys::VP8StatusCode::VP8_STATUS_OK {
        return Err(at!(Error::DecodeFailed(DecodingError::from(status as i32))));
    }

    let result = unsafe {
        let rgba = dec_config.output.u.RGBA.rgba;
        if rgba.is_null() {
            Err(at!(Error::DecodeFailed(DecodingError::OutOfMemory)))
        } else {
            let pixels = core::slice::from_raw_parts(rgba, frame_bytes);
            match out.try_reserve(frame_bytes) {
                Ok(()) => {
                    out.extend_from_slice(pixels);
                    Ok(())
                }
                Err(_) => Err(at!(Error::DecodeFailed(DecodingError::OutOfMemory))),
            }
        }
    };
    unsafe { libwebp_sys::WebPFreeDecBuffer(&mut dec_config.output) };
    result
}

/// Iterator over the frames of a [`DecodeSession`].
#[derive(Debug, Clone)]
pub struct Frames<'a> {
    session: &'a DecodeSession,
    next: usize,
}

impl<'a> Iterator for Frames<'a> {
    type Item = ImageHandle<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let frame = self.session.frame(self.next).ok()?;
        self.next += 1;
        Some(frame)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.session.frame_count().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Frames<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_session() {
        let session = DecodeSession::new();
        assert_eq!(session.state(), DecodeState::Empty);
        assert_eq!(session.frame_count(), 0);
        assert_eq!(session.loop_count(), None);
        assert_eq!(session.canvas_size(), None);
        assert!(matches!(
            session.frame(0).unwrap_err().error(),
            Error::InvalidState(_)
        ));
        assert_eq!(session.frames().count(), 0);
    }

    #[test]
    fn test_zero_bytes_fails() {
        let mut session = DecodeSession::new();
        let err = session.decode(&[]).unwrap_err();
        assert_eq!(
            *err.error(),
            Error::DecodeFailed(DecodingError::NotEnoughData)
        );
        assert_eq!(session.state(), DecodeState::Failed);
        assert_eq!(session.frame_count(), 0);
        assert!(matches!(
            session.frame(0).unwrap_err().error(),
            Error::OutOfRange { index: 0, len: 0 }
        ));
    }

    #[test]
    fn test_animation_without_frames_loads_empty() {
        // RIFF header, VP8X (animation flag, 1x1 canvas), ANIM (loop 0), no ANMF.
        let data: [u8; 44] = [
            b'R', b'I', b'F', b'F', 36, 0, 0, 0, b'W', b'E', b'B', b'P', //
            b'V', b'P', b'8', b'X', 10, 0, 0, 0, 0x02, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
            b'A', b'N', b'I', b'M', 6, 0, 0, 0, 0xff, 0xff, 0xff, 0xff, 0, 0,
        ];
        let mut session = DecodeSession::new();
        session.decode(&data).unwrap();
        assert_eq!(session.state(), DecodeState::Loaded);
        assert_eq!(session.frame_count(), 0);
        assert_eq!(session.canvas_size(), Some((1, 1)));
        assert_eq!(session.loop_count(), None);
        assert_eq!(session.frames().count(), 0);
        assert!(matches!(
            session.frame(0).unwrap_err().error(),
            Error::OutOfRange { index: 0, len: 0 }
        ));
    }

    #[test]
    fn test_decoded_len_overflow() {
        assert_eq!(decoded_len(2, 3, 4).unwrap(), 2 * 3 * 4 * 4);
        let err = decoded_len(u32::MAX, u32::MAX, u32::MAX).unwrap_err();
        assert!(matches!(err.error(), Error::LimitExceeded(_)));
    }

    #[test]
    fn test_decode_twice_fails() {
        let mut session = DecodeSession::new();
        assert!(session.decode(b"not an image").is_err());
        assert_eq!(
            *session.decode(b"still not").unwrap_err().error(),
            Error::AlreadyDecoded
        );
        assert_eq!(session.state(), DecodeState::Failed);
    }
}
