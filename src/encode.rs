//! Single-use encode sessions.

use crate::animation::AnimationEncoder;
use crate::config::{EncodeOption, EncodeParams};
use crate::error::{Error, Result};
use crate::image::ImageHandle;
use alloc::format;
use alloc::vec::Vec;
use whereat::*;

/// Duration given to animation frames appended without a delay.
///
/// The codec rejects non-positive timestamp deltas between frames.
pub const DEFAULT_FRAME_DELAY_MS: u32 = 100;

/// Lifecycle of an [`EncodeSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeState {
    /// Accepting options and frames.
    Building,
    /// `finalize` has run; the session is spent.
    Finalized,
}

/// Private copy of an appended frame.
#[derive(Debug, Clone)]
struct PendingFrame {
    pixels: Vec<u8>,
    delay_ms: u32,
}

/// Collects frames and encodes them into one container.
///
/// # Example
///
/// ```rust,no_run
/// use webp_session::{EncodeOption, EncodeSession, ImageHandle};
///
/// let mut session = EncodeSession::new();
/// session.set_option(EncodeOption::LearnRepeat(3))?;
///
/// for color in [[255, 0, 0, 255], [0, 0, 255, 255]] {
///     let mut frame = ImageHandle::new(1, 1)?;
///     frame.write_row(0, &color)?;
///     frame.set_frame_delay(80)?;
///     session.append_frame(&frame)?;
/// }
///
/// let webp = session.finalize()?;
/// # Ok::<(), webp_session::At<webp_session::Error>>(())
/// ```
#[derive(Debug)]
pub struct EncodeSession {
    params: EncodeParams,
    state: EncodeState,
    width: u32,
    height: u32,
    frames: Vec<PendingFrame>,
}

impl Default for EncodeSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EncodeSession {
    /// Create a session with default parameters.
    pub fn new() -> Self {
        Self {
            params: EncodeParams::default(),
            state: EncodeState::Building,
            width: 0,
            height: 0,
            frames: Vec::new(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EncodeState {
        self.state
    }

    /// Current parameters.
    pub fn params(&self) -> &EncodeParams {
        &self.params
    }

    /// Number of frames appended so far.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Set one tunable.
    ///
    /// The value is validated by the codec binding before it is stored;
    /// a rejected value fails with [`Error::InvalidOption`] and leaves the
    /// parameters unchanged.
    pub fn set_option(&mut self, option: EncodeOption) -> Result<()> {
        if self.state == EncodeState::Finalized {
            return Err(at!(Error::AlreadyFinalized));
        }

        let candidate = self.params.clone().with(option);
        if let Err(e) = candidate.validate() {
            tracing::warn!(option = option.name(), error = %e.error(), "option rejected");
            return Err(e);
        }
        self.params = candidate;
        Ok(())
    }

    /// Append a copy of `frame`.
    ///
    /// The caller may drop or modify `frame` afterwards. Every frame must
    /// match the dimensions of the first one.
    pub fn append_frame(&mut self, frame: &ImageHandle<'_>) -> Result<()> {
        if self.state == EncodeState::Finalized {
            return Err(at!(Error::InvalidState("append after finalize")));
        }

        if self.frames.is_empty() {
            self.width = frame.width();
            self.height = frame.height();
        } else if (frame.width(), frame.height()) != (self.width, self.height) {
            return Err(at!(Error::InvalidInput(format!(
                "frame is {}x{}, session canvas is {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            ))));
        }

        self.frames.push(PendingFrame {
            pixels: frame.as_bytes().to_vec(),
            delay_ms: frame.frame_delay(),
        });
        tracing::debug!(index = self.frames.len() - 1, "frame appended");
        Ok(())
    }

    /// Encode all appended frames in append order.
    ///
    /// A frame identical to the one before it is not stored again: libwebp
    /// extends the previous frame's delay instead, so decoding yields fewer
    /// frames than were appended. When everything collapses into one frame
    /// the output is a still image without timing.
    ///
    /// The session is finalized whether or not encoding succeeds; a second
    /// call fails with [`Error::AlreadyFinalized`].
    pub fn finalize(&mut self) -> Result<Vec<u8>> {
        if self.state == EncodeState::Finalized {
            return Err(at!(Error::AlreadyFinalized));
        }
        self.state = EncodeState::Finalized;

        let frames = core::mem::take(&mut self.frames);
        let result = self.encode_frames(&frames);
        match &result {
            Ok(bytes) => tracing::debug!(
                frames = frames.len(),
                bytes = bytes.len(),
                lossless = self.params.is_lossless(),
                "encoded container"
            ),
            Err(e) => tracing::warn!(frames = frames.len(), error = %e.error(), "encode failed"),
        }
        result
    }

    fn encode_frames(&self, frames: &[PendingFrame]) -> Result<Vec<u8>> {
        if frames.is_empty() {
            return Err(at!(Error::EncodeFailed("no frames appended".into())));
        }

        let mut encoder = AnimationEncoder::new(self.width, self.height, &self.params)
            .map_err(|e| at!(Error::EncodeFailed(format!("{}", e.error()))))?;

        let animated = frames.len() > 1;
        let mut timestamp: i32 = 0;
        for frame in frames {
            encoder.add_frame_rgba(&frame.pixels, timestamp)?;

            let duration = match frame.delay_ms {
                0 if animated => DEFAULT_FRAME_DELAY_MS,
                d => d,
            };
            timestamp = i32::try_from(duration)
                .ok()
                .and_then(|d| timestamp.checked_add(d))
                .ok_or_else(|| at!(Error::EncodeFailed("animation too long".into())))?;
        }

        // A still image still needs a positive end timestamp.
        let end = if timestamp == 0 { 1 } else { timestamp };
        encoder.finish(end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session() {
        let session = EncodeSession::new();
        assert_eq!(session.state(), EncodeState::Building);
        assert_eq!(session.frame_count(), 0);
        assert_eq!(session.params(), &EncodeParams::default());
    }

    #[test]
    fn test_rejected_option_keeps_params() {
        let mut session = EncodeSession::new();
        session.set_option(EncodeOption::Divisor(64)).unwrap();
        let err = session.set_option(EncodeOption::Divisor(0)).unwrap_err();
        assert!(matches!(err.error(), Error::InvalidOption(_)));
        assert_eq!(session.params().divisor(), 64);
    }

    #[test]
    fn test_finalize_without_frames() {
        let mut session = EncodeSession::new();
        assert!(matches!(
            session.finalize().unwrap_err().error(),
            Error::EncodeFailed(_)
        ));
        assert_eq!(session.state(), EncodeState::Finalized);
        assert_eq!(
            *session.finalize().unwrap_err().error(),
            Error::AlreadyFinalized
        );
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut session = EncodeSession::new();
        session
            .append_frame(&ImageHandle::new(2, 2).unwrap())
            .unwrap();
        let err = session
            .append_frame(&ImageHandle::new(3, 2).unwrap())
            .unwrap_err();
        assert!(matches!(err.error(), Error::InvalidInput(_)));
        assert_eq!(session.frame_count(), 1);
    }

    #[test]
    fn test_append_copies() {
        let mut session = EncodeSession::new();
        let mut frame = ImageHandle::new(1, 1).unwrap();
        frame.write_row(0, &[1, 2, 3, 4]).unwrap();
        session.append_frame(&frame).unwrap();
        frame.write_row(0, &[9, 9, 9, 9]).unwrap();
        assert_eq!(session.frames[0].pixels, [1, 2, 3, 4]);
    }
}
