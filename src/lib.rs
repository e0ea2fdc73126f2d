//! # webp-session
//!
//! Single-use decode and encode sessions for still and animated WebP, with
//! RGBA8 row marshalling for image-loading hosts.
//!
//! This crate wraps libwebp via FFI to provide:
//! - [`DecodeSession`]: decode once, then random access to every frame
//! - [`EncodeSession`]: append frames, tune the encoder, finalize once
//! - [`ImageHandle`]: one frame, either a view into a decode session or an
//!   owned buffer for encoding
//! - [`Capabilities`]: a descriptor hosts can register the format with
//!
//! ## Quick Start
//!
//! ```rust
//! use webp_session::{DecodeSession, EncodeSession, ImageHandle};
//!
//! // A 2x1 image: red, green
//! let mut img = ImageHandle::new(2, 1)?;
//! img.write_row(0, &[255, 0, 0, 255, 0, 255, 0, 255])?;
//!
//! let mut encoder = EncodeSession::new();
//! encoder.append_frame(&img)?;
//! let webp = encoder.finalize()?;
//!
//! let mut decoder = DecodeSession::new();
//! decoder.decode(&webp)?;
//! assert_eq!(decoder.frame_count(), 1);
//!
//! let frame = decoder.frame(0)?;
//! let mut row = [0u8; 8];
//! frame.read_row(0, &mut row)?;
//! assert_eq!(row, [255, 0, 0, 255, 0, 255, 0, 255]);
//! # Ok::<(), webp_session::At<webp_session::Error>>(())
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

mod animation;
mod config;
mod decode;
mod encode;
mod error;
mod image;
mod types;

// Re-exports
pub use config::{DecoderConfig, EncodeOption, EncodeParams, Limits, LOSSLESS_QUALITY};
pub use decode::{DecodeSession, DecodeState, Frames};
pub use encode::{EncodeSession, EncodeState, DEFAULT_FRAME_DELAY_MS};
pub use error::{DecodingError, Error, Result};
pub use image::{ImageHandle, Ownership, BYTES_PER_PIXEL, MAX_DIMENSION};
pub use types::{Capabilities, ContainerInfo, CAPABILITIES};
pub use whereat::At;

/// libwebp decoder version as `(major, minor, patch)`.
pub fn version() -> (u32, u32, u32) {
    let v = unsafe { libwebp_sys::WebPGetDecoderVersion() } as u32;
    ((v >> 16) & 0xff, (v >> 8) & 0xff, v & 0xff)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let (major, minor, patch) = version();
        assert!(
            major >= 1,
            "Expected libwebp 1.x, got {}.{}.{}",
            major,
            minor,
            patch
        );
    }
}
