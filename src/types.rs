//! Container probing and host capability description.

use crate::error::{DecodingError, Error, Result};
use whereat::*;

/// What the session layer offers to an image-loading host.
///
/// Hosts that negotiate formats by name and capability flags can build
/// their registration from this value instead of asking the sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Short format key (`"webp"`).
    pub format: &'static str,
    /// File extensions, without the dot.
    pub extensions: &'static [&'static str],
    /// MIME type.
    pub mime_type: &'static str,
    /// A [`DecodeSession`](crate::DecodeSession) can read this format.
    pub can_read: bool,
    /// An [`EncodeSession`](crate::EncodeSession) can write this format.
    pub can_write: bool,
    /// Multi-frame containers are supported in both directions.
    pub animation: bool,
    /// The `quality` option is honoured when writing.
    pub quality: bool,
}

/// Capabilities of this crate.
pub const CAPABILITIES: Capabilities = Capabilities {
    format: "webp",
    extensions: &["webp"],
    mime_type: "image/webp",
    can_read: true,
    can_write: true,
    animation: true,
    quality: true,
};

impl Capabilities {
    /// Whether `format` names the format described here (case-insensitive).
    pub fn handles(&self, format: &str) -> bool {
        format.eq_ignore_ascii_case(self.format)
            || self
                .extensions
                .iter()
                .any(|ext| format.eq_ignore_ascii_case(ext))
    }

    /// Cheap signature check: `RIFF....WEBP`.
    ///
    /// Does not validate the payload; use [`ContainerInfo::probe`] for that.
    pub fn sniff(data: &[u8]) -> bool {
        data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP"
    }
}

/// Header-level information about an encoded container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerInfo {
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
    /// Whether the container declares an alpha channel.
    pub has_alpha: bool,
    /// Whether the container carries animation metadata.
    pub has_animation: bool,
}

impl ContainerInfo {
    /// Parse the container header without decoding pixels.
    pub fn probe(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(at!(Error::DecodeFailed(DecodingError::NotEnoughData)));
        }

        let mut features = core::mem::MaybeUninit::<libwebp_sys::WebPBitstreamFeatures>::uninit();
        let status = unsafe {
            libwebp_sys::WebPGetFeatures(data.as_ptr(), data.len(), features.as_mut_ptr())
        };

        if status != libwebp_sys::VP8StatusCode::VP8_STATUS_OK {
            return Err(at!(Error::DecodeFailed(DecodingError::from(status as i32))));
        }
        let features = unsafe { features.assume_init() };

        Ok(ContainerInfo {
            width: features.width as u32,
            height: features.height as u32,
            has_alpha: features.has_alpha != 0,
            has_animation: features.has_animation != 0,
        })
    }

    /// Informational channel count: 4 with alpha, 3 without.
    pub fn channel_count(&self) -> u8 {
        if self.has_alpha {
            4
        } else {
            3
        }
    }
}

/// Payload of the first top-level RIFF chunk tagged `fourcc`.
///
/// Walks the chunks after the `RIFF....WEBP` header. A chunk whose declared
/// size runs past the end of `data` is returned truncated.
pub(crate) fn find_chunk<'a>(data: &'a [u8], fourcc: &[u8; 4]) -> Option<&'a [u8]> {
    let mut rest = data.get(12..)?;
    while rest.len() >= 8 {
        let (header, body) = rest.split_at(8);
        let size = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        if &header[..4] == fourcc {
            return Some(&body[..size.min(body.len())]);
        }
        // Odd-sized payloads carry one byte of padding.
        let padded = size.saturating_add(size & 1);
        rest = body.get(padded..)?;
    }
    None
}

/// Loop count stored in the `ANIM` chunk, if present.
pub(crate) fn anim_loop_count(data: &[u8]) -> Option<u32> {
    let anim = find_chunk(data, b"ANIM")?;
    let bytes = anim.get(4..6)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]) as u32)
}
