//! Error types for session operations.

use alloc::string::String;
use core::fmt;
use whereat::At;

/// Result type for session operations.
///
/// Errors are wrapped in [`At`] so they carry the location that raised them.
pub type Result<T> = core::result::Result<T, At<Error>>;

/// Error type for session operations.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Input was malformed, truncated, or not a supported container.
    DecodeFailed(DecodingError),
    /// Row or frame index outside the valid range.
    OutOfRange {
        /// Requested index.
        index: usize,
        /// Number of valid indices.
        len: usize,
    },
    /// Caller buffer cannot hold one row.
    BufferTooSmall {
        /// Bytes needed.
        required: usize,
        /// Bytes supplied.
        actual: usize,
    },
    /// Encode parameter rejected by the codec binding.
    InvalidOption(String),
    /// Operation called in the wrong lifecycle state.
    InvalidState(&'static str),
    /// The codec failed to compress the appended frames.
    EncodeFailed(String),
    /// `finalize` or `set_option` called on a finalized session.
    AlreadyFinalized,
    /// `decode` called on a session that already consumed its input.
    AlreadyDecoded,
    /// Invalid dimensions or pixel buffer.
    InvalidInput(String),
    /// Decoded content exceeds the configured [`Limits`](crate::Limits).
    LimitExceeded(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DecodeFailed(e) => write!(f, "decode failed: {}", e),
            Error::OutOfRange { index, len } => {
                write!(f, "index {} out of range (len {})", index, len)
            }
            Error::BufferTooSmall { required, actual } => write!(
                f,
                "buffer too small: need {} bytes, got {}",
                required, actual
            ),
            Error::InvalidOption(msg) => write!(f, "invalid option: {}", msg),
            Error::InvalidState(msg) => write!(f, "invalid state: {}", msg),
            Error::EncodeFailed(msg) => write!(f, "encode failed: {}", msg),
            Error::AlreadyFinalized => write!(f, "session already finalized"),
            Error::AlreadyDecoded => write!(f, "session already decoded"),
            Error::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            Error::LimitExceeded(msg) => write!(f, "limit exceeded: {}", msg),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Decoding status codes from libwebp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum DecodingError {
    /// No error
    Ok = 0,
    /// Memory allocation error
    OutOfMemory = 1,
    /// Invalid parameter
    InvalidParam = 2,
    /// Bitstream error
    BitstreamError = 3,
    /// Unsupported feature
    UnsupportedFeature = 4,
    /// Suspended (need more data)
    Suspended = 5,
    /// User abort
    UserAbort = 6,
    /// Not enough data
    NotEnoughData = 7,
}

impl From<i32> for DecodingError {
    fn from(code: i32) -> Self {
        match code {
            0 => DecodingError::Ok,
            1 => DecodingError::OutOfMemory,
            2 => DecodingError::InvalidParam,
            3 => DecodingError::BitstreamError,
            4 => DecodingError::UnsupportedFeature,
            5 => DecodingError::Suspended,
            6 => DecodingError::UserAbort,
            _ => DecodingError::NotEnoughData,
        }
    }
}

impl fmt::Display for DecodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            DecodingError::Ok => "ok",
            DecodingError::OutOfMemory => "out of memory",
            DecodingError::InvalidParam => "invalid param",
            DecodingError::BitstreamError => "bitstream error",
            DecodingError::UnsupportedFeature => "unsupported feature",
            DecodingError::Suspended => "suspended",
            DecodingError::UserAbort => "user abort",
            DecodingError::NotEnoughData => "not enough data",
        };
        write!(f, "{}", msg)
    }
}
