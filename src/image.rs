//! Single-frame pixel handles with RGBA8 row marshalling.

use crate::error::{Error, Result};
use alloc::format;
use alloc::vec;
use alloc::vec::Vec;
use imgref::ImgRef;
use rgb::{AsPixels, ComponentBytes, RGBA8};
use whereat::*;

/// Bytes per RGBA8 pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// Largest width or height a frame may have.
pub const MAX_DIMENSION: u32 = 16383;

/// Who owns the pixels behind an [`ImageHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Borrowed from a [`DecodeSession`](crate::DecodeSession); read-only.
    View,
    /// Allocated by the handle and freed when it is dropped.
    Owned,
}

#[derive(Debug, Clone)]
enum Storage<'a> {
    View(&'a [u8]),
    Owned(Vec<u8>),
}

/// One still frame: dimensions, delay, and packed RGBA8 rows.
///
/// Handles returned by [`DecodeSession::frame`](crate::DecodeSession::frame)
/// are views tied to the session's lifetime. Handles built with
/// [`ImageHandle::new`] own their storage and are what an
/// [`EncodeSession`](crate::EncodeSession) consumes.
///
/// # Example
///
/// ```rust
/// use webp_session::ImageHandle;
///
/// let mut img = ImageHandle::new(2, 1)?;
/// img.write_row(0, &[255, 0, 0, 255, 0, 255, 0, 255])?;
///
/// let mut row = [0u8; 8];
/// img.read_row(0, &mut row)?;
/// assert_eq!(row, [255, 0, 0, 255, 0, 255, 0, 255]);
/// # Ok::<(), webp_session::At<webp_session::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct ImageHandle<'a> {
    width: u32,
    height: u32,
    channels: u8,
    delay_ms: u32,
    storage: Storage<'a>,
}

impl ImageHandle<'static> {
    /// Allocate a zeroed `width` × `height` RGBA8 frame.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let len = frame_len(width, height)?;
        Ok(Self {
            width,
            height,
            channels: 4,
            delay_ms: 0,
            storage: Storage::Owned(vec![0u8; len]),
        })
    }

    /// Copy a packed RGBA8 buffer into a new owned frame.
    ///
    /// Extra bytes past `width * height * 4` are ignored.
    pub fn from_rgba(data: &[u8], width: u32, height: u32) -> Result<Self> {
        let len = frame_len(width, height)?;
        if data.len() < len {
            return Err(at!(Error::BufferTooSmall {
                required: len,
                actual: data.len(),
            }));
        }
        Ok(Self {
            width,
            height,
            channels: 4,
            delay_ms: 0,
            storage: Storage::Owned(data[..len].to_vec()),
        })
    }

    /// Copy an [`ImgRef`] of RGBA8 pixels, honouring its stride.
    ///
    /// Dimensions that do not fit `u32` fail with [`Error::InvalidInput`].
    pub fn from_img(img: ImgRef<'_, RGBA8>) -> Result<Self> {
        let width = dimension("width", img.width())?;
        let height = dimension("height", img.height())?;
        let mut handle = Self::new(width, height)?;
        for (y, row) in img.rows().enumerate() {
            handle.write_row(y as u32, row.as_bytes())?;
        }
        Ok(handle)
    }
}

impl<'a> ImageHandle<'a> {
    /// Wrap decoder-owned pixels without copying.
    pub(crate) fn view(
        pixels: &'a [u8],
        width: u32,
        height: u32,
        channels: u8,
        delay_ms: u32,
    ) -> Self {
        debug_assert_eq!(
            pixels.len(),
            width as usize * height as usize * BYTES_PER_PIXEL
        );
        Self {
            width,
            height,
            channels,
            delay_ms,
            storage: Storage::View(pixels),
        }
    }

    /// Frame width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Channel count reported by the container. Rows are always RGBA8.
    pub fn channel_count(&self) -> u8 {
        self.channels
    }

    /// Display time of this frame in milliseconds.
    ///
    /// 0 for still images and for owned handles without an explicit delay.
    pub fn frame_delay(&self) -> u32 {
        self.delay_ms
    }

    /// Attach a display time to an owned frame before appending it.
    pub fn set_frame_delay(&mut self, delay_ms: u32) -> Result<()> {
        match self.storage {
            Storage::Owned(_) => {
                self.delay_ms = delay_ms;
                Ok(())
            }
            Storage::View(_) => Err(at!(Error::InvalidState(
                "decoded frames are read-only"
            ))),
        }
    }

    /// Whether the pixels are borrowed or owned.
    pub fn ownership(&self) -> Ownership {
        match self.storage {
            Storage::View(_) => Ownership::View,
            Storage::Owned(_) => Ownership::Owned,
        }
    }

    /// Bytes in one packed row.
    pub fn row_bytes(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// The whole frame as packed RGBA8 bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match &self.storage {
            Storage::View(pixels) => pixels,
            Storage::Owned(pixels) => pixels,
        }
    }

    /// The whole frame as an [`ImgRef`].
    pub fn as_img(&self) -> ImgRef<'_, RGBA8> {
        let pixels: &[RGBA8] = self.as_bytes().as_pixels();
        ImgRef::new(pixels, self.width as usize, self.height as usize)
    }

    /// Borrow one row as typed pixels.
    pub fn row_pixels(&self, row: u32) -> Result<&[RGBA8]> {
        let range = self.row_range(row)?;
        Ok(self.as_bytes()[range].as_pixels())
    }

    /// Copy row `row` into `out` as packed RGBA8.
    ///
    /// `out` must hold at least `width * 4` bytes; only that prefix is
    /// written. Nothing is written on error.
    pub fn read_row(&self, row: u32, out: &mut [u8]) -> Result<()> {
        let range = self.row_range(row)?;
        let needed = range.len();
        if out.len() < needed {
            return Err(at!(Error::BufferTooSmall {
                required: needed,
                actual: out.len(),
            }));
        }
        out[..needed].copy_from_slice(&self.as_bytes()[range]);
        Ok(())
    }

    /// Copy packed RGBA8 from `input` into row `row`.
    ///
    /// Fails with [`Error::InvalidState`] on a decoded (view) frame.
    pub fn write_row(&mut self, row: u32, input: &[u8]) -> Result<()> {
        let range = self.row_range(row)?;
        let needed = range.len();
        if input.len() < needed {
            return Err(at!(Error::BufferTooSmall {
                required: needed,
                actual: input.len(),
            }));
        }
        match &mut self.storage {
            Storage::Owned(pixels) => {
                pixels[range].copy_from_slice(&input[..needed]);
                Ok(())
            }
            Storage::View(_) => Err(at!(Error::InvalidState(
                "decoded frames are read-only"
            ))),
        }
    }

    /// Copy this frame into a new owned handle, keeping its delay.
    pub fn to_owned_handle(&self) -> ImageHandle<'static> {
        ImageHandle {
            width: self.width,
            height: self.height,
            channels: self.channels,
            delay_ms: self.delay_ms,
            storage: Storage::Owned(self.as_bytes().to_vec()),
        }
    }

    fn row_range(&self, row: u32) -> Result<core::ops::Range<usize>> {
        if row >= self.height {
            return Err(at!(Error::OutOfRange {
                index: row as usize,
                len: self.height as usize,
            }));
        }
        let stride = self.row_bytes();
        let start = row as usize * stride;
        Ok(start..start + stride)
    }
}

/// Byte length of a `width` × `height` RGBA8 frame, validating dimensions.
fn dimension(axis: &str, value: usize) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| at!(Error::InvalidInput(format!("{} {} does not fit u32", axis, value))))
}

pub(crate) fn frame_len(width: u32, height: u32) -> Result<usize> {
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(at!(Error::InvalidInput(format!(
            "invalid dimensions {}x{}",
            width, height
        ))));
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(BYTES_PER_PIXEL))
        .ok_or_else(|| at!(Error::InvalidInput("frame size overflows".into())))
}
