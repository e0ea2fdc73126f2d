//! Encoder tunables and decoder configuration.

use crate::error::{Error, Result};
use alloc::format;
use alloc::string::String;
use whereat::*;

/// Quality value that selects the lossless bitstream.
pub const LOSSLESS_QUALITY: u8 = 100;

/// Largest loop count the container can store.
const MAX_LOOP_COUNT: u32 = u16::MAX as u32;

/// One encoder tunable, as set through [`EncodeSession::set_option`](crate::EncodeSession::set_option).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum EncodeOption {
    /// Progressive (interlaced) pixel order.
    ///
    /// Accepted for host compatibility; has no effect on the WebP bitstream.
    Interlaced(bool),
    /// Number of analysis passes over the image (0-20).
    LearnRepeat(u32),
    /// Let the codec discover per-channel color ranges.
    ///
    /// Accepted for host compatibility; has no effect on the WebP bitstream.
    AutoColorBuckets(bool),
    /// Maximum palette size. Negative values request an ordered palette, 0 disables it.
    ///
    /// Accepted for host compatibility; has no effect on the WebP bitstream.
    /// libwebp picks its own palette in lossless mode.
    PaletteSize(i32),
    /// How many previous frames a frame may reference (-1 = codec default, 0 = none).
    Lookback(i32),
    /// Context-model node count divisor (1-65535).
    ///
    /// Accepted for host compatibility; has no effect on the WebP bitstream.
    Divisor(i32),
    /// Context-model pruning threshold (>= 0).
    ///
    /// Accepted for host compatibility; has no effect on the WebP bitstream.
    MinSize(i32),
    /// Context-model growth criterion in bits saved (>= 1).
    ///
    /// Accepted for host compatibility; has no effect on the WebP bitstream.
    SplitThreshold(i32),
    /// Output quality. 100 is lossless, anything lower selects lossy compression.
    Quality(u8),
    /// Animation repeat count (0 = infinite).
    LoopCount(u32),
}

impl EncodeOption {
    /// Parse an option from its name and a textual value.
    ///
    /// Names are the snake_case forms of the variants (`"palette_size"`,
    /// `"learn_repeat"`, ...). Booleans accept `true`/`false`/`1`/`0`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use webp_session::EncodeOption;
    ///
    /// let opt = EncodeOption::parse("palette_size", "256")?;
    /// assert_eq!(opt, EncodeOption::PaletteSize(256));
    /// # Ok::<(), webp_session::At<webp_session::Error>>(())
    /// ```
    pub fn parse(name: &str, value: &str) -> Result<Self> {
        let value = value.trim();
        let opt = match name {
            "interlaced" => EncodeOption::Interlaced(parse_bool(name, value)?),
            "learn_repeat" => EncodeOption::LearnRepeat(parse_num(name, value)?),
            "auto_color_buckets" => EncodeOption::AutoColorBuckets(parse_bool(name, value)?),
            "palette_size" => EncodeOption::PaletteSize(parse_num(name, value)?),
            "lookback" => EncodeOption::Lookback(parse_num(name, value)?),
            "divisor" => EncodeOption::Divisor(parse_num(name, value)?),
            "min_size" => EncodeOption::MinSize(parse_num(name, value)?),
            "split_threshold" => EncodeOption::SplitThreshold(parse_num(name, value)?),
            "quality" => EncodeOption::Quality(parse_num(name, value)?),
            "loop_count" => EncodeOption::LoopCount(parse_num(name, value)?),
            _ => {
                return Err(at!(Error::InvalidOption(format!(
                    "unknown option '{}'",
                    name
                ))))
            }
        };
        Ok(opt)
    }

    /// The snake_case name accepted by [`EncodeOption::parse`].
    pub fn name(&self) -> &'static str {
        match self {
            EncodeOption::Interlaced(_) => "interlaced",
            EncodeOption::LearnRepeat(_) => "learn_repeat",
            EncodeOption::AutoColorBuckets(_) => "auto_color_buckets",
            EncodeOption::PaletteSize(_) => "palette_size",
            EncodeOption::Lookback(_) => "lookback",
            EncodeOption::Divisor(_) => "divisor",
            EncodeOption::MinSize(_) => "min_size",
            EncodeOption::SplitThreshold(_) => "split_threshold",
            EncodeOption::Quality(_) => "quality",
            EncodeOption::LoopCount(_) => "loop_count",
        }
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(at!(Error::InvalidOption(format!(
            "{}: expected a boolean, got '{}'",
            name, value
        )))),
    }
}

fn parse_num<T: core::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        at!(Error::InvalidOption(format!(
            "{}: expected a number, got '{}'",
            name, value
        )))
    })
}

/// Encoder tunables held by an [`EncodeSession`](crate::EncodeSession).
///
/// Every tunable is range-checked against the codec's documented domain.
/// `learn_repeat` drives the libwebp effort level and `lookback` the
/// keyframe spacing of animations; the context-model knobs have no WebP
/// bitstream counterpart and are only validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeParams {
    pub(crate) interlaced: bool,
    pub(crate) learn_repeat: u32,
    pub(crate) auto_color_buckets: bool,
    pub(crate) palette_size: i32,
    pub(crate) lookback: i32,
    pub(crate) divisor: i32,
    pub(crate) min_size: i32,
    pub(crate) split_threshold: i32,
    pub(crate) quality: u8,
    pub(crate) loop_count: u32,
}

impl Default for EncodeParams {
    fn default() -> Self {
        Self {
            interlaced: true,
            learn_repeat: 2,
            auto_color_buckets: true,
            palette_size: 512,
            lookback: 1,
            divisor: 30,
            min_size: 50,
            split_threshold: 64,
            quality: LOSSLESS_QUALITY,
            loop_count: 0,
        }
    }
}

impl EncodeParams {
    /// Default parameters: lossless, infinite looping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a copy with `option` applied, without validating it.
    #[must_use]
    pub fn with(mut self, option: EncodeOption) -> Self {
        match option {
            EncodeOption::Interlaced(v) => self.interlaced = v,
            EncodeOption::LearnRepeat(v) => self.learn_repeat = v,
            EncodeOption::AutoColorBuckets(v) => self.auto_color_buckets = v,
            EncodeOption::PaletteSize(v) => self.palette_size = v,
            EncodeOption::Lookback(v) => self.lookback = v,
            EncodeOption::Divisor(v) => self.divisor = v,
            EncodeOption::MinSize(v) => self.min_size = v,
            EncodeOption::SplitThreshold(v) => self.split_threshold = v,
            EncodeOption::Quality(v) => self.quality = v,
            EncodeOption::LoopCount(v) => self.loop_count = v,
        }
        self
    }

    /// Check every tunable against its domain and against libwebp's own
    /// config validation.
    pub fn validate(&self) -> Result<()> {
        let _ = self.to_libwebp()?;
        Ok(())
    }

    /// Convert to a validated libwebp `WebPConfig`.
    pub(crate) fn to_libwebp(&self) -> Result<libwebp_sys::WebPConfig> {
        check_range("learn_repeat", self.learn_repeat as i64, 0, 20)?;
        check_range("palette_size", self.palette_size as i64, -32000, 32000)?;
        check_range("lookback", self.lookback as i64, -1, 256)?;
        check_range("divisor", self.divisor as i64, 1, 0xFFFF)?;
        check_range("min_size", self.min_size as i64, 0, i32::MAX as i64)?;
        check_range(
            "split_threshold",
            self.split_threshold as i64,
            1,
            i32::MAX as i64,
        )?;
        check_range("loop_count", self.loop_count as i64, 0, MAX_LOOP_COUNT as i64)?;

        let mut config = libwebp_sys::WebPConfig::new_with_preset(
            libwebp_sys::WebPPreset::WEBP_PRESET_DEFAULT,
            self.quality as f32,
        )
        .map_err(|_| at!(Error::InvalidOption("failed to initialize config".into())))?;

        config.method = (self.learn_repeat as i32 + 2).min(6);
        config.quality = self.quality as f32;
        if self.is_lossless() {
            config.lossless = 1;
            config.exact = 1;
            config.alpha_compression = 0;
        }

        if unsafe { libwebp_sys::WebPValidateConfig(&config) } == 0 {
            return Err(at!(Error::InvalidOption(format!(
                "quality {} rejected by codec",
                self.quality
            ))));
        }

        Ok(config)
    }

    /// Keyframe spacing `(kmin, kmax)` for the animation encoder, or `None`
    /// to keep libwebp's defaults.
    pub(crate) fn keyframe_spacing(&self) -> Option<(i32, i32)> {
        match self.lookback {
            l if l < 0 => None,
            // Every frame is a keyframe.
            0 => Some((0, 1)),
            l => Some((l, l + 1)),
        }
    }

    // === Accessors (read-only) ===

    /// Whether interlacing was requested. Stored only.
    #[must_use]
    pub fn interlaced(&self) -> bool {
        self.interlaced
    }

    /// Number of analysis passes.
    #[must_use]
    pub fn learn_repeat(&self) -> u32 {
        self.learn_repeat
    }

    /// Whether automatic color buckets are enabled.
    #[must_use]
    pub fn auto_color_buckets(&self) -> bool {
        self.auto_color_buckets
    }

    /// Maximum palette size.
    #[must_use]
    pub fn palette_size(&self) -> i32 {
        self.palette_size
    }

    /// Frame lookback.
    #[must_use]
    pub fn lookback(&self) -> i32 {
        self.lookback
    }

    /// Context-model divisor. Stored only.
    #[must_use]
    pub fn divisor(&self) -> i32 {
        self.divisor
    }

    /// Context-model pruning threshold.
    #[must_use]
    pub fn min_size(&self) -> i32 {
        self.min_size
    }

    /// Context-model split threshold.
    #[must_use]
    pub fn split_threshold(&self) -> i32 {
        self.split_threshold
    }

    /// Output quality (100 = lossless).
    #[must_use]
    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Check if the lossless bitstream is selected.
    #[must_use]
    pub fn is_lossless(&self) -> bool {
        self.quality >= LOSSLESS_QUALITY
    }

    /// Animation repeat count (0 = infinite).
    #[must_use]
    pub fn loop_count(&self) -> u32 {
        self.loop_count
    }
}

fn check_range(name: &str, value: i64, min: i64, max: i64) -> Result<()> {
    if value < min || value > max {
        return Err(at!(Error::InvalidOption(format!(
            "{} = {} outside {}..={}",
            name, value, min, max
        ))));
    }
    Ok(())
}

/// Resource limits applied while decoding.
///
/// All limits are optional; `None` means unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of frames.
    pub max_frames: Option<u32>,
    /// Maximum canvas pixels (width × height).
    pub max_pixels: Option<u64>,
    /// Maximum bytes of decoded RGBA8 across all frames.
    pub max_memory_bytes: Option<u64>,
}

impl Limits {
    /// Limits with no restrictions.
    pub fn none() -> Self {
        Self::default()
    }

    /// Check a canvas and frame count against the limits.
    pub(crate) fn check(&self, width: u32, height: u32, frames: u32) -> Result<()> {
        let pixels = (width as u64).saturating_mul(height as u64);
        let bytes = pixels.saturating_mul(4).saturating_mul(frames as u64);

        let exceeded = |what: &str, value: u64, max: u64| -> String {
            format!("{} {} exceeds limit {}", what, value, max)
        };

        if let Some(max) = self.max_frames {
            if frames > max {
                return Err(at!(Error::LimitExceeded(exceeded(
                    "frame count",
                    frames as u64,
                    max as u64
                ))));
            }
        }
        if let Some(max) = self.max_pixels {
            if pixels > max {
                return Err(at!(Error::LimitExceeded(exceeded(
                    "pixel count",
                    pixels,
                    max
                ))));
            }
        }
        if let Some(max) = self.max_memory_bytes {
            if bytes > max {
                return Err(at!(Error::LimitExceeded(exceeded(
                    "decoded size",
                    bytes,
                    max
                ))));
            }
        }
        Ok(())
    }
}

/// Decoder configuration.
#[derive(Debug, Clone, Default)]
pub struct DecoderConfig {
    pub(crate) use_threads: bool,
    pub(crate) limits: Limits,
    pub(crate) scale: Option<(u32, u32)>,
}

impl DecoderConfig {
    /// Create a new decoder configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable multi-threaded decoding inside libwebp.
    #[must_use]
    pub fn use_threads(mut self, enable: bool) -> Self {
        self.use_threads = enable;
        self
    }

    /// Set resource limits.
    #[must_use]
    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Scale still images to `width` x `height` while decoding.
    ///
    /// Only applies to still images. Decoding an animation with a scale set
    /// fails with [`Error::InvalidOption`]; a zero dimension fails with
    /// [`Error::InvalidInput`].
    #[must_use]
    pub fn scale(mut self, width: u32, height: u32) -> Self {
        self.scale = Some((width, height));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_validate() {
        let params = EncodeParams::default();
        assert!(params.is_lossless());
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_parse_options() {
        assert_eq!(
            EncodeOption::parse("interlaced", "0").unwrap(),
            EncodeOption::Interlaced(false)
        );
        assert_eq!(
            EncodeOption::parse("lookback", " -1 ").unwrap(),
            EncodeOption::Lookback(-1)
        );
        assert_eq!(
            EncodeOption::parse("quality", "80").unwrap(),
            EncodeOption::Quality(80)
        );
        assert!(EncodeOption::parse("quality", "high").is_err());
        assert!(EncodeOption::parse("interlaced", "maybe").is_err());
        assert!(EncodeOption::parse("chance_cutoff", "2").is_err());
    }

    #[test]
    fn test_option_names_roundtrip() {
        let opts = [
            EncodeOption::Interlaced(true),
            EncodeOption::LearnRepeat(3),
            EncodeOption::AutoColorBuckets(false),
            EncodeOption::PaletteSize(-12),
            EncodeOption::Lookback(2),
            EncodeOption::Divisor(40),
            EncodeOption::MinSize(10),
            EncodeOption::SplitThreshold(100),
            EncodeOption::Quality(90),
            EncodeOption::LoopCount(5),
        ];
        for opt in opts {
            let params = EncodeParams::default().with(opt);
            assert!(params.validate().is_ok(), "{} should validate", opt.name());
        }
    }

    #[test]
    fn test_out_of_domain_rejected() {
        let bad = [
            EncodeOption::LearnRepeat(21),
            EncodeOption::PaletteSize(40000),
            EncodeOption::Lookback(-2),
            EncodeOption::Divisor(0),
            EncodeOption::MinSize(-1),
            EncodeOption::SplitThreshold(0),
            EncodeOption::Quality(101),
            EncodeOption::LoopCount(70000),
        ];
        for opt in bad {
            let params = EncodeParams::default().with(opt);
            let err = params.validate().unwrap_err();
            assert!(
                matches!(err.error(), Error::InvalidOption(_)),
                "{} should be rejected",
                opt.name()
            );
        }
    }

    #[test]
    fn test_keyframe_spacing() {
        let p = EncodeParams::default();
        assert_eq!(
            p.clone().with(EncodeOption::Lookback(-1)).keyframe_spacing(),
            None
        );
        assert_eq!(
            p.with(EncodeOption::Lookback(0)).keyframe_spacing(),
            Some((0, 1))
        );
        assert_eq!(
            EncodeParams::default()
                .with(EncodeOption::Lookback(4))
                .keyframe_spacing(),
            Some((4, 5))
        );
    }

    #[test]
    fn test_limits() {
        let limits = Limits {
            max_frames: Some(2),
            max_pixels: Some(100),
            max_memory_bytes: None,
        };
        assert!(limits.check(10, 10, 2).is_ok());
        assert!(limits.check(10, 11, 1).is_err());
        assert!(limits.check(1, 1, 3).is_err());
        assert!(Limits::none().check(u32::MAX, u32::MAX, u32::MAX).is_ok());
    }
}
