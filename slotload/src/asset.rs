//! Decoded assets and decode parameters.

use bytes::Bytes;
use std::time::Duration;

/// Whether an asset is a still image or an animated clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Image,
    Animation,
}

/// A single decoded frame.
///
/// Pixel data is reference counted so assets can be shared between the
/// memory tier and any number of display targets without copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub pixels: Bytes,
    /// Display duration; zero for still images.
    pub delay: Duration,
}

/// A decoded image or animated clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    kind: AssetKind,
    width: u32,
    height: u32,
    frames: Vec<Frame>,
}

impl Asset {
    /// Creates a still image from a single frame of pixel data.
    pub fn image(width: u32, height: u32, pixels: impl Into<Bytes>) -> Self {
        Self {
            kind: AssetKind::Image,
            width,
            height,
            frames: vec![Frame {
                pixels: pixels.into(),
                delay: Duration::ZERO,
            }],
        }
    }

    /// Creates an animated clip from its frames.
    pub fn animation(width: u32, height: u32, frames: Vec<Frame>) -> Self {
        Self {
            kind: AssetKind::Animation,
            width,
            height,
            frames,
        }
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn is_animated(&self) -> bool {
        self.kind == AssetKind::Animation
    }

    /// Total pixel bytes held by this asset, used as its memory-tier weight.
    pub fn byte_size(&self) -> usize {
        self.frames.iter().map(|f| f.pixels.len()).sum()
    }
}

/// Target-dimension spec used for decoding and cache-key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecodeSpec {
    /// Target width in pixels; 0 means "natural size".
    pub width: u32,
    /// Target height in pixels; 0 means "natural size".
    pub height: u32,
    /// Decode every frame of animated sources instead of only the first.
    pub animate: bool,
}

impl DecodeSpec {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            animate: true,
        }
    }

    /// Decode at the source's natural size.
    pub fn natural() -> Self {
        Self::new(0, 0)
    }

    pub fn with_animation(mut self, animate: bool) -> Self {
        self.animate = animate;
        self
    }
}

impl Default for DecodeSpec {
    fn default() -> Self {
        Self::natural()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_has_single_still_frame() {
        let asset = Asset::image(4, 2, vec![0u8; 32]);
        assert_eq!(asset.kind(), AssetKind::Image);
        assert_eq!(asset.frames().len(), 1);
        assert_eq!(asset.frames()[0].delay, Duration::ZERO);
        assert!(!asset.is_animated());
        assert_eq!(asset.byte_size(), 32);
    }

    #[test]
    fn test_animation_weight_sums_frames() {
        let frames = vec![
            Frame {
                pixels: Bytes::from(vec![1u8; 10]),
                delay: Duration::from_millis(40),
            },
            Frame {
                pixels: Bytes::from(vec![2u8; 10]),
                delay: Duration::from_millis(40),
            },
        ];
        let asset = Asset::animation(2, 2, frames);
        assert!(asset.is_animated());
        assert_eq!(asset.byte_size(), 20);
    }

    #[test]
    fn test_decode_spec_defaults_to_natural_animated() {
        let spec = DecodeSpec::default();
        assert_eq!((spec.width, spec.height), (0, 0));
        assert!(spec.animate);
        assert!(!DecodeSpec::new(10, 10).with_animation(false).animate);
    }
}
