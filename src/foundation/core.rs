use std::sync::OnceLock;
use std::time::Instant;

use crate::foundation::error::{ProducerError, ProducerResult};

/// Integer pixel rectangle with exclusive `right`/`bottom` edges.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rect {
    /// Left edge (inclusive).
    pub left: i32,
    /// Top edge (inclusive).
    pub top: i32,
    /// Right edge (exclusive).
    pub right: i32,
    /// Bottom edge (exclusive).
    pub bottom: i32,
}

impl Rect {
    /// The empty rectangle at the origin.
    pub const EMPTY: Self = Self {
        left: 0,
        top: 0,
        right: 0,
        bottom: 0,
    };

    /// Build a rectangle from its four edges.
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Rectangle anchored at the origin covering `width x height` pixels.
    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(
            0,
            0,
            i32::try_from(width).unwrap_or(i32::MAX),
            i32::try_from(height).unwrap_or(i32::MAX),
        )
    }

    /// Width in pixels; zero for inverted rectangles.
    pub fn width(self) -> i32 {
        (self.right - self.left).max(0)
    }

    /// Height in pixels; zero for inverted rectangles.
    pub fn height(self) -> i32 {
        (self.bottom - self.top).max(0)
    }

    /// Return `true` when the rectangle covers no pixel.
    pub fn is_empty(self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    /// Pixel count.
    pub fn area(self) -> u64 {
        if self.is_empty() {
            return 0;
        }
        (self.width() as u64) * (self.height() as u64)
    }

    /// Intersection of two rectangles; [`Rect::EMPTY`] when they do not overlap.
    pub fn intersect(self, other: Rect) -> Rect {
        let r = Rect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        if r.is_empty() { Rect::EMPTY } else { r }
    }

    /// Return `true` when the two rectangles share at least one pixel.
    pub fn intersects(self, other: Rect) -> bool {
        !self.intersect(other).is_empty()
    }

    /// Return `true` when `other` lies entirely inside `self`.
    ///
    /// Empty rectangles are contained by everything.
    pub fn contains_rect(self, other: Rect) -> bool {
        other.is_empty()
            || (self.left <= other.left
                && self.top <= other.top
                && self.right >= other.right
                && self.bottom >= other.bottom)
    }

    /// Return `true` when pixel `(x, y)` lies inside the rectangle.
    pub fn contains_point(self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    /// Smallest rectangle covering both inputs. Empty inputs are ignored.
    pub fn union_bounds(self, other: Rect) -> Rect {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        Rect::new(
            self.left.min(other.left),
            self.top.min(other.top),
            self.right.max(other.right),
            self.bottom.max(other.bottom),
        )
    }

    /// `self - other` as at most four disjoint pieces (top band, bottom band, left, right).
    pub fn subtract(self, other: Rect) -> smallvec::SmallVec<[Rect; 4]> {
        let mut out = smallvec::SmallVec::new();
        if self.is_empty() {
            return out;
        }
        let cut = self.intersect(other);
        if cut.is_empty() {
            out.push(self);
            return out;
        }
        if self.top < cut.top {
            out.push(Rect::new(self.left, self.top, self.right, cut.top));
        }
        if cut.bottom < self.bottom {
            out.push(Rect::new(self.left, cut.bottom, self.right, self.bottom));
        }
        if self.left < cut.left {
            out.push(Rect::new(self.left, cut.top, cut.left, cut.bottom));
        }
        if cut.right < self.right {
            out.push(Rect::new(cut.right, cut.top, self.right, cut.bottom));
        }
        out
    }
}

/// Pixel format code as negotiated with the buffer queue. `0` means "not requested".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct PixelFormat(pub i32);

impl PixelFormat {
    /// No format requested; the service picks its default.
    pub const UNSPECIFIED: Self = Self(0);
    /// 32-bit RGBA, 8 bits per channel.
    pub const RGBA_8888: Self = Self(1);
    /// 32-bit RGB with an unused alpha byte.
    pub const RGBX_8888: Self = Self(2);
    /// 24-bit packed RGB.
    pub const RGB_888: Self = Self(3);
    /// 16-bit 5:6:5 RGB.
    pub const RGB_565: Self = Self(4);
    /// 32-bit BGRA, 8 bits per channel.
    pub const BGRA_8888: Self = Self(5);
    /// 16-bit 5:5:5:1 RGBA.
    pub const RGBA_5551: Self = Self(6);
    /// 16-bit 4:4:4:4 RGBA.
    pub const RGBA_4444: Self = Self(7);

    /// Bytes per pixel for CPU-addressable formats, `None` for anything else.
    pub fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            Self::RGBA_8888 | Self::RGBX_8888 | Self::BGRA_8888 => Some(4),
            Self::RGB_888 => Some(3),
            Self::RGB_565 | Self::RGBA_5551 | Self::RGBA_4444 => Some(2),
            _ => None,
        }
    }
}

bitflags::bitflags! {
    /// Buffer usage bits requested from the allocator. Unknown bits are carried through untouched.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    pub struct Usage: u32 {
        /// CPU reads the buffer often.
        const SW_READ_OFTEN = 0x0000_0003;
        /// CPU writes the buffer often.
        const SW_WRITE_OFTEN = 0x0000_0030;
        /// Buffer is sampled as a GPU texture.
        const HW_TEXTURE = 0x0000_0100;
        /// Buffer is a GPU render target.
        const HW_RENDER = 0x0000_0200;
        /// Buffer is handed to the hardware composer.
        const HW_COMPOSER = 0x0000_0800;
    }
}

impl Usage {
    /// Usage requested by the software rendering path.
    pub const SOFTWARE: Self = Self::SW_READ_OFTEN.union(Self::SW_WRITE_OFTEN);
}

bitflags::bitflags! {
    /// Rotation/flip applied to buffer content at composition time.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    pub struct Transform: u32 {
        /// Flip horizontally.
        const FLIP_H = 0x01;
        /// Flip vertically.
        const FLIP_V = 0x02;
        /// Rotate 90 degrees clockwise.
        const ROT_90 = 0x04;
        /// Rotate 180 degrees.
        const ROT_180 = Self::FLIP_H.bits() | Self::FLIP_V.bits();
        /// Rotate 270 degrees clockwise.
        const ROT_270 = Self::ROT_180.bits() | Self::ROT_90.bits();
    }
}

/// Policy for fitting buffer content to a presentation window of a different size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ScalingMode {
    /// Buffers of the wrong size are not displayed until a matching one arrives.
    #[default]
    Freeze,
    /// Content is scaled to the window.
    ScaleToWindow,
    /// Content is scaled uniformly and cropped to the window.
    ScaleCrop,
}

impl ScalingMode {
    /// Wire value of this mode.
    pub fn code(self) -> i32 {
        match self {
            Self::Freeze => 0,
            Self::ScaleToWindow => 1,
            Self::ScaleCrop => 2,
        }
    }
}

impl TryFrom<i32> for ScalingMode {
    type Error = ProducerError;

    fn try_from(value: i32) -> ProducerResult<Self> {
        match value {
            0 => Ok(Self::Freeze),
            1 => Ok(Self::ScaleToWindow),
            2 => Ok(Self::ScaleCrop),
            other => Err(ProducerError::validation(format!(
                "unknown scaling mode: {other}"
            ))),
        }
    }
}

/// Presentation timestamp attached to a queued buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Timestamp {
    /// Use the monotonic clock at submission time.
    #[default]
    Auto,
    /// Explicit timestamp in nanoseconds.
    At(i64),
}

impl Timestamp {
    /// Raw sentinel used on the wire for [`Timestamp::Auto`].
    pub const AUTO_RAW: i64 = i64::MIN;

    /// Decode a raw wire value.
    pub fn from_raw(raw: i64) -> Self {
        if raw == Self::AUTO_RAW {
            Self::Auto
        } else {
            Self::At(raw)
        }
    }

    /// Resolve to nanoseconds, reading the monotonic clock for [`Timestamp::Auto`].
    pub fn resolve(self) -> i64 {
        match self {
            Self::Auto => monotonic_now_ns(),
            Self::At(ns) => ns,
        }
    }
}

/// Nanoseconds on a process-wide monotonic clock.
pub fn monotonic_now_ns() -> i64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = EPOCH.get_or_init(Instant::now);
    i64::try_from(epoch.elapsed().as_nanos()).unwrap_or(i64::MAX)
}

/// Client API a producer connects as. Only one may be connected at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Api {
    /// OpenGL ES / EGL.
    Egl,
    /// Software rendering through lock/unlock.
    Cpu,
    /// Video decoder.
    Media,
    /// Camera pipeline.
    Camera,
}

impl Api {
    /// Wire value of this API.
    pub fn code(self) -> i32 {
        match self {
            Self::Egl => 1,
            Self::Cpu => 2,
            Self::Media => 3,
            Self::Camera => 4,
        }
    }
}

impl TryFrom<i32> for Api {
    type Error = ProducerError;

    fn try_from(value: i32) -> ProducerResult<Self> {
        match value {
            1 => Ok(Self::Egl),
            2 => Ok(Self::Cpu),
            3 => Ok(Self::Media),
            4 => Ok(Self::Camera),
            other => Err(ProducerError::validation(format!("unknown api: {other}"))),
        }
    }
}

/// Opaque identity of a shared buffer; equal handles name the same underlying allocation.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct BufferHandle(pub u64);

/// Index of a slot in the buffer queue's ring.
pub type SlotId = usize;

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
