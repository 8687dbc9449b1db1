use std::fmt;

use crate::foundation::core::{BufferHandle, PixelFormat, Rect, Usage};
use crate::foundation::error::StatusCode;

/// CPU view of a mapped buffer.
///
/// The view always spans the whole allocation, row-major with `stride` pixels per row, regardless
/// of the region passed to [`GraphicBuffer::lock`]; pixels outside that region are not guaranteed
/// to be coherent.
pub trait PixelMapping: Send {
    /// Read access to the mapped bytes.
    fn bytes(&self) -> &[u8];
    /// Write access to the mapped bytes.
    fn bytes_mut(&mut self) -> &mut [u8];
}

/// A shared pixel buffer owned jointly by the producer and the buffer-queue service.
///
/// Two buffer objects describe the same allocation iff their [`GraphicBuffer::handle`]s are equal;
/// slot lookup never relies on object identity.
pub trait GraphicBuffer: Send + Sync + fmt::Debug {
    /// Opaque allocation identity.
    fn handle(&self) -> BufferHandle;
    /// Width in pixels.
    fn width(&self) -> u32;
    /// Height in pixels.
    fn height(&self) -> u32;
    /// Row pitch in pixels.
    fn stride(&self) -> u32;
    /// Pixel format of the allocation.
    fn format(&self) -> PixelFormat;
    /// Map the buffer for CPU access with `usage`, promising to touch only `region`.
    fn lock(&self, usage: Usage, region: Rect) -> Result<Box<dyn PixelMapping>, StatusCode>;
    /// End CPU access started by [`GraphicBuffer::lock`].
    fn unlock(&self) -> Result<(), StatusCode>;

    /// Full-buffer bounds.
    fn bounds(&self) -> Rect {
        Rect::from_size(self.width(), self.height())
    }
}
