//! Software rendering on top of a [`ProducerSession`]: lock, draw, unlock-and-post.
//!
//! Each lock tracks which pixels the caller promises to redraw. Everything else that changed since
//! the back buffer was last drawn is copied from the previously posted buffer, so a caller that
//! only touches a small area never has to repaint the full frame.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::foundation::core::{Api, PixelFormat, Rect, SlotId, Usage};
use crate::foundation::error::{ProducerError, ProducerResult};
use crate::foundation::region::Region;
use crate::queue::buffer::{GraphicBuffer, PixelMapping};
use crate::queue::service::{BufferQueue, ComposerAuth};
use crate::render::copy_back::{Plane, copy_blt};
use crate::session::producer::{ProducerSession, SurfaceOpts};

type SharedMapping = Arc<Mutex<Option<Box<dyn PixelMapping>>>>;

/// A back buffer mapped for CPU drawing, returned by [`Surface::lock`].
///
/// The pixel view stays valid until [`Surface::unlock_and_post`]; after that every accessor
/// fails with a state error.
pub struct LockedSurface {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row pitch in pixels.
    pub stride: u32,
    /// Pixel format.
    pub format: PixelFormat,
    /// Bounds of the region the caller must redraw this frame.
    pub dirty_bounds: Rect,
    /// Pixels copied from the previously posted buffer for this frame.
    pub copied_back: Region,
    pixels: SharedMapping,
}

impl fmt::Debug for LockedSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockedSurface")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("format", &self.format)
            .field("dirty_bounds", &self.dirty_bounds)
            .field("copied_back", &self.copied_back)
            .field("mapped", &self.is_mapped())
            .finish()
    }
}

impl LockedSurface {
    /// Return `true` until the surface is unlocked.
    pub fn is_mapped(&self) -> bool {
        self.pixels.lock().is_some()
    }

    /// Bytes per pixel of [`LockedSurface::format`].
    pub fn bytes_per_pixel(&self) -> ProducerResult<usize> {
        self.format.bytes_per_pixel().ok_or_else(|| {
            ProducerError::mapping(format!("format {} is not CPU addressable", self.format.0))
        })
    }

    /// Run `f` over the mapped bytes (row-major, `stride` pixels per row).
    pub fn with_bits<R>(&self, f: impl FnOnce(&[u8]) -> R) -> ProducerResult<R> {
        let guard = self.pixels.lock();
        let mapping = guard
            .as_ref()
            .ok_or_else(|| ProducerError::state("surface was unlocked"))?;
        Ok(f(mapping.bytes()))
    }

    /// Run `f` over the mapped bytes, mutably.
    pub fn with_bits_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> ProducerResult<R> {
        let mut guard = self.pixels.lock();
        let mapping = guard
            .as_mut()
            .ok_or_else(|| ProducerError::state("surface was unlocked"))?;
        Ok(f(mapping.bytes_mut()))
    }

    /// Bytes of pixel `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> ProducerResult<Vec<u8>> {
        let bpp = self.bytes_per_pixel()?;
        if x >= self.width || y >= self.height {
            return Err(ProducerError::validation(format!(
                "pixel ({x}, {y}) outside {}x{}",
                self.width, self.height
            )));
        }
        let off = ((y as usize) * (self.stride as usize) + x as usize) * bpp;
        self.with_bits(|bytes| bytes.get(off..off + bpp).map(<[u8]>::to_vec))?
            .ok_or_else(|| ProducerError::mapping("mapping shorter than its geometry"))
    }

    /// Fill `rect` (clipped to the buffer) with `pixel`, whose length must equal the format's
    /// bytes per pixel.
    pub fn fill_rect(&self, rect: Rect, pixel: &[u8]) -> ProducerResult<()> {
        let bpp = self.bytes_per_pixel()?;
        if pixel.len() != bpp {
            return Err(ProducerError::validation(format!(
                "fill pixel has {} bytes, format needs {bpp}",
                pixel.len()
            )));
        }
        let rect = rect.intersect(Rect::from_size(self.width, self.height));
        if rect.is_empty() {
            return Ok(());
        }
        let row_bytes = self.stride as usize * bpp;
        self.with_bits_mut(|bytes| -> ProducerResult<()> {
            for y in rect.top..rect.bottom {
                let start = y as usize * row_bytes + rect.left as usize * bpp;
                let end = start + rect.width() as usize * bpp;
                let row = bytes.get_mut(start..end).ok_or_else(|| {
                    ProducerError::mapping("mapping shorter than its geometry")
                })?;
                for px in row.chunks_exact_mut(bpp) {
                    px.copy_from_slice(pixel);
                }
            }
            Ok(())
        })?
    }
}

struct Locked {
    slot: SlotId,
    buffer: Arc<dyn GraphicBuffer>,
    pixels: SharedMapping,
}

#[derive(Default)]
struct CpuState {
    locked: Option<Locked>,
    posted: Option<Arc<dyn GraphicBuffer>>,
    accumulated: Region,
}

/// A producer window with a software rendering path.
///
/// `lock` and `unlock_and_post` must alternate and come from one logical owner; the other
/// operations may be called from any thread.
pub struct Surface {
    session: ProducerSession,
    cpu: Mutex<CpuState>,
}

impl Surface {
    /// Create a disconnected surface over `queue` with default options.
    pub fn new(queue: Arc<dyn BufferQueue>, composer: Arc<dyn ComposerAuth>) -> Self {
        Self::with_opts(queue, composer, SurfaceOpts::default())
    }

    /// Create a disconnected surface over `queue`.
    pub fn with_opts(
        queue: Arc<dyn BufferQueue>,
        composer: Arc<dyn ComposerAuth>,
        opts: SurfaceOpts,
    ) -> Self {
        Self {
            session: ProducerSession::with_opts(queue, composer, opts),
            cpu: Mutex::new(CpuState::default()),
        }
    }

    /// The underlying producer session.
    pub fn session(&self) -> &ProducerSession {
        &self.session
    }

    /// Disconnect `api`. Disconnecting the software API also forgets the posted buffer.
    pub fn disconnect(&self, api: Api) -> ProducerResult<()> {
        let mut cpu = self.cpu.lock();
        self.session.disconnect(api)?;
        if api == Api::Cpu {
            cpu.posted = None;
            cpu.accumulated.clear();
        }
        Ok(())
    }

    /// Return `true` while a buffer is locked.
    pub fn is_locked(&self) -> bool {
        self.cpu.lock().locked.is_some()
    }

    /// Union of the dirty regions tracked across all slots.
    pub fn accumulated_dirty(&self) -> Region {
        self.cpu.lock().accumulated.clone()
    }

    /// Identity of the last posted buffer.
    pub fn posted_buffer(&self) -> Option<Arc<dyn GraphicBuffer>> {
        self.cpu.lock().posted.clone()
    }

    /// Dequeue a buffer and map it for drawing.
    ///
    /// `dirty` is the area the caller will redraw, clipped to the buffer; `None` means all of it.
    /// The returned [`LockedSurface::dirty_bounds`] is the area actually left for the caller, which
    /// is the full buffer when no earlier content could be reused.
    #[tracing::instrument(skip(self))]
    pub fn lock(&self, dirty: Option<Rect>) -> ProducerResult<LockedSurface> {
        let mut cpu = self.cpu.lock();
        if cpu.locked.is_some() {
            return Err(ProducerError::state("surface is already locked"));
        }
        if !self.session.is_connected_as(Api::Cpu) {
            self.session.connect(Api::Cpu)?;
            self.session.set_usage(Usage::SOFTWARE);
        }

        let (slot, back) = self.session.dequeue_slot()?;
        let bounds = back.bounds();
        let mut new_dirty = Region::from_rect(match dirty {
            Some(r) => r.intersect(bounds),
            None => bounds,
        });

        let front = cpu
            .posted
            .as_ref()
            .filter(|front| {
                front.width() == back.width()
                    && front.height() == back.height()
                    && front.format() == back.format()
                    && front.format().bytes_per_pixel().is_some()
            })
            .cloned();

        let mut copied_back = Region::new();
        let reuse_ok = match front {
            Some(front) if front.handle() == back.handle() => true,
            Some(front) => {
                let stale = self.session.with_slots(|slots| {
                    let changed = match slots.dirty(slot) {
                        Some(_) => slots.dirty_union_except(slot),
                        None => Region::from_rect(bounds),
                    };
                    changed.subtracted(&new_dirty)
                });
                match copy_blt(back.as_ref(), front.as_ref(), &stale) {
                    Ok(()) => {
                        copied_back = stale;
                        true
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, slot, "copy-back failed, redrawing everything");
                        false
                    }
                }
            }
            None => false,
        };
        if !reuse_ok {
            new_dirty = Region::from_rect(bounds);
        }

        let dirty_bounds = new_dirty.bounds();
        let mapping = match back.lock(Usage::SOFTWARE, dirty_bounds) {
            Ok(mapping) => mapping,
            Err(code) => {
                tracing::error!(slot, %code, "failed to map back buffer");
                self.cancel_quietly(back.as_ref());
                return Err(code.into());
            }
        };
        if let Some(bpp) = back.format().bytes_per_pixel() {
            let need = Plane::of(back.as_ref(), bpp).min_len();
            if mapping.bytes().len() < need {
                let got = mapping.bytes().len();
                drop(mapping);
                if let Err(code) = back.unlock() {
                    tracing::warn!(%code, "failed to unmap short buffer");
                }
                self.cancel_quietly(back.as_ref());
                return Err(ProducerError::mapping(format!(
                    "mapping has {got} bytes, geometry needs {need}"
                )));
            }
        }

        cpu.accumulated = self.session.with_slots(|slots| {
            if !reuse_ok {
                slots.clear_dirty();
            }
            slots.set_dirty(slot, new_dirty)?;
            Ok::<_, ProducerError>(slots.dirty_union())
        })?;

        let pixels: SharedMapping = Arc::new(Mutex::new(Some(mapping)));
        cpu.locked = Some(Locked {
            slot,
            buffer: Arc::clone(&back),
            pixels: Arc::clone(&pixels),
        });
        tracing::debug!(slot, ?dirty_bounds, copied = copied_back.area(), "locked");
        Ok(LockedSurface {
            width: back.width(),
            height: back.height(),
            stride: back.stride(),
            format: back.format(),
            dirty_bounds,
            copied_back,
            pixels,
        })
    }

    /// Unmap the locked buffer and queue it with the current frame parameters.
    ///
    /// The surface is unlocked and the buffer becomes the copy-back source even when queueing
    /// fails.
    #[tracing::instrument(skip(self))]
    pub fn unlock_and_post(&self) -> ProducerResult<()> {
        let mut cpu = self.cpu.lock();
        let locked = cpu
            .locked
            .take()
            .ok_or_else(|| ProducerError::state("surface is not locked"))?;
        drop(locked.pixels.lock().take());
        if let Err(code) = locked.buffer.unlock() {
            tracing::error!(slot = locked.slot, %code, "failed to unmap buffer");
        }
        let queued = self.session.queue(locked.buffer.as_ref());
        cpu.posted = Some(locked.buffer);
        queued
    }

    fn cancel_quietly(&self, buffer: &dyn GraphicBuffer) {
        if let Err(e) = self.session.cancel(buffer) {
            tracing::warn!(error = %e, "failed to return buffer after lock failure");
        }
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        if self.session.is_connected_as(Api::Cpu)
            && let Err(e) = self.session.disconnect(Api::Cpu)
        {
            tracing::warn!(error = %e, "disconnect on drop failed");
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/cpu.rs"]
mod tests;
