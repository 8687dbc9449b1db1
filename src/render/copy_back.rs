use crate::foundation::core::{Rect, Usage};
use crate::foundation::error::{ProducerError, ProducerResult};
use crate::foundation::region::Region;
use crate::queue::buffer::GraphicBuffer;

/// Byte layout of one mapped buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Plane {
    pub(crate) stride_px: usize,
    pub(crate) height: usize,
    pub(crate) bpp: usize,
}

impl Plane {
    pub(crate) fn of(buffer: &dyn GraphicBuffer, bpp: usize) -> Self {
        Self {
            stride_px: buffer.stride() as usize,
            height: buffer.height() as usize,
            bpp,
        }
    }

    pub(crate) fn row_bytes(self) -> usize {
        self.stride_px * self.bpp
    }

    pub(crate) fn min_len(self) -> usize {
        self.row_bytes() * self.height
    }

    fn span(self, rect: Rect) -> (usize, usize) {
        let start = (rect.top as usize) * self.row_bytes() + (rect.left as usize) * self.bpp;
        (start, rect.width() as usize * self.bpp)
    }
}

/// Copy the pixels of `rect` from `src` to `dst`, row by row.
///
/// `rect` must have non-negative edges. A single copy is made when both planes are tightly
/// packed to the rectangle's width.
pub(crate) fn blit_rect(
    dst: &mut [u8],
    dst_plane: Plane,
    src: &[u8],
    src_plane: Plane,
    rect: Rect,
) -> ProducerResult<()> {
    if rect.is_empty() {
        return Ok(());
    }
    if rect.left < 0 || rect.top < 0 {
        return Err(ProducerError::mapping(format!(
            "blit rectangle {rect:?} has negative origin"
        )));
    }
    let rows = rect.height() as usize;
    let (src_start, width) = src_plane.span(rect);
    let (dst_start, _) = dst_plane.span(rect);
    let (sbpr, dbpr) = (src_plane.row_bytes(), dst_plane.row_bytes());

    let out_of_range = || {
        ProducerError::mapping(format!(
            "blit rectangle {rect:?} exceeds mapping ({} src bytes, {} dst bytes)",
            src.len(),
            dst.len()
        ))
    };
    let src_end = src_start + (rows - 1) * sbpr + width;
    let dst_end = dst_start + (rows - 1) * dbpr + width;
    if src_end > src.len() || dst_end > dst.len() {
        return Err(out_of_range());
    }

    if sbpr == width && dbpr == width {
        dst[dst_start..dst_end].copy_from_slice(&src[src_start..src_end]);
        return Ok(());
    }
    for row in 0..rows {
        let s = src_start + row * sbpr;
        let d = dst_start + row * dbpr;
        dst[d..d + width].copy_from_slice(&src[s..s + width]);
    }
    Ok(())
}

/// Copy `region` from `src` into `dst`.
///
/// Both buffers are mapped on the region's bounds, `src` for reading and `dst` for writing, and
/// unmapped again before returning, whether or not the copy succeeded.
#[tracing::instrument(
    skip_all,
    fields(src = src.handle().0, dst = dst.handle().0, rects = region.rects().len())
)]
pub(crate) fn copy_blt(
    dst: &dyn GraphicBuffer,
    src: &dyn GraphicBuffer,
    region: &Region,
) -> ProducerResult<()> {
    if region.is_empty() {
        return Ok(());
    }
    let bpp = src.format().bytes_per_pixel().ok_or_else(|| {
        ProducerError::mapping(format!("format {} is not CPU addressable", src.format().0))
    })?;
    let bounds = region.bounds();
    let clip = src.bounds().intersect(dst.bounds());
    let (src_plane, dst_plane) = (Plane::of(src, bpp), Plane::of(dst, bpp));

    let src_map = src.lock(Usage::SW_READ_OFTEN, bounds)?;
    let result = match dst.lock(Usage::SW_WRITE_OFTEN, bounds) {
        Ok(mut dst_map) => {
            let copied = region.rects().iter().try_for_each(|r| {
                blit_rect(
                    dst_map.bytes_mut(),
                    dst_plane,
                    src_map.bytes(),
                    src_plane,
                    r.intersect(clip),
                )
            });
            drop(dst_map);
            if let Err(code) = dst.unlock() {
                tracing::warn!(%code, "failed to unmap copy-back destination");
            }
            copied
        }
        Err(code) => Err(code.into()),
    };
    drop(src_map);
    if let Err(code) = src.unlock() {
        tracing::warn!(%code, "failed to unmap copy-back source");
    }
    result
}

#[cfg(test)]
#[path = "../../tests/unit/render/copy_back.rs"]
mod tests;
