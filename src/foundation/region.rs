//! Pixel regions: sets of rectangles used for dirty tracking and copy-back.

use smallvec::SmallVec;

use crate::foundation::core::Rect;

/// A set of pixels stored as pairwise-disjoint, non-empty rectangles.
///
/// Every operation keeps the rectangles disjoint, so `area` is the exact pixel count and a blit
/// over `rects()` touches every pixel at most once.
#[derive(Clone, Debug, Default)]
pub struct Region {
    rects: SmallVec<[Rect; 4]>,
}

impl Region {
    /// Empty region.
    pub fn new() -> Self {
        Self::default()
    }

    /// Region covering exactly `rect`.
    pub fn from_rect(rect: Rect) -> Self {
        let mut rects = SmallVec::new();
        if !rect.is_empty() {
            rects.push(rect);
        }
        Self { rects }
    }

    /// Return `true` when the region covers no pixel.
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Disjoint rectangles making up the region, in no particular order.
    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    /// Smallest rectangle covering the region; [`Rect::EMPTY`] for an empty region.
    pub fn bounds(&self) -> Rect {
        self.rects
            .iter()
            .fold(Rect::EMPTY, |acc, r| acc.union_bounds(*r))
    }

    /// Exact pixel count.
    pub fn area(&self) -> u64 {
        self.rects.iter().map(|r| r.area()).sum()
    }

    /// Return `true` when pixel `(x, y)` is in the region.
    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        self.rects.iter().any(|r| r.contains_point(x, y))
    }

    /// Remove every pixel.
    pub fn clear(&mut self) {
        self.rects.clear();
    }

    /// Add the pixels of `rect`.
    pub fn union_rect(&mut self, rect: Rect) {
        if rect.is_empty() {
            return;
        }
        // Only the parts of `rect` not already covered are appended.
        let mut fresh: SmallVec<[Rect; 4]> = SmallVec::new();
        fresh.push(rect);
        for existing in &self.rects {
            if fresh.is_empty() {
                return;
            }
            fresh = fresh
                .into_iter()
                .flat_map(|piece| piece.subtract(*existing))
                .collect();
        }
        self.rects.extend(fresh);
    }

    /// Add the pixels of `other`.
    pub fn union(&mut self, other: &Region) {
        for r in &other.rects {
            self.union_rect(*r);
        }
    }

    /// Remove the pixels of `rect`.
    pub fn subtract_rect(&mut self, rect: Rect) {
        if rect.is_empty() || self.is_empty() {
            return;
        }
        self.rects = self
            .rects
            .iter()
            .flat_map(|existing| existing.subtract(rect))
            .collect();
    }

    /// Remove the pixels of `other`.
    pub fn subtract(&mut self, other: &Region) {
        for r in &other.rects {
            self.subtract_rect(*r);
        }
    }

    /// Keep only the pixels inside `rect`.
    pub fn intersect_rect(&mut self, rect: Rect) {
        self.rects = self
            .rects
            .iter()
            .map(|r| r.intersect(rect))
            .filter(|r| !r.is_empty())
            .collect();
    }

    /// Return `true` when both regions cover exactly the same pixels, however they are split.
    pub fn same_pixels(&self, other: &Region) -> bool {
        self.area() == other.area() && self.subtracted(other).is_empty()
    }

    /// `self - other` as a new region.
    pub fn subtracted(&self, other: &Region) -> Region {
        let mut out = self.clone();
        out.subtract(other);
        out
    }
}

impl From<Rect> for Region {
    fn from(rect: Rect) -> Self {
        Self::from_rect(rect)
    }
}

impl FromIterator<Rect> for Region {
    fn from_iter<I: IntoIterator<Item = Rect>>(iter: I) -> Self {
        let mut region = Region::new();
        for r in iter {
            region.union_rect(r);
        }
        region
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/region.rs"]
mod tests;
