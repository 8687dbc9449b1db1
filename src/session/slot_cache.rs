use std::sync::Arc;

use crate::foundation::core::SlotId;
use crate::foundation::error::{ProducerError, ProducerResult};
use crate::foundation::region::Region;
use crate::queue::buffer::GraphicBuffer;

/// Number of slots in every buffer-queue ring.
pub const NUM_BUFFER_SLOTS: usize = 32;

/// One cached slot: the buffer bound to it and what of its content is stale.
#[derive(Clone, Debug, Default)]
pub struct Slot {
    /// Buffer identity last fetched for this slot.
    pub buffer: Option<Arc<dyn GraphicBuffer>>,
    /// Pixels redrawn the last time this slot was locked. `None` means the content was never
    /// drawn through this cache, or tracking was dropped, so all of it is stale.
    pub dirty: Option<Region>,
}

/// Fixed table from slot ids to buffer identities and per-slot dirty regions.
#[derive(Debug)]
pub struct SlotCache {
    slots: Vec<Slot>,
}

impl Default for SlotCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotCache {
    /// Empty cache of [`NUM_BUFFER_SLOTS`] slots.
    pub fn new() -> Self {
        Self {
            slots: vec![Slot::default(); NUM_BUFFER_SLOTS],
        }
    }

    /// Find the slot holding `buffer`, comparing allocation handles.
    pub fn resolve(&self, buffer: &dyn GraphicBuffer) -> ProducerResult<SlotId> {
        let handle = buffer.handle();
        self.slots
            .iter()
            .position(|s| s.buffer.as_ref().is_some_and(|b| b.handle() == handle))
            .ok_or_else(|| {
                tracing::warn!(?handle, "buffer not held by any slot");
                ProducerError::resolution(format!("unknown buffer handle {}", handle.0))
            })
    }

    /// Bind `buffer` to `slot`, dropping its dirty tracking.
    pub fn store(&mut self, slot: SlotId, buffer: Arc<dyn GraphicBuffer>) -> ProducerResult<()> {
        let entry = self.entry_mut(slot)?;
        entry.buffer = Some(buffer);
        entry.dirty = None;
        Ok(())
    }

    /// Forget every buffer identity and dirty region.
    pub fn invalidate_all(&mut self) {
        tracing::debug!("invalidating slot cache");
        self.slots.fill_with(Slot::default);
    }

    /// Buffer cached for `slot`, if any.
    pub fn get(&self, slot: SlotId) -> Option<&Arc<dyn GraphicBuffer>> {
        self.slots.get(slot)?.buffer.as_ref()
    }

    /// Tracked dirty region of `slot`.
    pub fn dirty(&self, slot: SlotId) -> Option<&Region> {
        self.slots.get(slot)?.dirty.as_ref()
    }

    /// Record `region` as what was redrawn in `slot`.
    pub fn set_dirty(&mut self, slot: SlotId, region: Region) -> ProducerResult<()> {
        self.entry_mut(slot)?.dirty = Some(region);
        Ok(())
    }

    /// Drop the dirty tracking of every slot.
    pub fn clear_dirty(&mut self) {
        for slot in &mut self.slots {
            slot.dirty = None;
        }
    }

    /// Union of the tracked regions of every slot except `slot`.
    pub fn dirty_union_except(&self, slot: SlotId) -> Region {
        let mut out = Region::new();
        for (_, s) in self.slots.iter().enumerate().filter(|(i, _)| *i != slot) {
            if let Some(dirty) = &s.dirty {
                out.union(dirty);
            }
        }
        out
    }

    /// Union of the tracked regions of every slot.
    pub fn dirty_union(&self) -> Region {
        let mut out = Region::new();
        for dirty in self.slots.iter().filter_map(|s| s.dirty.as_ref()) {
            out.union(dirty);
        }
        out
    }

    /// Number of slots holding a buffer.
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| s.buffer.is_some()).count()
    }

    fn entry_mut(&mut self, slot: SlotId) -> ProducerResult<&mut Slot> {
        self.slots
            .get_mut(slot)
            .ok_or_else(|| ProducerError::validation(format!("slot {slot} out of range")))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/slot_cache.rs"]
mod tests;
