use std::sync::Arc;

use crate::foundation::core::{Api, PixelFormat, Rect, ScalingMode, SlotId, Transform, Usage};
use crate::foundation::error::StatusCode;
use crate::queue::buffer::GraphicBuffer;

bitflags::bitflags! {
    /// Cache-maintenance flags returned alongside a dequeued slot.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct DequeueFlags: u32 {
        /// The slot's buffer changed; fetch it again before use.
        const NEEDS_REALLOCATION = 0x1;
        /// Every cached buffer identity is stale.
        const RELEASE_ALL = 0x2;
    }
}

/// Geometry and usage asked of the service on dequeue. Zero fields mean "service default".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferRequest {
    /// Requested width in pixels.
    pub width: u32,
    /// Requested height in pixels.
    pub height: u32,
    /// Requested format.
    pub format: PixelFormat,
    /// Requested usage bits.
    pub usage: Usage,
}

/// A slot handed out by [`BufferQueue::dequeue_buffer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DequeuedSlot {
    /// Slot index in `[0, NUM_BUFFER_SLOTS)`.
    pub slot: SlotId,
    /// Cache-maintenance flags.
    pub flags: DequeueFlags,
}

/// Per-frame metadata submitted with a queued buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct QueueBufferInput {
    /// Presentation timestamp in nanoseconds.
    pub timestamp: i64,
    /// Crop already clipped to the buffer bounds; empty means "no crop".
    pub crop: Rect,
    /// Scaling policy.
    pub scaling_mode: ScalingMode,
    /// Composition transform.
    pub transform: Transform,
}

/// Consumer-side state reported back on queue and connect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct QueueBufferOutput {
    /// Consumer's default buffer width.
    pub default_width: u32,
    /// Consumer's default buffer height.
    pub default_height: u32,
    /// Transform the consumer would like the producer to pre-apply.
    pub transform_hint: Transform,
    /// Buffers queued but not yet consumed.
    pub pending_buffers: u32,
}

/// Producer-side contract of the remote buffer-queue service.
///
/// Calls are synchronous and may block; implementations report failures as [`StatusCode`]s,
/// which the producer propagates verbatim.
pub trait BufferQueue: Send + Sync {
    /// Reserve a slot for rendering.
    fn dequeue_buffer(&self, request: BufferRequest) -> Result<DequeuedSlot, StatusCode>;
    /// Fetch the buffer object currently bound to `slot`.
    fn request_buffer(&self, slot: SlotId) -> Result<Arc<dyn GraphicBuffer>, StatusCode>;
    /// Hand a rendered slot to the consumer.
    fn queue_buffer(
        &self,
        slot: SlotId,
        input: QueueBufferInput,
    ) -> Result<QueueBufferOutput, StatusCode>;
    /// Return a dequeued slot without submitting it.
    fn cancel_buffer(&self, slot: SlotId);
    /// Connect as `api`.
    fn connect(&self, api: Api) -> Result<QueueBufferOutput, StatusCode>;
    /// Disconnect `api`.
    fn disconnect(&self, api: Api) -> Result<(), StatusCode>;
    /// Change the number of buffers in the ring; slot bindings may change.
    fn set_buffer_count(&self, count: usize) -> Result<(), StatusCode>;
    /// Fallback query channel for values the producer does not track.
    fn query(&self, what: i32) -> Result<i32, StatusCode>;
    /// Switch between blocking (synchronous) and non-blocking queueing.
    fn set_synchronous_mode(&self, enabled: bool) -> Result<(), StatusCode>;
}

/// Decides whether a buffer queue feeds the system window composer.
pub trait ComposerAuth: Send + Sync {
    /// Return `true` when `queue` is known to the composer.
    fn authenticate(&self, queue: &Arc<dyn BufferQueue>) -> bool;
}
