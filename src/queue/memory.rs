//! In-memory buffer queue, heap-backed pixel buffers and fixed composer answers.
//!
//! These back the diagnostic binary and the test suite; they model the service closely enough to
//! exercise slot reuse, reallocation, release-all and consumer latency, but do no real IPC.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::foundation::core::{Api, BufferHandle, PixelFormat, Rect, SlotId, Transform, Usage};
use crate::foundation::error::StatusCode;
use crate::queue::buffer::{GraphicBuffer, PixelMapping};
use crate::queue::service::{
    BufferQueue, BufferRequest, ComposerAuth, DequeueFlags, DequeuedSlot, QueueBufferInput,
    QueueBufferOutput,
};
use crate::session::slot_cache::NUM_BUFFER_SLOTS;
use crate::window::ops::QueryOp;

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

type SharedBytes = Arc<Mutex<Option<Vec<u8>>>>;

/// Pixel buffer backed by a heap allocation.
///
/// While mapped, the storage is moved into the [`PixelMapping`] and returned on drop, so a second
/// concurrent `lock` fails with [`StatusCode::BUSY`] instead of aliasing.
#[derive(Debug)]
pub struct HeapBuffer {
    handle: BufferHandle,
    width: u32,
    height: u32,
    stride: u32,
    format: PixelFormat,
    usage: Usage,
    bytes: SharedBytes,
    locks: Mutex<Vec<(Usage, Rect)>>,
}

impl HeapBuffer {
    /// Allocate a zeroed buffer. The stride is the width rounded up to 4 pixels.
    pub fn new(width: u32, height: u32, format: PixelFormat, usage: Usage) -> Self {
        let stride = width.div_ceil(4) * 4;
        let bpp = format.bytes_per_pixel().unwrap_or(4);
        let len = (stride as usize) * (height as usize) * bpp;
        Self {
            handle: BufferHandle(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed)),
            width,
            height,
            stride,
            format,
            usage,
            bytes: Arc::new(Mutex::new(Some(vec![0; len]))),
            locks: Mutex::new(Vec::new()),
        }
    }

    /// Usage the buffer was allocated for.
    pub fn usage(&self) -> Usage {
        self.usage
    }

    /// Every `(usage, region)` this buffer has been locked with, oldest first.
    pub fn lock_history(&self) -> Vec<(Usage, Rect)> {
        self.locks.lock().clone()
    }

    /// Bytes of pixel `(x, y)`, or `None` while the buffer is mapped or out of range.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Vec<u8>> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let bpp = self.format.bytes_per_pixel().unwrap_or(4);
        let guard = self.bytes.lock();
        let bytes = guard.as_ref()?;
        let off = ((y as usize) * (self.stride as usize) + x as usize) * bpp;
        bytes.get(off..off + bpp).map(<[u8]>::to_vec)
    }

    fn fits(&self, request: &BufferRequest, width: u32, height: u32, format: PixelFormat) -> bool {
        self.width == width
            && self.height == height
            && self.format == format
            && self.usage.contains(request.usage)
    }
}

struct HeapMapping {
    storage: SharedBytes,
    bytes: Vec<u8>,
}

impl PixelMapping for HeapMapping {
    fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl Drop for HeapMapping {
    fn drop(&mut self) {
        *self.storage.lock() = Some(std::mem::take(&mut self.bytes));
    }
}

impl GraphicBuffer for HeapBuffer {
    fn handle(&self) -> BufferHandle {
        self.handle
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn stride(&self) -> u32 {
        self.stride
    }

    fn format(&self) -> PixelFormat {
        self.format
    }

    fn lock(&self, usage: Usage, region: Rect) -> Result<Box<dyn PixelMapping>, StatusCode> {
        let bytes = self.bytes.lock().take().ok_or(StatusCode::BUSY)?;
        self.locks.lock().push((usage, region));
        Ok(Box::new(HeapMapping {
            storage: Arc::clone(&self.bytes),
            bytes,
        }))
    }

    fn unlock(&self) -> Result<(), StatusCode> {
        Ok(())
    }
}

/// Options for [`InMemoryBufferQueue`].
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct InMemoryQueueOpts {
    /// Number of slots in the ring.
    pub buffer_count: usize,
    /// Width used when the producer requests 0.
    pub default_width: u32,
    /// Height used when the producer requests 0.
    pub default_height: u32,
    /// Format used when the producer requests [`PixelFormat::UNSPECIFIED`].
    pub default_format: PixelFormat,
    /// Latch every queued frame immediately, as a display that never falls behind would.
    pub auto_consume: bool,
    /// Answer to the MIN_UNDEQUEUED_BUFFERS query.
    pub min_undequeued_buffers: i32,
}

impl Default for InMemoryQueueOpts {
    fn default() -> Self {
        Self {
            buffer_count: 3,
            default_width: 64,
            default_height: 64,
            default_format: PixelFormat::RGBA_8888,
            auto_consume: true,
            min_undequeued_buffers: 1,
        }
    }
}

/// Service entry points that can be made to fail via [`InMemoryBufferQueue::inject_fault`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueueCall {
    /// `dequeue_buffer`
    Dequeue,
    /// `request_buffer`
    RequestBuffer,
    /// `queue_buffer`
    Queue,
    /// `connect`
    Connect,
    /// `disconnect`
    Disconnect,
    /// `set_buffer_count`
    SetBufferCount,
    /// `query`
    Query,
    /// `set_synchronous_mode`
    SetSynchronousMode,
}

/// One frame as received by the service.
#[derive(Clone, Debug)]
pub struct QueuedFrame {
    /// Slot the frame was queued from.
    pub slot: SlotId,
    /// Identity of the buffer bound to that slot.
    pub handle: BufferHandle,
    /// Metadata as submitted.
    pub input: QueueBufferInput,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SlotState {
    Free,
    Dequeued,
    Queued,
    Acquired,
}

struct QueueSlot {
    state: SlotState,
    buffer: Option<Arc<HeapBuffer>>,
}

struct QueueInner {
    opts: InMemoryQueueOpts,
    slots: Vec<QueueSlot>,
    queued: VecDeque<SlotId>,
    acquired: Option<SlotId>,
    next_slot: SlotId,
    connected: Option<Api>,
    release_all_pending: bool,
    synchronous: bool,
    transform_hint: Transform,
    faults: HashMap<QueueCall, StatusCode>,
    frames: Vec<QueuedFrame>,
    cancelled: Vec<SlotId>,
}

impl QueueInner {
    fn fault(&mut self, call: QueueCall) -> Result<(), StatusCode> {
        match self.faults.remove(&call) {
            Some(code) => Err(code),
            None => Ok(()),
        }
    }

    fn output(&self) -> QueueBufferOutput {
        QueueBufferOutput {
            default_width: self.opts.default_width,
            default_height: self.opts.default_height,
            transform_hint: self.transform_hint,
            pending_buffers: u32::try_from(self.queued.len()).unwrap_or(u32::MAX),
        }
    }

    fn consume(&mut self) -> Option<SlotId> {
        let slot = self.queued.pop_front()?;
        if let Some(prev) = self.acquired.replace(slot) {
            self.slots[prev].state = SlotState::Free;
        }
        self.slots[slot].state = SlotState::Acquired;
        Some(slot)
    }

    fn free_all(&mut self) {
        for slot in &mut self.slots {
            slot.state = SlotState::Free;
            slot.buffer = None;
        }
        self.queued.clear();
        self.acquired = None;
    }

    fn active_slots(&self) -> usize {
        self.opts.buffer_count.min(self.slots.len())
    }
}

/// Buffer-queue service simulated in process memory.
pub struct InMemoryBufferQueue {
    inner: Mutex<QueueInner>,
}

impl InMemoryBufferQueue {
    /// Create a queue with `opts`. The buffer count is clamped to `[1, NUM_BUFFER_SLOTS]`.
    pub fn new(mut opts: InMemoryQueueOpts) -> Self {
        opts.buffer_count = opts.buffer_count.clamp(1, NUM_BUFFER_SLOTS);
        let slots = (0..NUM_BUFFER_SLOTS)
            .map(|_| QueueSlot {
                state: SlotState::Free,
                buffer: None,
            })
            .collect();
        Self {
            inner: Mutex::new(QueueInner {
                opts,
                slots,
                queued: VecDeque::new(),
                acquired: None,
                next_slot: 0,
                connected: None,
                release_all_pending: false,
                synchronous: false,
                transform_hint: Transform::empty(),
                faults: HashMap::new(),
                frames: Vec::new(),
                cancelled: Vec::new(),
            }),
        }
    }

    /// Make the next call of kind `call` fail with `code`.
    pub fn inject_fault(&self, call: QueueCall, code: StatusCode) {
        self.inner.lock().faults.insert(call, code);
    }

    /// Latch the oldest queued frame, releasing the previously latched one. Returns its slot.
    pub fn consume(&self) -> Option<SlotId> {
        self.inner.lock().consume()
    }

    /// Drop every buffer not currently dequeued and flag RELEASE_ALL on the next dequeue.
    pub fn release_all(&self) {
        let mut inner = self.inner.lock();
        for slot in &mut inner.slots {
            if slot.state != SlotState::Dequeued {
                slot.buffer = None;
            }
        }
        inner.release_all_pending = true;
    }

    /// Change the consumer's default buffer size.
    pub fn set_default_size(&self, width: u32, height: u32) {
        let mut inner = self.inner.lock();
        inner.opts.default_width = width;
        inner.opts.default_height = height;
    }

    /// Change the transform hint reported on queue/connect.
    pub fn set_transform_hint(&self, hint: Transform) {
        self.inner.lock().transform_hint = hint;
    }

    /// Every frame queued so far, oldest first.
    pub fn frames(&self) -> Vec<QueuedFrame> {
        self.inner.lock().frames.clone()
    }

    /// The most recently queued frame.
    pub fn last_frame(&self) -> Option<QueuedFrame> {
        self.inner.lock().frames.last().cloned()
    }

    /// Slots returned through `cancel_buffer`, oldest first.
    pub fn cancelled(&self) -> Vec<SlotId> {
        self.inner.lock().cancelled.clone()
    }

    /// Buffer currently bound to `slot`.
    pub fn heap_buffer(&self, slot: SlotId) -> Option<Arc<HeapBuffer>> {
        self.inner.lock().slots.get(slot)?.buffer.clone()
    }

    /// Frames queued but not yet consumed.
    pub fn pending(&self) -> usize {
        self.inner.lock().queued.len()
    }

    /// API currently connected.
    pub fn connected(&self) -> Option<Api> {
        self.inner.lock().connected
    }

    /// Whether synchronous mode was requested.
    pub fn synchronous(&self) -> bool {
        self.inner.lock().synchronous
    }

    /// Current buffer count.
    pub fn buffer_count(&self) -> usize {
        self.inner.lock().opts.buffer_count
    }
}

impl Default for InMemoryBufferQueue {
    fn default() -> Self {
        Self::new(InMemoryQueueOpts::default())
    }
}

impl BufferQueue for InMemoryBufferQueue {
    fn dequeue_buffer(&self, request: BufferRequest) -> Result<DequeuedSlot, StatusCode> {
        let mut inner = self.inner.lock();
        inner.fault(QueueCall::Dequeue)?;

        let count = inner.active_slots();
        let start = inner.next_slot % count;
        let slot = (0..count)
            .map(|i| (start + i) % count)
            .find(|&i| inner.slots[i].state == SlotState::Free)
            .ok_or(StatusCode::WOULD_BLOCK)?;
        inner.next_slot = (slot + 1) % count;

        let width = if request.width > 0 {
            request.width
        } else {
            inner.opts.default_width
        };
        let height = if request.height > 0 {
            request.height
        } else {
            inner.opts.default_height
        };
        let format = if request.format != PixelFormat::UNSPECIFIED {
            request.format
        } else {
            inner.opts.default_format
        };

        let mut flags = DequeueFlags::empty();
        if std::mem::take(&mut inner.release_all_pending) {
            flags |= DequeueFlags::RELEASE_ALL;
        }
        let entry = &mut inner.slots[slot];
        let reusable = entry
            .buffer
            .as_ref()
            .is_some_and(|b| b.fits(&request, width, height, format));
        if !reusable {
            entry.buffer = Some(Arc::new(HeapBuffer::new(
                width,
                height,
                format,
                request.usage,
            )));
            flags |= DequeueFlags::NEEDS_REALLOCATION;
        }
        entry.state = SlotState::Dequeued;
        Ok(DequeuedSlot { slot, flags })
    }

    fn request_buffer(&self, slot: SlotId) -> Result<Arc<dyn GraphicBuffer>, StatusCode> {
        let mut inner = self.inner.lock();
        inner.fault(QueueCall::RequestBuffer)?;
        let entry = inner.slots.get(slot).ok_or(StatusCode::BAD_VALUE)?;
        if entry.state != SlotState::Dequeued {
            return Err(StatusCode::BAD_VALUE);
        }
        let buffer = entry.buffer.clone().ok_or(StatusCode::BAD_VALUE)?;
        Ok(buffer as Arc<dyn GraphicBuffer>)
    }

    fn queue_buffer(
        &self,
        slot: SlotId,
        input: QueueBufferInput,
    ) -> Result<QueueBufferOutput, StatusCode> {
        let mut inner = self.inner.lock();
        inner.fault(QueueCall::Queue)?;
        let entry = inner.slots.get_mut(slot).ok_or(StatusCode::BAD_VALUE)?;
        if entry.state != SlotState::Dequeued {
            return Err(StatusCode::BAD_VALUE);
        }
        let handle = entry
            .buffer
            .as_ref()
            .map(|b| b.handle())
            .ok_or(StatusCode::BAD_VALUE)?;
        entry.state = SlotState::Queued;
        inner.queued.push_back(slot);
        inner.frames.push(QueuedFrame {
            slot,
            handle,
            input,
        });
        if inner.opts.auto_consume {
            inner.consume();
        }
        Ok(inner.output())
    }

    fn cancel_buffer(&self, slot: SlotId) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.slots.get_mut(slot)
            && entry.state == SlotState::Dequeued
        {
            entry.state = SlotState::Free;
        }
        inner.cancelled.push(slot);
    }

    fn connect(&self, api: Api) -> Result<QueueBufferOutput, StatusCode> {
        let mut inner = self.inner.lock();
        inner.fault(QueueCall::Connect)?;
        if inner.connected.is_some() {
            return Err(StatusCode::BAD_VALUE);
        }
        inner.connected = Some(api);
        Ok(inner.output())
    }

    fn disconnect(&self, api: Api) -> Result<(), StatusCode> {
        let mut inner = self.inner.lock();
        inner.fault(QueueCall::Disconnect)?;
        if inner.connected != Some(api) {
            return Err(StatusCode::BAD_VALUE);
        }
        inner.connected = None;
        inner.free_all();
        Ok(())
    }

    fn set_buffer_count(&self, count: usize) -> Result<(), StatusCode> {
        let mut inner = self.inner.lock();
        inner.fault(QueueCall::SetBufferCount)?;
        if count == 0 || count > NUM_BUFFER_SLOTS {
            return Err(StatusCode::BAD_VALUE);
        }
        if inner.slots.iter().any(|s| s.state == SlotState::Dequeued) {
            return Err(StatusCode::INVALID_OPERATION);
        }
        inner.opts.buffer_count = count;
        inner.next_slot = 0;
        inner.free_all();
        inner.release_all_pending = true;
        Ok(())
    }

    fn query(&self, what: i32) -> Result<i32, StatusCode> {
        let mut inner = self.inner.lock();
        inner.fault(QueueCall::Query)?;
        let clamp = |v: u32| i32::try_from(v).unwrap_or(i32::MAX);
        match QueryOp::from_code(what) {
            QueryOp::Width => Ok(clamp(inner.opts.default_width)),
            QueryOp::Height => Ok(clamp(inner.opts.default_height)),
            QueryOp::Format => Ok(inner.opts.default_format.0),
            QueryOp::MinUndequeuedBuffers => Ok(inner.opts.min_undequeued_buffers),
            QueryOp::ConsumerRunningBehind => Ok(i32::from(inner.queued.len() >= 2)),
            _ => Err(StatusCode::BAD_VALUE),
        }
    }

    fn set_synchronous_mode(&self, enabled: bool) -> Result<(), StatusCode> {
        let mut inner = self.inner.lock();
        inner.fault(QueueCall::SetSynchronousMode)?;
        inner.synchronous = enabled;
        Ok(())
    }
}

/// Composer that gives the same answer for every queue.
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticComposer(pub bool);

impl ComposerAuth for StaticComposer {
    fn authenticate(&self, _queue: &Arc<dyn BufferQueue>) -> bool {
        self.0
    }
}

/// Composer that recognises an explicit set of queues.
#[derive(Default)]
pub struct TrustedComposer {
    trusted: Mutex<Vec<Arc<dyn BufferQueue>>>,
}

impl TrustedComposer {
    /// Composer that trusts nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start trusting `queue`.
    pub fn trust(&self, queue: Arc<dyn BufferQueue>) {
        self.trusted.lock().push(queue);
    }
}

impl ComposerAuth for TrustedComposer {
    fn authenticate(&self, queue: &Arc<dyn BufferQueue>) -> bool {
        self.trusted.lock().iter().any(|q| Arc::ptr_eq(q, queue))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/queue/memory.rs"]
mod tests;
