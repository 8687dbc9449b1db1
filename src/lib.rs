//! Producer side of a multi-buffered graphics queue.
//!
//! A [`Surface`] hands finished pixel buffers to a [`BufferQueue`] consumed by a compositor or
//! encoder. It caches buffer identities per slot so buffers are only fetched from the service
//! when they change, and its software path tracks dirty regions so each frame only redraws what
//! moved:
//!
//! - [`ProducerSession`] owns the slot cache, the request parameters and the connection
//! - [`Surface`] adds `lock`/`unlock_and_post` with copy-back from the last posted buffer
//! - [`NativeWindow`] and [`WindowOp`] expose both through a typed operation surface
#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// Value types, errors and regions shared by every layer.
pub mod foundation;
pub mod queue;
/// Software rendering path.
pub mod render;
/// Slot cache and producer session.
pub mod session;
pub mod window;

pub use crate::foundation::core::{
    Api, BufferHandle, PixelFormat, Rect, ScalingMode, SlotId, Timestamp, Transform, Usage,
};
pub use crate::foundation::error::{ProducerError, ProducerResult, StatusCode};
pub use crate::foundation::region::Region;
pub use crate::queue::buffer::{GraphicBuffer, PixelMapping};
pub use crate::queue::memory::{
    HeapBuffer, InMemoryBufferQueue, InMemoryQueueOpts, QueueCall, QueuedFrame, StaticComposer,
    TrustedComposer,
};
pub use crate::queue::service::{
    BufferQueue, BufferRequest, ComposerAuth, DequeueFlags, DequeuedSlot, QueueBufferInput,
    QueueBufferOutput,
};
pub use crate::render::cpu::{LockedSurface, Surface};
pub use crate::session::producer::{ConnectionState, ProducerSession, RequestParams, SurfaceOpts};
pub use crate::session::slot_cache::{NUM_BUFFER_SLOTS, SlotCache};
pub use crate::window::native::{NativeWindow, PerformReply};
pub use crate::window::ops::{CONCRETE_TYPE_SURFACE_TEXTURE_CLIENT, QueryOp, WindowOp};
