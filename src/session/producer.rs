use std::sync::Arc;

use parking_lot::Mutex;

use crate::foundation::core::{
    Api, PixelFormat, Rect, ScalingMode, SlotId, Timestamp, Transform, Usage,
};
use crate::foundation::error::{ProducerError, ProducerResult};
use crate::queue::buffer::GraphicBuffer;
use crate::queue::service::{
    BufferQueue, BufferRequest, ComposerAuth, DequeueFlags, QueueBufferInput, QueueBufferOutput,
};
use crate::session::slot_cache::SlotCache;
use crate::window::ops::{CONCRETE_TYPE_SURFACE_TEXTURE_CLIENT, QueryOp};

/// Options controlling a [`ProducerSession`].
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SurfaceOpts {
    /// Smallest swap interval accepted; lower values are clamped up.
    pub min_swap_interval: i32,
    /// Largest swap interval accepted; higher values are clamped down.
    pub max_swap_interval: i32,
    /// Pending-buffer count at which the consumer counts as running behind.
    pub behind_threshold: u32,
}

impl Default for SurfaceOpts {
    fn default() -> Self {
        Self {
            min_swap_interval: 0,
            max_swap_interval: 1,
            behind_threshold: 2,
        }
    }
}

/// Which API, if any, the session is connected as.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub enum ConnectionState {
    /// Not connected.
    #[default]
    Disconnected,
    /// Connected as the given API.
    ConnectedAs(Api),
}

/// Buffer and frame parameters the next dequeue/queue will use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct RequestParams {
    /// Requested width; 0 means "use the user width".
    pub width: u32,
    /// Requested height; 0 means "use the user height".
    pub height: u32,
    /// Requested format; unspecified means "service default".
    pub format: PixelFormat,
    /// Requested usage bits.
    pub usage: Usage,
    /// Fallback width used when no dimensions are requested.
    pub user_width: u32,
    /// Fallback height used when no dimensions are requested.
    pub user_height: u32,
    /// Crop applied to queued frames; empty means "no crop".
    pub crop: Rect,
    /// Scaling policy of queued frames.
    pub scaling_mode: ScalingMode,
    /// Composition transform of queued frames.
    pub transform: Transform,
    /// Timestamp of queued frames.
    pub timestamp: Timestamp,
}

impl Default for RequestParams {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            format: PixelFormat::UNSPECIFIED,
            usage: Usage::empty(),
            user_width: 0,
            user_height: 0,
            crop: Rect::EMPTY,
            scaling_mode: ScalingMode::Freeze,
            transform: Transform::empty(),
            timestamp: Timestamp::Auto,
        }
    }
}

impl RequestParams {
    fn reset_on_disconnect(&mut self) {
        self.format = PixelFormat::UNSPECIFIED;
        self.width = 0;
        self.height = 0;
        self.usage = Usage::empty();
        self.crop = Rect::EMPTY;
        self.scaling_mode = ScalingMode::Freeze;
        self.transform = Transform::empty();
    }

    fn effective_size(&self) -> (u32, u32) {
        if self.width > 0 && self.height > 0 {
            (self.width, self.height)
        } else {
            (self.user_width, self.user_height)
        }
    }
}

#[derive(Debug)]
struct SessionState {
    slots: SlotCache,
    params: RequestParams,
    default_width: u32,
    default_height: u32,
    transform_hint: Transform,
    consumer_running_behind: bool,
    connection: ConnectionState,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            slots: SlotCache::new(),
            params: RequestParams::default(),
            default_width: 0,
            default_height: 0,
            transform_hint: Transform::empty(),
            consumer_running_behind: false,
            connection: ConnectionState::Disconnected,
        }
    }
}

impl SessionState {
    fn adopt(&mut self, out: &QueueBufferOutput, behind_threshold: u32) {
        self.default_width = out.default_width;
        self.default_height = out.default_height;
        self.transform_hint = out.transform_hint;
        self.consumer_running_behind = out.pending_buffers >= behind_threshold;
    }
}

fn validate_size(what: &str, width: i32, height: i32) -> ProducerResult<(u32, u32)> {
    if width < 0 || height < 0 {
        return Err(ProducerError::validation(format!(
            "{what} must be non-negative, got {width}x{height}"
        )));
    }
    if (width == 0) != (height == 0) {
        return Err(ProducerError::validation(format!(
            "{what} must be both zero or both positive, got {width}x{height}"
        )));
    }
    Ok((width as u32, height as u32))
}

fn clamp_i32(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

/// Producer end of a buffer queue.
///
/// Owns the slot cache, the frame-request parameters and the connection state of one window.
/// Every method serializes on one internal lock, held across the remote call it makes.
pub struct ProducerSession {
    queue: Arc<dyn BufferQueue>,
    composer: Arc<dyn ComposerAuth>,
    opts: SurfaceOpts,
    state: Mutex<SessionState>,
}

impl ProducerSession {
    /// Create a disconnected session over `queue` with default options.
    pub fn new(queue: Arc<dyn BufferQueue>, composer: Arc<dyn ComposerAuth>) -> Self {
        Self::with_opts(queue, composer, SurfaceOpts::default())
    }

    /// Create a disconnected session over `queue`.
    pub fn with_opts(
        queue: Arc<dyn BufferQueue>,
        composer: Arc<dyn ComposerAuth>,
        opts: SurfaceOpts,
    ) -> Self {
        Self {
            queue,
            composer,
            opts,
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Buffer queue this session produces into.
    pub fn buffer_queue(&self) -> &Arc<dyn BufferQueue> {
        &self.queue
    }

    /// Options this session was built with.
    pub fn opts(&self) -> &SurfaceOpts {
        &self.opts
    }

    /// Connect as `api`, adopting the consumer state the service reports.
    #[tracing::instrument(skip(self))]
    pub fn connect(&self, api: Api) -> ProducerResult<()> {
        let mut st = self.state.lock();
        let out = self.queue.connect(api).inspect_err(|code| {
            tracing::warn!(%code, "connect rejected by buffer queue");
        })?;
        st.adopt(&out, self.opts.behind_threshold);
        st.connection = ConnectionState::ConnectedAs(api);
        Ok(())
    }

    /// Disconnect `api`.
    ///
    /// The slot cache is always invalidated. On success the request parameters are reset, and the
    /// session returns to [`ConnectionState::Disconnected`] when `api` was the connected one.
    #[tracing::instrument(skip(self))]
    pub fn disconnect(&self, api: Api) -> ProducerResult<()> {
        let mut st = self.state.lock();
        st.slots.invalidate_all();
        self.queue.disconnect(api).inspect_err(|code| {
            tracing::warn!(%code, "disconnect rejected by buffer queue");
        })?;
        st.params.reset_on_disconnect();
        if st.connection == ConnectionState::ConnectedAs(api) {
            st.connection = ConnectionState::Disconnected;
        }
        Ok(())
    }

    /// Current connection state.
    pub fn connection(&self) -> ConnectionState {
        self.state.lock().connection
    }

    /// Return `true` when connected as `api`.
    pub fn is_connected_as(&self, api: Api) -> bool {
        self.connection() == ConnectionState::ConnectedAs(api)
    }

    /// Reserve a buffer for rendering.
    pub fn dequeue(&self) -> ProducerResult<Arc<dyn GraphicBuffer>> {
        self.dequeue_slot().map(|(_, buffer)| buffer)
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn dequeue_slot(&self) -> ProducerResult<(SlotId, Arc<dyn GraphicBuffer>)> {
        let mut st = self.state.lock();
        let (width, height) = st.params.effective_size();
        let request = BufferRequest {
            width,
            height,
            format: st.params.format,
            usage: st.params.usage,
        };
        let dequeued = self.queue.dequeue_buffer(request).inspect_err(|code| {
            tracing::warn!(%code, "dequeue failed");
        })?;
        let slot = dequeued.slot;

        if dequeued.flags.contains(DequeueFlags::RELEASE_ALL) {
            tracing::debug!(slot, "buffer queue released all buffers");
            st.slots.invalidate_all();
        }
        let cached = st.slots.get(slot).cloned();
        let buffer = match cached {
            Some(buffer) if !dequeued.flags.contains(DequeueFlags::NEEDS_REALLOCATION) => buffer,
            _ => {
                let buffer = self.queue.request_buffer(slot).inspect_err(|code| {
                    tracing::error!(slot, %code, "request buffer failed");
                })?;
                tracing::debug!(slot, handle = buffer.handle().0, "fetched buffer for slot");
                st.slots.store(slot, Arc::clone(&buffer))?;
                buffer
            }
        };
        Ok((slot, buffer))
    }

    /// Submit `buffer` with the current crop, scaling mode, transform and timestamp.
    ///
    /// The crop is clipped to the buffer's bounds here, not when it was set.
    #[tracing::instrument(skip(self, buffer), fields(handle = buffer.handle().0))]
    pub fn queue(&self, buffer: &dyn GraphicBuffer) -> ProducerResult<()> {
        let mut st = self.state.lock();
        let slot = st.slots.resolve(buffer)?;
        let input = QueueBufferInput {
            timestamp: st.params.timestamp.resolve(),
            crop: st.params.crop.intersect(buffer.bounds()),
            scaling_mode: st.params.scaling_mode,
            transform: st.params.transform,
        };
        let out = self.queue.queue_buffer(slot, input).inspect_err(|code| {
            tracing::error!(slot, %code, "queue buffer failed");
        })?;
        st.adopt(&out, self.opts.behind_threshold);
        tracing::trace!(
            slot,
            pending = out.pending_buffers,
            running_behind = st.consumer_running_behind,
            "queued"
        );
        Ok(())
    }

    /// Return `buffer` to the queue without submitting it.
    #[tracing::instrument(skip(self, buffer), fields(handle = buffer.handle().0))]
    pub fn cancel(&self, buffer: &dyn GraphicBuffer) -> ProducerResult<()> {
        let st = self.state.lock();
        let slot = st.slots.resolve(buffer)?;
        self.queue.cancel_buffer(slot);
        Ok(())
    }

    /// Legacy pre-render hook. Only takes the session lock.
    pub fn lock_buffer(&self, _buffer: &dyn GraphicBuffer) -> ProducerResult<()> {
        let _st = self.state.lock();
        Ok(())
    }

    /// Change the ring size. Slot identities are dropped on success.
    #[tracing::instrument(skip(self))]
    pub fn set_buffer_count(&self, count: usize) -> ProducerResult<()> {
        let mut st = self.state.lock();
        self.queue.set_buffer_count(count).inspect_err(|code| {
            tracing::warn!(%code, "set buffer count failed");
        })?;
        st.slots.invalidate_all();
        Ok(())
    }

    /// Clamp `interval` to the configured range and switch synchronous mode accordingly.
    #[tracing::instrument(skip(self))]
    pub fn set_swap_interval(&self, interval: i32) -> ProducerResult<()> {
        let interval = interval.clamp(
            self.opts.min_swap_interval,
            self.opts.max_swap_interval.max(self.opts.min_swap_interval),
        );
        self.queue.set_synchronous_mode(interval != 0)?;
        Ok(())
    }

    /// Set the usage bits requested on dequeue.
    pub fn set_usage(&self, usage: Usage) {
        tracing::debug!(?usage, "set usage");
        self.state.lock().params.usage = usage;
    }

    /// Set the crop of queued frames. `None` or an empty rectangle clears it.
    pub fn set_crop(&self, crop: Option<Rect>) {
        let crop = crop.filter(|r| !r.is_empty()).unwrap_or(Rect::EMPTY);
        tracing::debug!(?crop, "set crop");
        self.state.lock().params.crop = crop;
    }

    /// Set the requested dimensions; `(0, 0)` falls back to the user dimensions.
    pub fn set_buffers_dimensions(&self, width: i32, height: i32) -> ProducerResult<()> {
        let (width, height) = validate_size("buffer dimensions", width, height)?;
        let mut st = self.state.lock();
        st.params.width = width;
        st.params.height = height;
        Ok(())
    }

    /// Set the fallback dimensions used when none are requested.
    pub fn set_buffers_user_dimensions(&self, width: i32, height: i32) -> ProducerResult<()> {
        let (width, height) = validate_size("user dimensions", width, height)?;
        let mut st = self.state.lock();
        st.params.user_width = width;
        st.params.user_height = height;
        Ok(())
    }

    /// Set the requested format; 0 means "service default".
    pub fn set_buffers_format(&self, format: i32) -> ProducerResult<()> {
        if format < 0 {
            return Err(ProducerError::validation(format!(
                "buffer format must be non-negative, got {format}"
            )));
        }
        self.state.lock().params.format = PixelFormat(format);
        Ok(())
    }

    /// Set dimensions, then format. Stops at the first rejected value.
    pub fn set_buffers_geometry(&self, width: i32, height: i32, format: i32) -> ProducerResult<()> {
        self.set_buffers_dimensions(width, height)?;
        self.set_buffers_format(format)
    }

    /// Set the scaling mode from its raw value.
    pub fn set_scaling_mode(&self, mode: i32) -> ProducerResult<()> {
        let mode = ScalingMode::try_from(mode)?;
        self.state.lock().params.scaling_mode = mode;
        Ok(())
    }

    /// Set the composition transform of queued frames.
    pub fn set_buffers_transform(&self, transform: Transform) {
        self.state.lock().params.transform = transform;
    }

    /// Set the timestamp of queued frames.
    pub fn set_buffers_timestamp(&self, timestamp: Timestamp) -> ProducerResult<()> {
        if let Timestamp::At(ns) = timestamp
            && ns < 0
        {
            return Err(ProducerError::validation(format!(
                "timestamp must be non-negative, got {ns}"
            )));
        }
        self.state.lock().params.timestamp = timestamp;
        Ok(())
    }

    /// Answer a window query, forwarding what the session does not track.
    ///
    /// [`QueryOp::ConsumerRunningBehind`] only asks the service again while the cached flag is
    /// set; once it reads `false` it stays so until the next queue or connect.
    pub fn query(&self, what: QueryOp) -> ProducerResult<i32> {
        let mut st = self.state.lock();
        let value = match what {
            QueryOp::Format if st.params.format != PixelFormat::UNSPECIFIED => st.params.format.0,
            QueryOp::QueuesToWindowComposer => i32::from(self.composer.authenticate(&self.queue)),
            QueryOp::ConcreteType => CONCRETE_TYPE_SURFACE_TEXTURE_CLIENT,
            QueryOp::DefaultWidth => clamp_i32(if st.params.user_width > 0 {
                st.params.user_width
            } else {
                st.default_width
            }),
            QueryOp::DefaultHeight => clamp_i32(if st.params.user_height > 0 {
                st.params.user_height
            } else {
                st.default_height
            }),
            QueryOp::TransformHint => st.transform_hint.bits() as i32,
            QueryOp::ConsumerRunningBehind => {
                if st.consumer_running_behind {
                    let remote = self.queue.query(what.code())?;
                    st.consumer_running_behind = remote != 0;
                }
                i32::from(st.consumer_running_behind)
            }
            _ => self.queue.query(what.code())?,
        };
        Ok(value)
    }

    /// Snapshot of the current request parameters.
    pub fn params(&self) -> RequestParams {
        self.state.lock().params
    }

    /// Consumer default size as last reported by the service.
    pub fn default_size(&self) -> (u32, u32) {
        let st = self.state.lock();
        (st.default_width, st.default_height)
    }

    /// Transform hint as last reported by the service.
    pub fn transform_hint(&self) -> Transform {
        self.state.lock().transform_hint
    }

    /// Cached running-behind flag, without refreshing it.
    pub fn consumer_running_behind(&self) -> bool {
        self.state.lock().consumer_running_behind
    }

    /// Buffer cached for `slot`, if any.
    pub fn cached_buffer(&self, slot: SlotId) -> Option<Arc<dyn GraphicBuffer>> {
        self.state.lock().slots.get(slot).cloned()
    }

    /// Run `f` with exclusive access to the slot cache.
    pub(crate) fn with_slots<R>(&self, f: impl FnOnce(&mut SlotCache) -> R) -> R {
        f(&mut self.state.lock().slots)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/producer.rs"]
mod tests;
