use std::sync::Arc;

use crate::foundation::error::{ProducerResult, StatusCode};
use crate::queue::buffer::GraphicBuffer;
use crate::render::cpu::{LockedSurface, Surface};
use crate::window::ops::{QueryOp, WindowOp};

/// Result of [`NativeWindow::perform`].
#[derive(Debug)]
pub enum PerformReply {
    /// The operation completed and returns nothing.
    Done,
    /// A `LOCK` operation mapped a buffer.
    Locked(LockedSurface),
}

/// Window interface a rendering client draws through.
pub trait NativeWindow: Send + Sync {
    /// Set how many display refreshes to wait between frames.
    fn set_swap_interval(&self, interval: i32) -> ProducerResult<()>;
    /// Reserve a buffer for rendering.
    fn dequeue_buffer(&self) -> ProducerResult<Arc<dyn GraphicBuffer>>;
    /// Return a dequeued buffer without submitting it.
    fn cancel_buffer(&self, buffer: &dyn GraphicBuffer) -> ProducerResult<()>;
    /// Legacy hook called before rendering into a dequeued buffer.
    fn lock_buffer(&self, buffer: &dyn GraphicBuffer) -> ProducerResult<()>;
    /// Submit a rendered buffer.
    fn queue_buffer(&self, buffer: &dyn GraphicBuffer) -> ProducerResult<()>;
    /// Answer a window query.
    fn query(&self, what: QueryOp) -> ProducerResult<i32>;
    /// Apply a typed operation.
    fn perform(&self, op: WindowOp) -> ProducerResult<PerformReply>;

    /// Decode a raw `(code, args)` operation and apply it.
    fn perform_raw(&self, code: i32, args: &[i64]) -> ProducerResult<PerformReply> {
        self.perform(WindowOp::decode(code, args)?)
    }

    /// Raw query: any failure is folded into its result code.
    fn query_raw(&self, code: i32) -> Result<i32, StatusCode> {
        self.query(QueryOp::from_code(code)).map_err(|e| e.status())
    }
}

impl NativeWindow for Surface {
    fn set_swap_interval(&self, interval: i32) -> ProducerResult<()> {
        self.session().set_swap_interval(interval)
    }

    fn dequeue_buffer(&self) -> ProducerResult<Arc<dyn GraphicBuffer>> {
        self.session().dequeue()
    }

    fn cancel_buffer(&self, buffer: &dyn GraphicBuffer) -> ProducerResult<()> {
        self.session().cancel(buffer)
    }

    fn lock_buffer(&self, buffer: &dyn GraphicBuffer) -> ProducerResult<()> {
        self.session().lock_buffer(buffer)
    }

    fn queue_buffer(&self, buffer: &dyn GraphicBuffer) -> ProducerResult<()> {
        self.session().queue(buffer)
    }

    fn query(&self, what: QueryOp) -> ProducerResult<i32> {
        self.session().query(what)
    }

    #[tracing::instrument(skip(self))]
    fn perform(&self, op: WindowOp) -> ProducerResult<PerformReply> {
        let session = self.session();
        match op {
            WindowOp::Connect | WindowOp::Disconnect => {}
            WindowOp::SetUsage(usage) => session.set_usage(usage),
            WindowOp::SetCrop(crop) => session.set_crop(crop),
            WindowOp::SetBufferCount(count) => session.set_buffer_count(count)?,
            WindowOp::SetBuffersGeometry {
                width,
                height,
                format,
            } => session.set_buffers_geometry(width, height, format)?,
            WindowOp::SetBuffersTransform(transform) => session.set_buffers_transform(transform),
            WindowOp::SetBuffersTimestamp(timestamp) => session.set_buffers_timestamp(timestamp)?,
            WindowOp::SetBuffersDimensions { width, height } => {
                session.set_buffers_dimensions(width, height)?
            }
            WindowOp::SetBuffersUserDimensions { width, height } => {
                session.set_buffers_user_dimensions(width, height)?
            }
            WindowOp::SetBuffersFormat(format) => session.set_buffers_format(format)?,
            WindowOp::SetScalingMode(mode) => session.set_scaling_mode(mode)?,
            WindowOp::Lock(dirty) => return self.lock(dirty).map(PerformReply::Locked),
            WindowOp::UnlockAndPost => self.unlock_and_post()?,
            WindowOp::ApiConnect(api) => session.connect(api)?,
            WindowOp::ApiDisconnect(api) => self.disconnect(api)?,
        }
        Ok(PerformReply::Done)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/window/native.rs"]
mod tests;
