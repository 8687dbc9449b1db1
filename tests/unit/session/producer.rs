use super::*;
use crate::foundation::error::StatusCode;
use crate::queue::memory::{
    HeapBuffer, InMemoryBufferQueue, InMemoryQueueOpts, QueueCall, StaticComposer,
};

fn session_with(opts: InMemoryQueueOpts) -> (Arc<InMemoryBufferQueue>, ProducerSession) {
    let queue = Arc::new(InMemoryBufferQueue::new(opts));
    let session = ProducerSession::new(queue.clone(), Arc::new(StaticComposer(true)));
    (queue, session)
}

fn session() -> (Arc<InMemoryBufferQueue>, ProducerSession) {
    session_with(InMemoryQueueOpts::default())
}

#[test]
fn connect_adopts_consumer_state() {
    let (queue, s) = session();
    queue.set_default_size(40, 30);
    queue.set_transform_hint(Transform::FLIP_H);
    s.connect(Api::Egl).unwrap();
    assert!(s.is_connected_as(Api::Egl));
    assert_eq!(s.default_size(), (40, 30));
    assert_eq!(s.query(QueryOp::TransformHint).unwrap(), 1);
}

#[test]
fn accessors_expose_queue_opts_and_hint() {
    let queue = Arc::new(InMemoryBufferQueue::default());
    let opts = SurfaceOpts {
        behind_threshold: 5,
        ..Default::default()
    };
    let s = ProducerSession::with_opts(queue.clone(), Arc::new(StaticComposer(false)), opts);
    assert_eq!(s.opts().behind_threshold, 5);
    assert_eq!(s.buffer_queue().query(QueryOp::Width.code()).unwrap(), 64);
    assert_eq!(s.transform_hint(), Transform::empty());

    queue.set_transform_hint(Transform::ROT_90);
    s.connect(Api::Media).unwrap();
    assert_eq!(s.transform_hint(), Transform::ROT_90);
    assert_eq!(queue.connected(), Some(Api::Media));
}

#[test]
fn failed_connect_keeps_session_disconnected() {
    let (queue, s) = session();
    queue.inject_fault(QueueCall::Connect, StatusCode::NO_INIT);
    let err = s.connect(Api::Cpu).unwrap_err();
    assert_eq!(err.status(), StatusCode::NO_INIT);
    assert_eq!(s.connection(), ConnectionState::Disconnected);
}

#[test]
fn slot_identity_is_stable_without_reallocation() {
    let (_queue, s) = session_with(InMemoryQueueOpts {
        buffer_count: 1,
        ..Default::default()
    });
    let first = s.dequeue().unwrap();
    s.cancel(first.as_ref()).unwrap();
    let second = s.dequeue().unwrap();
    assert_eq!(first.handle(), second.handle());
    assert_eq!(s.cached_buffer(0).map(|b| b.handle()), Some(first.handle()));
}

#[test]
fn reallocation_replaces_cached_identity() {
    let (_queue, s) = session_with(InMemoryQueueOpts {
        buffer_count: 1,
        ..Default::default()
    });
    let first = s.dequeue().unwrap();
    s.cancel(first.as_ref()).unwrap();
    s.set_buffers_dimensions(32, 16).unwrap();
    let second = s.dequeue().unwrap();
    assert_ne!(first.handle(), second.handle());
    assert_eq!((second.width(), second.height()), (32, 16));
    assert!(matches!(
        s.cancel(first.as_ref()),
        Err(ProducerError::Resolution(_))
    ));
}

#[test]
fn release_all_drops_every_cached_slot() {
    let (queue, s) = session();
    let a = s.dequeue().unwrap();
    s.queue(a.as_ref()).unwrap();
    assert!(s.cached_buffer(0).is_some());

    queue.release_all();
    let b = s.dequeue().unwrap();
    let slot = (0..NUM_SLOTS)
        .find(|&i| s.cached_buffer(i).is_some_and(|x| x.handle() == b.handle()))
        .unwrap();
    assert_ne!(slot, 0);
    assert!(s.cached_buffer(0).is_none());
}

const NUM_SLOTS: usize = crate::session::slot_cache::NUM_BUFFER_SLOTS;

#[test]
fn failed_dequeue_leaves_cache_untouched() {
    let (queue, s) = session();
    queue.inject_fault(QueueCall::RequestBuffer, StatusCode::NO_MEMORY);
    let err = s.dequeue().unwrap_err();
    assert_eq!(err.status(), StatusCode::NO_MEMORY);
    assert!((0..NUM_SLOTS).all(|i| s.cached_buffer(i).is_none()));
}

#[test]
fn foreign_buffers_are_rejected_without_remote_calls() {
    let (queue, s) = session();
    let _ours = s.dequeue().unwrap();
    let foreign = HeapBuffer::new(64, 64, PixelFormat::RGBA_8888, Usage::SOFTWARE);
    assert!(matches!(s.queue(&foreign), Err(ProducerError::Resolution(_))));
    assert!(matches!(s.cancel(&foreign), Err(ProducerError::Resolution(_))));
    assert!(queue.frames().is_empty());
    assert!(queue.cancelled().is_empty());
}

#[test]
fn queue_sends_clipped_crop_and_frame_parameters() {
    let (queue, s) = session();
    s.set_buffers_dimensions(80, 80).unwrap();
    s.set_crop(Some(Rect::new(0, 0, 100, 50)));
    s.set_scaling_mode(ScalingMode::ScaleCrop.code()).unwrap();
    s.set_buffers_transform(Transform::ROT_90);
    s.set_buffers_timestamp(Timestamp::At(42)).unwrap();

    let buf = s.dequeue().unwrap();
    s.queue(buf.as_ref()).unwrap();
    let frame = queue.last_frame().unwrap();
    assert_eq!(frame.handle, buf.handle());
    assert_eq!(frame.input.crop, Rect::new(0, 0, 80, 50));
    assert_eq!(frame.input.scaling_mode, ScalingMode::ScaleCrop);
    assert_eq!(frame.input.transform, Transform::ROT_90);
    assert_eq!(frame.input.timestamp, 42);
    // The stored crop is not clipped.
    assert_eq!(s.params().crop, Rect::new(0, 0, 100, 50));
}

#[test]
fn auto_timestamp_reads_the_monotonic_clock() {
    let (queue, s) = session();
    let before = crate::foundation::core::monotonic_now_ns();
    let buf = s.dequeue().unwrap();
    s.queue(buf.as_ref()).unwrap();
    assert!(queue.last_frame().unwrap().input.timestamp >= before);
}

#[test]
fn empty_crop_clears() {
    let (_queue, s) = session();
    s.set_crop(Some(Rect::new(0, 0, 10, 10)));
    s.set_crop(Some(Rect::new(5, 5, 5, 9)));
    assert_eq!(s.params().crop, Rect::EMPTY);
    s.set_crop(Some(Rect::new(0, 0, 10, 10)));
    s.set_crop(None);
    assert_eq!(s.params().crop, Rect::EMPTY);
}

#[test]
fn dimension_pairs_are_validated() {
    let (_queue, s) = session();
    for (w, h) in [(0, 0), (1, 1), (640, 480)] {
        s.set_buffers_dimensions(w, h).unwrap();
        s.set_buffers_user_dimensions(w, h).unwrap();
    }
    for (w, h) in [(0, 5), (5, 0), (-1, -1), (-1, 5), (5, -1)] {
        assert!(matches!(
            s.set_buffers_dimensions(w, h),
            Err(ProducerError::Validation(_))
        ));
        assert!(matches!(
            s.set_buffers_user_dimensions(w, h),
            Err(ProducerError::Validation(_))
        ));
    }
    assert_eq!((s.params().width, s.params().height), (640, 480));
}

#[test]
fn user_dimensions_apply_when_none_requested() {
    let (_queue, s) = session();
    s.set_buffers_user_dimensions(20, 10).unwrap();
    let buf = s.dequeue().unwrap();
    assert_eq!((buf.width(), buf.height()), (20, 10));
    assert_eq!(s.query(QueryOp::DefaultWidth).unwrap(), 20);
    assert_eq!(s.query(QueryOp::DefaultHeight).unwrap(), 10);
}

#[test]
fn scaling_mode_outside_enum_is_rejected() {
    let (_queue, s) = session();
    for bad in [-1, 3, 99] {
        assert!(matches!(
            s.set_scaling_mode(bad),
            Err(ProducerError::Validation(_))
        ));
    }
    s.set_scaling_mode(1).unwrap();
    assert_eq!(s.params().scaling_mode, ScalingMode::ScaleToWindow);
}

#[test]
fn negative_format_and_timestamp_are_rejected() {
    let (_queue, s) = session();
    assert!(s.set_buffers_format(-4).is_err());
    assert!(s.set_buffers_timestamp(Timestamp::At(-1)).is_err());
    s.set_buffers_timestamp(Timestamp::At(0)).unwrap();
    assert_eq!(s.params().timestamp, Timestamp::At(0));
}

#[test]
fn geometry_stops_at_first_rejected_value() {
    let (_queue, s) = session();
    assert!(s.set_buffers_geometry(0, 5, PixelFormat::RGB_565.0).is_err());
    assert_eq!(s.params().format, PixelFormat::UNSPECIFIED);
    s.set_buffers_geometry(8, 4, PixelFormat::RGB_565.0).unwrap();
    assert_eq!(s.params().format, PixelFormat::RGB_565);
    assert_eq!((s.params().width, s.params().height), (8, 4));
}

#[test]
fn disconnect_resets_request_parameters_and_slots() {
    let (_queue, s) = session();
    s.connect(Api::Cpu).unwrap();
    s.set_buffers_geometry(16, 16, PixelFormat::RGB_565.0).unwrap();
    s.set_buffers_user_dimensions(4, 4).unwrap();
    s.set_usage(Usage::SOFTWARE);
    s.set_crop(Some(Rect::new(0, 0, 8, 8)));
    s.set_scaling_mode(2).unwrap();
    s.set_buffers_transform(Transform::FLIP_V);
    let buf = s.dequeue().unwrap();
    s.queue(buf.as_ref()).unwrap();

    s.disconnect(Api::Cpu).unwrap();
    let p = s.params();
    assert_eq!((p.width, p.height), (0, 0));
    assert_eq!(p.format, PixelFormat::UNSPECIFIED);
    assert_eq!(p.usage, Usage::empty());
    assert_eq!(p.crop, Rect::EMPTY);
    assert_eq!(p.scaling_mode, ScalingMode::Freeze);
    assert_eq!(p.transform, Transform::empty());
    assert_eq!((p.user_width, p.user_height), (4, 4));
    assert!((0..NUM_SLOTS).all(|i| s.cached_buffer(i).is_none()));
    assert_eq!(s.connection(), ConnectionState::Disconnected);
}

#[test]
fn rejected_disconnect_still_invalidates_slots() {
    let (_queue, s) = session();
    s.connect(Api::Cpu).unwrap();
    s.set_usage(Usage::SOFTWARE);
    let buf = s.dequeue().unwrap();
    s.queue(buf.as_ref()).unwrap();

    assert!(s.disconnect(Api::Media).is_err());
    assert!((0..NUM_SLOTS).all(|i| s.cached_buffer(i).is_none()));
    assert!(s.is_connected_as(Api::Cpu));
    assert_eq!(s.params().usage, Usage::SOFTWARE);
}

#[test]
fn set_buffer_count_invalidates_on_success_only() {
    let (queue, s) = session();
    let buf = s.dequeue().unwrap();
    s.queue(buf.as_ref()).unwrap();

    queue.inject_fault(QueueCall::SetBufferCount, StatusCode::BAD_VALUE);
    assert!(s.set_buffer_count(2).is_err());
    assert!(s.cached_buffer(0).is_some());

    s.set_buffer_count(2).unwrap();
    assert!(s.cached_buffer(0).is_none());
    assert_eq!(queue.buffer_count(), 2);
}

#[test]
fn running_behind_is_refreshed_lazily() {
    let (queue, s) = session_with(InMemoryQueueOpts {
        auto_consume: false,
        ..Default::default()
    });
    for _ in 0..2 {
        let buf = s.dequeue().unwrap();
        s.queue(buf.as_ref()).unwrap();
    }
    assert!(s.consumer_running_behind());

    // Cached flag is set, so the service is asked again.
    queue.consume();
    queue.consume();
    assert_eq!(s.query(QueryOp::ConsumerRunningBehind).unwrap(), 0);
    assert!(!s.consumer_running_behind());

    // Cached flag is clear: no remote call, so the injected fault never fires.
    queue.inject_fault(QueueCall::Query, StatusCode::NO_INIT);
    assert_eq!(s.query(QueryOp::ConsumerRunningBehind).unwrap(), 0);
    assert_eq!(
        s.query(QueryOp::MinUndequeuedBuffers).unwrap_err().status(),
        StatusCode::NO_INIT
    );
}

#[test]
fn local_queries_and_pass_through() {
    let (queue, s) = session();
    assert_eq!(
        s.query(QueryOp::ConcreteType).unwrap(),
        CONCRETE_TYPE_SURFACE_TEXTURE_CLIENT
    );
    assert_eq!(s.query(QueryOp::QueuesToWindowComposer).unwrap(), 1);

    // Format is the service's until one is requested.
    assert_eq!(
        s.query(QueryOp::Format).unwrap(),
        PixelFormat::RGBA_8888.0
    );
    s.set_buffers_format(PixelFormat::RGB_565.0).unwrap();
    assert_eq!(s.query(QueryOp::Format).unwrap(), PixelFormat::RGB_565.0);

    queue.set_default_size(12, 34);
    assert_eq!(s.query(QueryOp::Width).unwrap(), 12);
    assert_eq!(s.query(QueryOp::Height).unwrap(), 34);
    assert_eq!(s.query(QueryOp::MinUndequeuedBuffers).unwrap(), 1);
    assert_eq!(
        s.query(QueryOp::Passthrough(1234)).unwrap_err().status(),
        StatusCode::BAD_VALUE
    );
}

#[test]
fn composer_answer_comes_from_the_collaborator() {
    let queue = Arc::new(InMemoryBufferQueue::default());
    let s = ProducerSession::new(queue, Arc::new(StaticComposer(false)));
    assert_eq!(s.query(QueryOp::QueuesToWindowComposer).unwrap(), 0);
}

#[test]
fn swap_interval_clamps_and_sets_synchronous_mode() {
    let (queue, s) = session();
    s.set_swap_interval(5).unwrap();
    assert!(queue.synchronous());
    s.set_swap_interval(0).unwrap();
    assert!(!queue.synchronous());
    s.set_swap_interval(-3).unwrap();
    assert!(!queue.synchronous());
}

#[test]
fn surface_opts_deserialize_with_defaults() {
    let opts: SurfaceOpts = serde_json::from_str(r#"{"behind_threshold": 3}"#).unwrap();
    assert_eq!(opts.behind_threshold, 3);
    assert_eq!(opts.max_swap_interval, 1);
}
