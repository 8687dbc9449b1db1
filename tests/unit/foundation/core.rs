use super::*;

#[test]
fn rect_intersect_clips_and_collapses_to_empty() {
    let a = Rect::new(0, 0, 100, 50);
    let bounds = Rect::from_size(80, 80);
    assert_eq!(a.intersect(bounds), Rect::new(0, 0, 80, 50));
    assert_eq!(
        Rect::new(0, 0, 10, 10).intersect(Rect::new(10, 0, 20, 10)),
        Rect::EMPTY
    );
}

#[test]
fn rect_containment() {
    let outer = Rect::new(0, 0, 10, 10);
    assert!(outer.contains_rect(Rect::new(2, 2, 10, 10)));
    assert!(!outer.contains_rect(Rect::new(2, 2, 11, 10)));
    assert!(!Rect::new(2, 2, 4, 4).contains_rect(outer));
}

#[test]
fn rect_subtract_produces_disjoint_pieces_with_matching_area() {
    let outer = Rect::new(0, 0, 10, 10);
    let hole = Rect::new(3, 3, 6, 6);
    let pieces = outer.subtract(hole);
    assert_eq!(pieces.len(), 4);
    let area: u64 = pieces.iter().map(|r| r.area()).sum();
    assert_eq!(area, 100 - 9);
    for (i, a) in pieces.iter().enumerate() {
        assert!(!a.intersects(hole));
        for b in pieces.iter().skip(i + 1) {
            assert!(!a.intersects(*b));
        }
    }
}

#[test]
fn rect_subtract_covering_rect_leaves_nothing() {
    let r = Rect::new(2, 2, 4, 4);
    assert!(r.subtract(Rect::new(0, 0, 10, 10)).is_empty());
    assert_eq!(r.subtract(Rect::new(20, 20, 30, 30)).as_slice(), &[r]);
}

#[test]
fn bytes_per_pixel_known_formats_only() {
    assert_eq!(PixelFormat::RGBA_8888.bytes_per_pixel(), Some(4));
    assert_eq!(PixelFormat::RGB_888.bytes_per_pixel(), Some(3));
    assert_eq!(PixelFormat::RGB_565.bytes_per_pixel(), Some(2));
    assert_eq!(PixelFormat::UNSPECIFIED.bytes_per_pixel(), None);
    assert_eq!(PixelFormat(0x7fff).bytes_per_pixel(), None);
}

#[test]
fn scaling_mode_accepts_exactly_three_values() {
    assert_eq!(ScalingMode::try_from(0).unwrap(), ScalingMode::Freeze);
    assert_eq!(ScalingMode::try_from(1).unwrap(), ScalingMode::ScaleToWindow);
    assert_eq!(ScalingMode::try_from(2).unwrap(), ScalingMode::ScaleCrop);
    for bad in [-1, 3, 42] {
        assert!(matches!(
            ScalingMode::try_from(bad),
            Err(ProducerError::Validation(_))
        ));
    }
}

#[test]
fn timestamp_raw_sentinel_is_auto() {
    assert_eq!(Timestamp::from_raw(i64::MIN), Timestamp::Auto);
    assert_eq!(Timestamp::from_raw(42), Timestamp::At(42));
    assert_eq!(Timestamp::At(7).resolve(), 7);
    let a = Timestamp::Auto.resolve();
    let b = Timestamp::Auto.resolve();
    assert!(a >= 0 && b >= a);
}

#[test]
fn api_codes_roundtrip_and_reject_unknown() {
    for api in [Api::Egl, Api::Cpu, Api::Media, Api::Camera] {
        assert_eq!(Api::try_from(api.code()).unwrap(), api);
    }
    assert!(Api::try_from(0).is_err());
}

#[test]
fn transform_keeps_unknown_bits() {
    let t = Transform::from_bits_retain(0x80 | Transform::ROT_90.bits());
    assert!(t.contains(Transform::ROT_90));
    assert_eq!(t.bits(), 0x84);
    assert_eq!(Transform::ROT_270.bits(), 0x07);
}
