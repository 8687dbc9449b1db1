use super::*;

fn assert_disjoint(region: &Region) {
    let rects = region.rects();
    for (i, a) in rects.iter().enumerate() {
        assert!(!a.is_empty());
        for b in rects.iter().skip(i + 1) {
            assert!(!a.intersects(*b), "{a:?} overlaps {b:?}");
        }
    }
}

#[test]
fn union_of_overlapping_rects_counts_pixels_once() {
    let mut r = Region::from_rect(Rect::new(0, 0, 10, 10));
    r.union_rect(Rect::new(5, 5, 15, 15));
    assert_disjoint(&r);
    assert_eq!(r.area(), 100 + 100 - 25);
    assert_eq!(r.bounds(), Rect::new(0, 0, 15, 15));
    assert!(r.contains_point(14, 14));
    assert!(!r.contains_point(14, 0));
}

#[test]
fn union_of_covered_rect_is_noop() {
    let mut r = Region::from_rect(Rect::new(0, 0, 10, 10));
    r.union_rect(Rect::new(2, 2, 4, 4));
    assert_eq!(r.rects().len(), 1);
    assert_eq!(r.area(), 100);
}

#[test]
fn subtract_punches_hole() {
    let mut r = Region::from_rect(Rect::new(0, 0, 10, 10));
    r.subtract_rect(Rect::new(4, 4, 6, 6));
    assert_disjoint(&r);
    assert_eq!(r.area(), 96);
    assert!(!r.contains_point(5, 5));
    assert!(r.contains_point(3, 5));
    assert_eq!(r.bounds(), Rect::new(0, 0, 10, 10));
}

#[test]
fn subtract_region_then_union_restores_pixels() {
    let full = Region::from_rect(Rect::new(0, 0, 20, 20));
    let band: Region = [Rect::new(0, 5, 20, 8), Rect::new(3, 0, 6, 20)]
        .into_iter()
        .collect();
    let mut rest = full.subtracted(&band);
    assert_disjoint(&rest);
    assert_eq!(rest.area() + band.area(), full.area());
    rest.union(&band);
    assert!(rest.same_pixels(&full));
}

#[test]
fn intersect_rect_clips_every_piece() {
    let mut r: Region = [Rect::new(0, 0, 10, 10), Rect::new(20, 0, 30, 10)]
        .into_iter()
        .collect();
    r.intersect_rect(Rect::new(5, 0, 25, 5));
    assert_eq!(r.area(), 25 + 25);
    assert_eq!(r.bounds(), Rect::new(5, 0, 25, 5));
}

#[test]
fn empty_inputs_are_ignored() {
    let mut r = Region::new();
    r.union_rect(Rect::EMPTY);
    r.union_rect(Rect::new(5, 5, 5, 9));
    assert!(r.is_empty());
    assert_eq!(r.bounds(), Rect::EMPTY);
    r.subtract_rect(Rect::new(0, 0, 1, 1));
    assert!(r.is_empty());
}
