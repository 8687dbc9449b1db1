use super::*;
use crate::foundation::core::PixelFormat;
use crate::foundation::error::StatusCode;
use crate::queue::memory::HeapBuffer;

fn plane(stride_px: usize, height: usize) -> Plane {
    Plane {
        stride_px,
        height,
        bpp: 1,
    }
}

#[test]
fn blit_honours_each_stride() {
    let src: Vec<u8> = (0..24).collect(); // 6 wide, 4 tall
    let mut dst = vec![0u8; 4 * 4];
    blit_rect(&mut dst, plane(4, 4), &src, plane(6, 4), Rect::new(1, 1, 3, 3)).unwrap();
    assert_eq!(
        dst,
        vec![
            0, 0, 0, 0, //
            0, 7, 8, 0, //
            0, 13, 14, 0, //
            0, 0, 0, 0,
        ]
    );
}

#[test]
fn tightly_packed_rows_copy_in_one_go() {
    let src: Vec<u8> = (0..8).collect();
    let mut dst = vec![0u8; 8];
    blit_rect(&mut dst, plane(4, 2), &src, plane(4, 2), Rect::new(0, 0, 4, 2)).unwrap();
    assert_eq!(dst, src);
}

#[test]
fn blit_outside_mapping_is_a_mapping_error() {
    let src = vec![0u8; 16];
    let mut dst = vec![0u8; 16];
    let err = blit_rect(&mut dst, plane(4, 4), &src, plane(4, 4), Rect::new(2, 3, 6, 5));
    assert!(matches!(err, Err(ProducerError::Mapping(_))));
    let err = blit_rect(&mut dst, plane(4, 4), &src, plane(4, 4), Rect::new(-1, 0, 2, 2));
    assert!(matches!(err, Err(ProducerError::Mapping(_))));
}

fn paint(buf: &HeapBuffer, value: u8) {
    let mut map = buf.lock(Usage::SW_WRITE_OFTEN, buf.bounds()).unwrap();
    map.bytes_mut().fill(value);
}

#[test]
fn copy_blt_copies_region_and_unmaps_both_buffers() {
    let src = HeapBuffer::new(8, 8, PixelFormat::RGBA_8888, Usage::SOFTWARE);
    let dst = HeapBuffer::new(8, 8, PixelFormat::RGBA_8888, Usage::SOFTWARE);
    paint(&src, 9);

    let mut region = Region::from_rect(Rect::new(0, 0, 8, 2));
    region.union_rect(Rect::new(6, 2, 8, 8));
    copy_blt(&dst, &src, &region).unwrap();

    assert_eq!(dst.pixel(7, 7), Some(vec![9; 4]));
    assert_eq!(dst.pixel(0, 1), Some(vec![9; 4]));
    assert_eq!(dst.pixel(0, 2), Some(vec![0; 4]));
    assert_eq!(dst.pixel(5, 7), Some(vec![0; 4]));

    let (usage, bounds) = dst.lock_history()[0];
    assert_eq!(usage, Usage::SW_WRITE_OFTEN);
    assert_eq!(bounds, Rect::new(0, 0, 8, 8));
    assert_eq!(src.lock_history().last().map(|l| l.0), Some(Usage::SW_READ_OFTEN));
}

#[test]
fn copy_blt_releases_source_when_destination_is_busy() {
    let src = HeapBuffer::new(4, 4, PixelFormat::RGBA_8888, Usage::SOFTWARE);
    let dst = HeapBuffer::new(4, 4, PixelFormat::RGBA_8888, Usage::SOFTWARE);
    let held = dst.lock(Usage::SW_WRITE_OFTEN, dst.bounds()).unwrap();

    let err = copy_blt(&dst, &src, &Region::from_rect(Rect::new(0, 0, 2, 2))).unwrap_err();
    assert_eq!(err.status(), StatusCode::BUSY);
    drop(held);
    // Source mapping was returned.
    assert!(src.pixel(0, 0).is_some());
}

#[test]
fn empty_region_maps_nothing() {
    let src = HeapBuffer::new(4, 4, PixelFormat::RGBA_8888, Usage::SOFTWARE);
    let dst = HeapBuffer::new(4, 4, PixelFormat::RGBA_8888, Usage::SOFTWARE);
    copy_blt(&dst, &src, &Region::new()).unwrap();
    assert!(src.lock_history().is_empty());
    assert!(dst.lock_history().is_empty());
}
