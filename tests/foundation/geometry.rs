//! Integration tests for geometry primitives

use sightline_foundation::{ErrorKind, Point, Polygon, Rect, Segment};

// =============================================================================
// Segments
// =============================================================================

#[test]
fn crossing_segments_intersect() {
    let a = Segment::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0));
    let b = Segment::new(Point::new(0.0, 10.0), Point::new(10.0, 0.0));
    assert!(a.intersects(&b));
    assert!(b.intersects(&a));
}

#[test]
fn parallel_segments_do_not_intersect() {
    let a = Segment::new(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
    let b = Segment::new(Point::new(0.0, 1.0), Point::new(10.0, 1.0));
    assert!(!a.intersects(&b));
}

#[test]
fn collinear_overlap_counts() {
    let a = Segment::new(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
    let b = Segment::new(Point::new(5.0, 0.0), Point::new(15.0, 0.0));
    assert!(a.intersects(&b));
}

// =============================================================================
// Rectangles and polygons
// =============================================================================

#[test]
fn rect_center_and_containment() {
    let r = Rect::centered(Point::new(50.0, 50.0), 100.0, 100.0);
    assert_eq!(r.center(), Point::new(50.0, 50.0));
    assert!(r.contains(Point::new(10.0, 90.0)));
    assert!(!r.contains(Point::new(150.0, 50.0)));
}

#[test]
fn rect_blocks_segment_through_it() {
    let r = Rect::new(40.0, -10.0, 20.0, 20.0);
    let through = Segment::new(Point::new(0.0, 0.0), Point::new(100.0, 0.0));
    let past = Segment::new(Point::new(0.0, 50.0), Point::new(100.0, 50.0));
    assert!(r.intersects_segment(&through));
    assert!(!r.intersects_segment(&past));
}

#[test]
fn polygon_contains_even_odd() {
    let square = Polygon::from_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
    assert!(square.contains(Point::new(5.0, 5.0)).unwrap());
    assert!(!square.contains(Point::new(15.0, 5.0)).unwrap());
}

#[test]
fn degenerate_polygon_is_an_error() {
    let line = Polygon::new(vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)]);
    let err = line.contains(Point::new(0.5, 0.5)).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidGeometry(_)));
}
