use feature_tracking::TrackingError;
use feature_tracking::frame::{FrameBuffer, FrameRecord};
use image::GrayImage;

fn record(index: usize) -> FrameRecord {
    FrameRecord::new(index, GrayImage::new(4, 4))
}

#[test]
fn keeps_the_most_recent_frames() {
    let mut buffer = FrameBuffer::new(2);
    assert!(buffer.push(record(0)).is_none());
    assert!(buffer.push(record(1)).is_none());
    let evicted = buffer.push(record(2)).unwrap();
    assert_eq!(evicted.index, 0);

    let held: Vec<usize> = buffer.iter().map(|f| f.index).collect();
    assert_eq!(held, vec![1, 2]);
    assert_eq!(buffer.latest().unwrap().index, 2);
    assert_eq!(buffer.previous().unwrap().index, 1);
}

#[test]
fn never_exceeds_capacity() {
    let mut buffer = FrameBuffer::new(3);
    for i in 0..20 {
        buffer.push(record(i));
        assert!(buffer.len() <= 3);
    }
    let held: Vec<usize> = buffer.iter().map(|f| f.index).collect();
    assert_eq!(held, vec![17, 18, 19]);
}

#[test]
fn underflow_reports_counts() {
    let mut buffer = FrameBuffer::new(2);
    assert!(matches!(
        buffer.latest(),
        Err(TrackingError::Underflow {
            required: 1,
            available: 0
        })
    ));
    buffer.push(record(0));
    assert!(matches!(
        buffer.previous(),
        Err(TrackingError::Underflow {
            required: 2,
            available: 1
        })
    ));
}

#[test]
fn zero_capacity_holds_one_frame() {
    let mut buffer = FrameBuffer::new(0);
    assert_eq!(buffer.capacity(), 1);
    buffer.push(record(0));
    buffer.push(record(1));
    assert_eq!(buffer.len(), 1);
    assert_eq!(buffer.latest().unwrap().index, 1);
}

#[test]
fn latest_record_is_mutable_in_place() {
    let mut buffer = FrameBuffer::new(2);
    buffer.push(record(5));
    buffer
        .latest_mut()
        .unwrap()
        .keypoints
        .push(feature_tracking::types::KeyPoint::new(1.0, 2.0, 3.0));
    assert_eq!(buffer.latest().unwrap().keypoints.len(), 1);
}
