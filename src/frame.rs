use image::GrayImage;
use std::collections::VecDeque;

use crate::error::{Result, TrackingError};
use crate::types::{Descriptors, KeyPoint, Match};

/// Everything known about one camera frame.
///
/// Keypoints, descriptors and matches are attached in place as the pipeline stages finish.
#[derive(Debug, Clone)]
pub struct FrameRecord {
    pub index: usize,
    pub image: GrayImage,
    pub keypoints: Vec<KeyPoint>,
    pub descriptors: Option<Descriptors>,
    /// Matches against the previous frame; query indices refer to the previous frame.
    pub matches: Vec<Match>,
}

impl FrameRecord {
    pub fn new(index: usize, image: GrayImage) -> FrameRecord {
        FrameRecord {
            index,
            image,
            keypoints: Vec::new(),
            descriptors: None,
            matches: Vec::new(),
        }
    }
}

/// Fixed-capacity FIFO of the most recent frames.
pub struct FrameBuffer {
    frames: VecDeque<FrameRecord>,
    capacity: usize,
}

impl FrameBuffer {
    pub fn new(capacity: usize) -> FrameBuffer {
        let capacity = capacity.max(1);
        FrameBuffer {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends `frame`, evicting and returning the oldest record when the buffer is full.
    pub fn push(&mut self, frame: FrameRecord) -> Option<FrameRecord> {
        let evicted = if self.frames.len() == self.capacity {
            self.frames.pop_front()
        } else {
            None
        };
        self.frames.push_back(frame);
        evicted
    }

    pub fn latest(&self) -> Result<&FrameRecord> {
        self.nth_from_back(0)
    }

    pub fn latest_mut(&mut self) -> Result<&mut FrameRecord> {
        let available = self.frames.len();
        self.frames
            .back_mut()
            .ok_or(TrackingError::Underflow {
                required: 1,
                available,
            })
    }

    pub fn previous(&self) -> Result<&FrameRecord> {
        self.nth_from_back(1)
    }

    fn nth_from_back(&self, n: usize) -> Result<&FrameRecord> {
        let available = self.frames.len();
        if available <= n {
            return Err(TrackingError::Underflow {
                required: n + 1,
                available,
            });
        }
        Ok(&self.frames[available - 1 - n])
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &FrameRecord> {
        self.frames.iter()
    }
}
