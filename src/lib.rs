//! Keypoint detection, description and frame-to-frame matching for benchmarking
//! 2D feature trackers on camera sequences.

pub mod config;
pub mod descriptor;
pub mod detector;
pub mod error;
pub mod filter;
pub mod frame;
pub mod io;
pub mod matcher;
pub mod pipeline;
pub mod scale_space;
pub mod synthetic;
pub mod types;
pub mod visualization;

pub use config::{DatasetConfig, TrackingConfig};
pub use error::{Result, TrackingError};
