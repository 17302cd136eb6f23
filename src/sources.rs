//! Reference [BlockSource](crate::source::BlockSource) implementations.
//!
//! [RecordingSource] reads any rectangle of an electrophysiology recording directly.
//! [FrameSource] adapts a video-like stream which can only be read front to back.
mod frames;
mod recording;

pub use frames::{FrameReader, FrameSource, FrameSourceError, InMemoryFrames};
pub use recording::{RecordingError, RecordingSource};
