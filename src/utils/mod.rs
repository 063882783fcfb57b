//! Utility Module
//!
//! - [`FrameTimer`](time::FrameTimer): CPU recording time per frame

pub mod time;

pub use time::FrameTimer;
