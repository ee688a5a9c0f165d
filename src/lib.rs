//! Beat-synchronized short-form video generation.
//!
//! Takes an audio track plus a still image and produces a vertical MP4:
//! the image is cover-fit to the canvas, pulsed with a zoom on every
//! detected beat, optionally captioned from a speech transcript, and
//! encoded through the system `ffmpeg` binary.
//!
//! The typical entry point is [`render::render_to_mp4`]; the stages it
//! composes (beat tracking, zoom curve, caption rasterization, frame
//! compositing, encoding) are public for callers that need only part of
//! the pipeline.

#![forbid(unsafe_code)]

pub mod anim;
pub mod audio;
pub mod config;
pub mod core;
pub mod encode;
pub mod error;
pub mod render;
pub mod timeline;
pub mod transcribe;
pub mod visual;

pub use anim::ZoomPulse;
pub use audio::beats::BeatGrid;
pub use config::{CaptionConfig, EncodeParams, RenderConfig, ZoomParams};
pub use core::{Canvas, Fps};
pub use error::{PulseError, PulseResult};
pub use render::{ProgressStage, render, render_to_mp4};
pub use timeline::Timeline;
pub use transcribe::{ModelCache, ModelSize, TranscriptSegment};
