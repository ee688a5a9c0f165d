pub mod frame;
pub mod pipeline;

pub use frame::{FrameRGBA, compose_frame};
pub use pipeline::{ProgressStage, render, render_to_mp4};
