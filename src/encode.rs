pub mod ffmpeg;

pub use ffmpeg::{EncodeConfig, FfmpegEncoder, is_ffmpeg_on_path};
