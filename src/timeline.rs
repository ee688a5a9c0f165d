use std::path::PathBuf;

use crate::{
    anim::ZoomPulse,
    core::{Canvas, Fps},
    error::{PulseError, PulseResult},
    visual::{base::BaseLayer, caption::CaptionOverlay},
};

/// The fully-resolved composition: everything frame rendering needs, with
/// all analysis and rasterization already done. Frames are a pure function
/// of `(timeline, frame_index)`.
#[derive(Clone)]
pub struct Timeline {
    pub canvas: Canvas,
    pub fps: Fps,
    pub duration_secs: f64,
    pub base: BaseLayer,
    pub zoom: ZoomPulse,
    /// Overlays in insertion (transcript) order; later entries draw on top.
    pub captions: Vec<CaptionOverlay>,
    /// Original audio file, muxed into the output unmodified.
    pub audio_path: PathBuf,
}

impl Timeline {
    /// A partial trailing frame still gets rendered.
    pub fn total_frames(&self) -> u64 {
        self.fps.secs_to_frames_ceil(self.duration_secs)
    }

    pub fn frame_time_secs(&self, frame: u64) -> f64 {
        self.fps.frames_to_secs(frame)
    }

    /// Captions visible at `t`, in insertion order.
    pub fn active_captions(&self, t: f64) -> impl Iterator<Item = &CaptionOverlay> {
        self.captions.iter().filter(move |c| c.active_at(t))
    }

    pub fn validate(&self) -> PulseResult<()> {
        if !self.duration_secs.is_finite() || self.duration_secs <= 0.0 {
            return Err(PulseError::validation(
                "timeline duration must be finite and > 0",
            ));
        }
        if self.base.canvas != self.canvas {
            return Err(PulseError::validation(
                "base layer dimensions must match the canvas",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::beats::BeatGrid,
        config::ZoomParams,
        visual::base::cover_fit,
    };

    fn timeline(duration_secs: f64) -> Timeline {
        let canvas = Canvas::new(72, 128).unwrap();
        let img = image::DynamicImage::new_rgba8(72, 128);
        Timeline {
            canvas,
            fps: Fps::new(24, 1).unwrap(),
            duration_secs,
            base: cover_fit(&img, canvas).unwrap(),
            zoom: ZoomPulse::new(BeatGrid::empty(), ZoomParams::default()),
            captions: Vec::new(),
            audio_path: PathBuf::from("track.mp3"),
        }
    }

    #[test]
    fn total_frames_rounds_up() {
        assert_eq!(timeline(2.0).total_frames(), 48);
        assert_eq!(timeline(2.01).total_frames(), 49);
    }

    #[test]
    fn frame_times_follow_fps() {
        let t = timeline(1.0);
        assert_eq!(t.frame_time_secs(0), 0.0);
        assert!((t.frame_time_secs(12) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn validate_rejects_non_positive_duration() {
        assert!(timeline(0.0).validate().is_err());
        assert!(timeline(f64::NAN).validate().is_err());
        assert!(timeline(1.0).validate().is_ok());
    }
}
