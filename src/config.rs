use std::path::PathBuf;

use crate::{
    core::{Canvas, Fps},
    error::{PulseError, PulseResult},
    transcribe::ModelSize,
};

/// Shape of the zoom pulse applied around each beat.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct ZoomParams {
    /// Additional scale at the exact beat instant (0.12 => 12% punch-in).
    pub intensity: f64,
    /// Half-width of the pulse in seconds; scale is exactly 1.0 outside it.
    pub radius_sec: f64,
}

impl Default for ZoomParams {
    fn default() -> Self {
        Self {
            intensity: 0.12,
            radius_sec: 0.1,
        }
    }
}

impl ZoomParams {
    pub fn validate(&self) -> PulseResult<()> {
        if !self.intensity.is_finite() || self.intensity < 0.0 {
            return Err(PulseError::validation(
                "zoom intensity must be finite and >= 0",
            ));
        }
        if !self.radius_sec.is_finite() || self.radius_sec <= 0.0 {
            return Err(PulseError::validation(
                "zoom radius_sec must be finite and > 0",
            ));
        }
        Ok(())
    }
}

/// Caption styling and transcription settings.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct CaptionConfig {
    pub enabled: bool,
    pub font_size_px: f32,
    /// Fixed character-column wrap width applied before rasterization.
    pub wrap_cols: usize,
    /// Vertical anchor as a fraction of canvas height (0.75 => bottom third).
    pub anchor_frac: f64,
    /// Preferred font file; when absent or unreadable a system font is used.
    pub font_path: Option<PathBuf>,
    pub model: ModelSize,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            font_size_px: 60.0,
            wrap_cols: 30,
            anchor_frac: 0.75,
            font_path: None,
            model: ModelSize::Small,
        }
    }
}

impl CaptionConfig {
    pub fn validate(&self) -> PulseResult<()> {
        if !self.font_size_px.is_finite() || self.font_size_px <= 0.0 {
            return Err(PulseError::validation(
                "caption font_size_px must be finite and > 0",
            ));
        }
        if self.wrap_cols == 0 {
            return Err(PulseError::validation("caption wrap_cols must be >= 1"));
        }
        if !(0.0..=1.0).contains(&self.anchor_frac) {
            return Err(PulseError::validation(
                "caption anchor_frac must be within [0, 1]",
            ));
        }
        Ok(())
    }
}

/// Encoder settings handed to the system `ffmpeg` binary.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct EncodeParams {
    pub video_codec: String,
    pub audio_codec: String,
    pub preset: String,
    /// Encoder thread budget; `Some(1)` trades speed for peak memory.
    pub threads: Option<u32>,
    /// Explicit output path; a temp-dir path is generated when absent.
    pub out_path: Option<PathBuf>,
}

impl Default for EncodeParams {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            preset: "ultrafast".to_string(),
            threads: None,
            out_path: None,
        }
    }
}

/// Immutable per-invocation configuration.
///
/// Always threaded explicitly through the pipeline; concurrent invocations
/// with different presets never observe each other.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RenderConfig {
    pub canvas: Canvas,
    pub fps: Fps,
    pub zoom: ZoomParams,
    pub captions: CaptionConfig,
    pub encode: EncodeParams,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::desktop()
    }
}

impl RenderConfig {
    /// Preset for local machines: default thread budget.
    pub fn desktop() -> Self {
        Self {
            canvas: Canvas {
                width: 1080,
                height: 1920,
            },
            fps: Fps { num: 24, den: 1 },
            zoom: ZoomParams::default(),
            captions: CaptionConfig::default(),
            encode: EncodeParams::default(),
        }
    }

    /// Preset for memory-constrained hosts: single encoder thread.
    pub fn cloud() -> Self {
        let mut cfg = Self::desktop();
        cfg.encode.threads = Some(1);
        cfg
    }

    pub fn validate(&self) -> PulseResult<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(PulseError::validation("canvas width/height must be > 0"));
        }
        if !self.canvas.width.is_multiple_of(2) || !self.canvas.height.is_multiple_of(2) {
            // Encoding targets yuv420p, which requires even dimensions.
            return Err(PulseError::validation(
                "canvas width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(PulseError::validation("fps must have num>0 and den>0"));
        }
        if let Some(threads) = self.encode.threads
            && threads == 0
        {
            return Err(PulseError::validation(
                "encode threads must be >= 1 when set",
            ));
        }
        self.zoom.validate()?;
        self.captions.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_differ_only_in_thread_budget() {
        let desktop = RenderConfig::desktop();
        let cloud = RenderConfig::cloud();
        assert_eq!(desktop.encode.threads, None);
        assert_eq!(cloud.encode.threads, Some(1));
        assert_eq!(desktop.canvas, cloud.canvas);
        assert_eq!(desktop.fps, cloud.fps);
    }

    #[test]
    fn default_presets_validate() {
        RenderConfig::desktop().validate().unwrap();
        RenderConfig::cloud().validate().unwrap();
    }

    #[test]
    fn validate_rejects_odd_canvas() {
        let mut cfg = RenderConfig::desktop();
        cfg.canvas.width = 1081;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_zoom() {
        let mut cfg = RenderConfig::desktop();
        cfg.zoom.radius_sec = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = RenderConfig::desktop();
        cfg.zoom.intensity = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_captions() {
        let mut cfg = RenderConfig::desktop();
        cfg.captions.wrap_cols = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = RenderConfig::desktop();
        cfg.captions.anchor_frac = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_threads() {
        let mut cfg = RenderConfig::desktop();
        cfg.encode.threads = Some(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn config_json_roundtrip() {
        let cfg = RenderConfig::cloud();
        let s = serde_json::to_string_pretty(&cfg).unwrap();
        let de: RenderConfig = serde_json::from_str(&s).unwrap();
        assert_eq!(de.encode.threads, Some(1));
        assert_eq!(de.canvas.width, 1080);
    }
}
