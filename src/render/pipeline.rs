use std::path::{Path, PathBuf};

use crate::{
    anim::ZoomPulse,
    audio::{
        beats::track_beats,
        decode::{ANALYSIS_SAMPLE_RATE, decode_audio_mono},
    },
    config::RenderConfig,
    encode::ffmpeg::{EncodeConfig, FfmpegEncoder},
    error::{PulseError, PulseResult},
    render::frame::compose_frame,
    timeline::Timeline,
    transcribe::{ModelCache, filter_segments, whisper_model_cache},
    visual::{
        base::{cover_fit, decode_image_file},
        caption::{CaptionOverlay, CaptionRenderer},
    },
};

/// Coarse pipeline milestones, reported in order through the progress
/// callback. Per-frame granularity is deliberately not exposed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressStage {
    /// Beat analysis finished; carries the number of detected beats.
    BeatsAnalyzed { beats: usize },
    /// The still image is cover-fit to the canvas.
    BaseComposed,
    /// Transcription and caption rasterization finished (0 when disabled).
    CaptionsReady { captions: usize },
    /// The encoder is spawned and frame streaming begins.
    EncodingStarted { total_frames: u64 },
    EncodingFinished,
}

/// Convenience entry point: shared whisper-backed model cache, no progress
/// reporting.
pub fn render(
    audio_path: &Path,
    image_path: &Path,
    cfg: &RenderConfig,
) -> PulseResult<PathBuf> {
    render_to_mp4(audio_path, image_path, cfg, whisper_model_cache(), &mut |_| {})
}

/// Run the whole pipeline: analyze beats, compose the base image, caption,
/// then stream frames to ffmpeg. Returns the written MP4 path.
///
/// Analysis buffers (decoded PCM, transcript segments) are dropped before
/// encoding starts; only the timeline is held across the frame loop.
pub fn render_to_mp4(
    audio_path: &Path,
    image_path: &Path,
    cfg: &RenderConfig,
    models: &ModelCache,
    progress: &mut dyn FnMut(ProgressStage),
) -> PulseResult<PathBuf> {
    cfg.validate()?;

    let track = decode_audio_mono(audio_path, ANALYSIS_SAMPLE_RATE)?;
    let duration_secs = track.duration_secs();
    if duration_secs <= 0.0 {
        return Err(PulseError::validation(format!(
            "audio file '{}' decoded to zero duration",
            audio_path.display()
        )));
    }

    let grid = track_beats(&track)?;
    tracing::info!(
        beats = grid.times().len(),
        duration_secs,
        "beat analysis complete"
    );
    progress(ProgressStage::BeatsAnalyzed {
        beats: grid.times().len(),
    });
    // PCM is only needed for analysis; release it before rasterization.
    drop(track);

    let img = decode_image_file(image_path)?;
    let base = cover_fit(&img, cfg.canvas)?;
    drop(img);
    progress(ProgressStage::BaseComposed);

    let captions = if cfg.captions.enabled {
        build_captions(audio_path, cfg, models)?
    } else {
        Vec::new()
    };
    progress(ProgressStage::CaptionsReady {
        captions: captions.len(),
    });

    let timeline = Timeline {
        canvas: cfg.canvas,
        fps: cfg.fps,
        duration_secs,
        base,
        zoom: ZoomPulse::new(grid, cfg.zoom),
        captions,
        audio_path: audio_path.to_path_buf(),
    };
    timeline.validate()?;

    let out_path = resolve_out_path(cfg);
    let total_frames = timeline.total_frames();
    let mut encoder = FfmpegEncoder::new(
        EncodeConfig::new(&cfg.encode, cfg.canvas, cfg.fps, audio_path, &out_path),
        [0, 0, 0, 255],
    )?;
    progress(ProgressStage::EncodingStarted { total_frames });
    tracing::info!(total_frames, out = %out_path.display(), "encoding");

    for frame in 0..total_frames {
        let rgba = compose_frame(&timeline, frame)?;
        encoder.encode_frame(&rgba)?;
    }

    let written = encoder.finish()?;
    progress(ProgressStage::EncodingFinished);
    Ok(written)
}

fn build_captions(
    audio_path: &Path,
    cfg: &RenderConfig,
    models: &ModelCache,
) -> PulseResult<Vec<CaptionOverlay>> {
    let recognizer = models.get(cfg.captions.model)?;
    let segments = filter_segments(recognizer.transcribe(audio_path)?);
    if segments.is_empty() {
        tracing::info!("no usable speech segments; rendering without captions");
        return Ok(Vec::new());
    }

    let mut renderer = CaptionRenderer::new(cfg.captions.font_path.as_deref())?;
    tracing::debug!(
        font = renderer.family_name(),
        segments = segments.len(),
        "rasterizing captions"
    );
    let mut overlays = Vec::with_capacity(segments.len());
    for segment in &segments {
        overlays.push(renderer.render_overlay(segment, &cfg.captions, cfg.canvas)?);
    }
    Ok(overlays)
}

fn resolve_out_path(cfg: &RenderConfig) -> PathBuf {
    if let Some(path) = &cfg.encode.out_path {
        return path.clone();
    }
    std::env::temp_dir().join(format!(
        "pulsereel_out_{}_{}.mp4",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0)
    ))
}
