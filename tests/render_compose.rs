use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use pulsereel::{
    BeatGrid, Canvas, Fps, RenderConfig, Timeline, ZoomParams, ZoomPulse,
    render::compose_frame,
    transcribe::{
        ModelCache, ModelSize, RecognizerLoader, SpeechRecognizer, TranscriptSegment,
        filter_segments,
    },
    visual::{base::cover_fit, caption::CaptionRenderer},
};

fn gradient_timeline(beats: Vec<f64>) -> Timeline {
    let canvas = Canvas::new(72, 128).unwrap();
    let mut img = image::RgbaImage::new(72, 128);
    for (x, y, px) in img.enumerate_pixels_mut() {
        *px = image::Rgba([(x * 3) as u8, (y * 2) as u8, 90, 255]);
    }
    Timeline {
        canvas,
        fps: Fps::new(24, 1).unwrap(),
        duration_secs: 2.0,
        base: cover_fit(&image::DynamicImage::ImageRgba8(img), canvas).unwrap(),
        zoom: ZoomPulse::new(BeatGrid::from_times(beats).unwrap(), ZoomParams::default()),
        captions: Vec::new(),
        audio_path: PathBuf::from("track.mp3"),
    }
}

#[test]
fn beat_zoom_changes_the_frame() {
    let timeline = gradient_timeline(vec![0.5]);
    // Frame 12 lands exactly on the beat; frame 0 is far outside the radius.
    let on_beat = compose_frame(&timeline, 12).unwrap();
    let off_beat = compose_frame(&timeline, 0).unwrap();
    assert_ne!(on_beat.data, off_beat.data);
}

#[test]
fn frames_outside_every_pulse_match_the_unzoomed_frame() {
    let with_beats = gradient_timeline(vec![0.5]);
    let without_beats = gradient_timeline(Vec::new());
    // t = 0 is outside the 0.1 s radius around the 0.5 s beat, so the zoom
    // curve is exactly 1.0 and the pixels must match a beatless render.
    let far = compose_frame(&with_beats, 0).unwrap();
    let plain = compose_frame(&without_beats, 0).unwrap();
    assert_eq!(far.data, plain.data);
}

#[test]
fn overlapping_captions_both_render() {
    let mut renderer = CaptionRenderer::new(None).unwrap();

    let cfg = RenderConfig::desktop();
    let canvas = Canvas::new(72, 128).unwrap();
    let mut caption_cfg = cfg.captions.clone();
    caption_cfg.font_size_px = 10.0;

    let segments = [
        TranscriptSegment {
            text: "first line".to_string(),
            start_sec: 0.0,
            end_sec: 2.0,
            no_speech_prob: 0.0,
        },
        TranscriptSegment {
            text: "second".to_string(),
            start_sec: 1.0,
            end_sec: 2.5,
            no_speech_prob: 0.0,
        },
    ];
    let overlays: Vec<_> = segments
        .iter()
        .map(|s| renderer.render_overlay(s, &caption_cfg, canvas).unwrap())
        .collect();

    let mut timeline = gradient_timeline(Vec::new());
    timeline.duration_secs = 3.0;
    timeline.captions = overlays;

    // Both segments cover t = 1.5; insertion order is preserved.
    let active: Vec<_> = timeline.active_captions(1.5).collect();
    assert_eq!(active.len(), 2);
    assert_eq!(active[0].start_sec, 0.0);
    assert_eq!(active[1].start_sec, 1.0);

    // Captioned pixels differ from the caption-free frame at the same time.
    let captioned = compose_frame(&timeline, 36).unwrap();
    let mut bare = gradient_timeline(Vec::new());
    bare.duration_secs = 3.0;
    let plain = compose_frame(&bare, 36).unwrap();
    assert_ne!(captioned.data, plain.data);

    // Outside both segments the captions leave no trace.
    let after = compose_frame(&timeline, 66).unwrap();
    let plain_after = compose_frame(&bare, 66).unwrap();
    assert_eq!(after.data, plain_after.data);
}

struct CannedRecognizer {
    segments: Vec<TranscriptSegment>,
}

impl SpeechRecognizer for CannedRecognizer {
    fn transcribe(&self, _audio_path: &Path) -> pulsereel::PulseResult<Vec<TranscriptSegment>> {
        Ok(self.segments.clone())
    }
}

struct CannedLoader;

impl RecognizerLoader for CannedLoader {
    fn load(
        &self,
        _size: ModelSize,
    ) -> pulsereel::PulseResult<Arc<dyn SpeechRecognizer>> {
        Ok(Arc::new(CannedRecognizer {
            segments: vec![
                TranscriptSegment {
                    text: "hello".to_string(),
                    start_sec: 0.0,
                    end_sec: 1.0,
                    no_speech_prob: 0.1,
                },
                TranscriptSegment {
                    text: "  ".to_string(),
                    start_sec: 1.0,
                    end_sec: 2.0,
                    no_speech_prob: 0.0,
                },
                TranscriptSegment {
                    text: "music".to_string(),
                    start_sec: 2.0,
                    end_sec: 3.0,
                    no_speech_prob: 0.9,
                },
            ],
        }))
    }
}

#[test]
fn cache_hands_out_the_same_recognizer_and_filters_apply() {
    let cache = ModelCache::new(Box::new(CannedLoader));
    let first = cache.get(ModelSize::Tiny).unwrap();
    let second = cache.get(ModelSize::Tiny).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let segments = filter_segments(first.transcribe(Path::new("track.mp3")).unwrap());
    let texts: Vec<_> = segments.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["hello"]);
}
