use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, OnceLock},
};

use anyhow::Context as _;

use crate::{
    error::{PulseError, PulseResult},
    transcribe::segments::TranscriptSegment,
};

/// Speech model size selector. Larger models are slower and more accurate.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ModelSize {
    Tiny,
    Small,
    Medium,
}

impl ModelSize {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelSize::Tiny => "tiny",
            ModelSize::Small => "small",
            ModelSize::Medium => "medium",
        }
    }
}

impl std::fmt::Display for ModelSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The speech-to-text seam. Implementations return raw segments in timeline
/// order; filtering is the caller's concern.
pub trait SpeechRecognizer: Send + Sync {
    fn transcribe(&self, audio_path: &Path) -> PulseResult<Vec<TranscriptSegment>>;
}

/// Builds a recognizer for a model size. Split from [`SpeechRecognizer`] so
/// the cache can count loads and tests can substitute both sides.
pub trait RecognizerLoader: Send + Sync {
    fn load(&self, size: ModelSize) -> PulseResult<Arc<dyn SpeechRecognizer>>;
}

/// Process-wide memoization of loaded recognizers, keyed by model size.
///
/// Populated lazily on first use, never invalidated within a session.
/// Population is Mutex-guarded so concurrent invocations cannot load the
/// same size twice.
pub struct ModelCache {
    loader: Box<dyn RecognizerLoader>,
    loaded: Mutex<HashMap<ModelSize, Arc<dyn SpeechRecognizer>>>,
}

impl ModelCache {
    pub fn new(loader: Box<dyn RecognizerLoader>) -> Self {
        Self {
            loader,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the recognizer for `size`, loading it on first request.
    pub fn get(&self, size: ModelSize) -> PulseResult<Arc<dyn SpeechRecognizer>> {
        let mut loaded = self
            .loaded
            .lock()
            .map_err(|_| PulseError::transcription("model cache lock poisoned"))?;
        if let Some(recognizer) = loaded.get(&size) {
            return Ok(recognizer.clone());
        }

        tracing::info!(model = %size, "loading speech model");
        let recognizer = self.loader.load(size)?;
        loaded.insert(size, recognizer.clone());
        Ok(recognizer)
    }
}

/// Shared default cache backed by the `whisper` CLI.
pub fn whisper_model_cache() -> &'static ModelCache {
    static CACHE: OnceLock<ModelCache> = OnceLock::new();
    CACHE.get_or_init(|| ModelCache::new(Box::new(WhisperCliLoader::default())))
}

/// Loader that validates the `whisper` binary once per size and hands out
/// CLI-backed recognizers.
#[derive(Clone, Debug)]
pub struct WhisperCliLoader {
    pub binary: PathBuf,
}

impl Default for WhisperCliLoader {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("whisper"),
        }
    }
}

impl RecognizerLoader for WhisperCliLoader {
    fn load(&self, size: ModelSize) -> PulseResult<Arc<dyn SpeechRecognizer>> {
        let ok = std::process::Command::new(&self.binary)
            .arg("--help")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        if !ok {
            return Err(PulseError::transcription(format!(
                "speech recognizer '{}' was not found on PATH",
                self.binary.display()
            )));
        }

        Ok(Arc::new(WhisperCli {
            binary: self.binary.clone(),
            size,
        }))
    }
}

/// Recognizer that shells out to the openai-whisper CLI and parses its JSON
/// output. Kept out-of-process for the same reason encoding shells out to
/// `ffmpeg`: no native inference libraries to link.
struct WhisperCli {
    binary: PathBuf,
    size: ModelSize,
}

impl SpeechRecognizer for WhisperCli {
    fn transcribe(&self, audio_path: &Path) -> PulseResult<Vec<TranscriptSegment>> {
        let out_dir = std::env::temp_dir().join(format!(
            "pulsereel_whisper_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0)
        ));
        std::fs::create_dir_all(&out_dir)
            .with_context(|| format!("create transcription dir '{}'", out_dir.display()))?;
        let _guard = TempDirGuard(out_dir.clone());

        tracing::info!(model = %self.size, path = %audio_path.display(), "transcribing");
        let out = std::process::Command::new(&self.binary)
            .arg(audio_path)
            .args(["--model", self.size.as_str()])
            .args(["--output_format", "json"])
            .arg("--output_dir")
            .arg(&out_dir)
            .args(["--fp16", "False", "--verbose", "False"])
            .output()
            .map_err(|e| PulseError::transcription(format!("failed to run whisper: {e}")))?;

        if !out.status.success() {
            return Err(PulseError::transcription(format!(
                "whisper failed for '{}': {}",
                audio_path.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        let stem = audio_path
            .file_stem()
            .ok_or_else(|| PulseError::transcription("audio path has no file stem"))?;
        let json_path = out_dir.join(stem).with_extension("json");
        let bytes = std::fs::read(&json_path)
            .with_context(|| format!("read whisper output '{}'", json_path.display()))?;

        parse_whisper_json(&bytes)
    }
}

#[derive(serde::Deserialize)]
struct WhisperJson {
    #[serde(default)]
    segments: Vec<WhisperJsonSegment>,
}

#[derive(serde::Deserialize)]
struct WhisperJsonSegment {
    start: f64,
    end: f64,
    text: String,
    #[serde(default)]
    no_speech_prob: f64,
}

fn parse_whisper_json(bytes: &[u8]) -> PulseResult<Vec<TranscriptSegment>> {
    let parsed: WhisperJson = serde_json::from_slice(bytes)
        .map_err(|e| PulseError::transcription(format!("whisper json parse failed: {e}")))?;

    let segments: Vec<TranscriptSegment> = parsed
        .segments
        .into_iter()
        .map(|s| TranscriptSegment {
            text: s.text,
            start_sec: s.start,
            end_sec: s.end,
            no_speech_prob: s.no_speech_prob,
        })
        .collect();

    for s in &segments {
        s.validate()?;
    }
    Ok(segments)
}

struct TempDirGuard(PathBuf);

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct NullRecognizer;

    impl SpeechRecognizer for NullRecognizer {
        fn transcribe(&self, _audio_path: &Path) -> PulseResult<Vec<TranscriptSegment>> {
            Ok(Vec::new())
        }
    }

    struct CountingLoader {
        loads: Arc<AtomicUsize>,
    }

    impl RecognizerLoader for CountingLoader {
        fn load(&self, _size: ModelSize) -> PulseResult<Arc<dyn SpeechRecognizer>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(NullRecognizer))
        }
    }

    #[test]
    fn cache_loads_each_size_exactly_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        let cache = ModelCache::new(Box::new(CountingLoader {
            loads: loads.clone(),
        }));

        cache.get(ModelSize::Small).unwrap();
        cache.get(ModelSize::Small).unwrap();
        cache.get(ModelSize::Small).unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        cache.get(ModelSize::Tiny).unwrap();
        cache.get(ModelSize::Tiny).unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn parse_whisper_json_maps_segments() {
        let raw = br#"{
            "text": " hello world",
            "segments": [
                {"id": 0, "seek": 0, "start": 0.0, "end": 2.5,
                 "text": " hello", "no_speech_prob": 0.01},
                {"id": 1, "seek": 0, "start": 2.5, "end": 4.0,
                 "text": " world"}
            ],
            "language": "en"
        }"#;

        let segments = parse_whisper_json(raw).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, " hello");
        assert!((segments[0].no_speech_prob - 0.01).abs() < 1e-12);
        assert_eq!(segments[1].no_speech_prob, 0.0);
        assert!((segments[1].duration_secs() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn parse_whisper_json_rejects_garbage() {
        assert!(parse_whisper_json(b"not json").is_err());
    }

    #[test]
    fn parse_whisper_json_rejects_inverted_segment() {
        let raw = br#"{"segments": [{"start": 3.0, "end": 1.0, "text": "x"}]}"#;
        assert!(parse_whisper_json(raw).is_err());
    }

    #[test]
    fn model_size_round_trips_through_serde() {
        let s = serde_json::to_string(&ModelSize::Medium).unwrap();
        assert_eq!(s, "\"medium\"");
        let de: ModelSize = serde_json::from_str("\"tiny\"").unwrap();
        assert_eq!(de, ModelSize::Tiny);
    }
}
