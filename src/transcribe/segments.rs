use crate::error::{PulseError, PulseResult};

/// Segments with a no-speech probability above this are discarded.
pub const NO_SPEECH_MAX: f64 = 0.45;

/// One time-boxed transcription result. Invariant: `end_sec >= start_sec`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    pub start_sec: f64,
    pub end_sec: f64,
    #[serde(default)]
    pub no_speech_prob: f64,
}

impl TranscriptSegment {
    pub fn duration_secs(&self) -> f64 {
        self.end_sec - self.start_sec
    }

    pub fn validate(&self) -> PulseResult<()> {
        if !self.start_sec.is_finite() || !self.end_sec.is_finite() || self.start_sec < 0.0 {
            return Err(PulseError::validation(
                "segment timestamps must be finite and >= 0",
            ));
        }
        if self.end_sec < self.start_sec {
            return Err(PulseError::validation("segment end must be >= start"));
        }
        Ok(())
    }
}

/// Drop unusable segments: likely non-speech, or empty once trimmed.
/// Order is preserved; overlapping segments are kept (not deduplicated).
pub fn filter_segments(segments: Vec<TranscriptSegment>) -> Vec<TranscriptSegment> {
    segments
        .into_iter()
        .filter(|s| s.no_speech_prob <= NO_SPEECH_MAX && !s.text.trim().is_empty())
        .collect()
}
