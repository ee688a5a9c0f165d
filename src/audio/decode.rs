use std::path::Path;

use crate::error::{PulseError, PulseResult};

/// Sample rate used for beat analysis. Beat positions are resolved at hop
/// granularity, so a full-band rate buys nothing here.
pub const ANALYSIS_SAMPLE_RATE: u32 = 22_050;

/// Decoded mono PCM. Immutable once loaded; dropped before encoding starts.
#[derive(Clone, Debug)]
pub struct AudioTrack {
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl AudioTrack {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }
}

/// Decode an audio file to mono f32 PCM via the system `ffmpeg` binary.
///
/// We intentionally shell out to `ffmpeg` rather than link native decoder
/// libraries, so the crate builds without FFmpeg dev headers.
pub fn decode_audio_mono(path: &Path, sample_rate: u32) -> PulseResult<AudioTrack> {
    if sample_rate == 0 {
        return Err(PulseError::validation("decode sample_rate must be > 0"));
    }

    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(path)
        .args([
            "-vn",
            "-f",
            "f32le",
            "-acodec",
            "pcm_f32le",
            "-ac",
            "1",
            "-ar",
            &sample_rate.to_string(),
            "pipe:1",
        ])
        .output()
        .map_err(|e| PulseError::analysis(format!("failed to run ffmpeg for audio decode: {e}")))?;

    if !out.status.success() {
        return Err(PulseError::analysis(format!(
            "ffmpeg audio decode failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    if !out.stdout.len().is_multiple_of(4) {
        return Err(PulseError::analysis(
            "decoded audio byte length is not aligned to f32 samples",
        ));
    }

    let mut samples = Vec::<f32>::with_capacity(out.stdout.len() / 4);
    for chunk in out.stdout.chunks_exact(4) {
        samples.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }

    tracing::debug!(
        path = %path.display(),
        sample_rate,
        samples = samples.len(),
        "decoded audio track"
    );

    Ok(AudioTrack {
        sample_rate,
        samples,
    })
}
