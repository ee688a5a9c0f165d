use crate::{
    audio::decode::AudioTrack,
    audio::onset::{HOP_LENGTH, frame_to_secs, onset_envelope},
    error::{PulseError, PulseResult},
};

const MIN_BPM: f64 = 30.0;
const MAX_BPM: f64 = 300.0;
/// Center of the log-normal tempo prior, matching common beat trackers.
const TEMPO_PRIOR_BPM: f64 = 120.0;
/// Spacing-regularity weight in the dynamic-programming pass.
const TIGHTNESS: f64 = 100.0;

/// Ordered beat timestamps in seconds. May be empty: silent or arrhythmic
/// audio is a valid input, not an error.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BeatGrid {
    times: Vec<f64>,
}

impl BeatGrid {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wrap a timestamp sequence; must be non-decreasing and non-negative.
    pub fn from_times(times: Vec<f64>) -> PulseResult<Self> {
        for pair in times.windows(2) {
            if pair[1] < pair[0] {
                return Err(PulseError::validation(
                    "beat timestamps must be non-decreasing",
                ));
            }
        }
        if times.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(PulseError::validation(
                "beat timestamps must be finite and >= 0",
            ));
        }
        Ok(Self { times })
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Nearest beat to `t` by absolute distance, via binary search.
    ///
    /// An exact tie between two neighbors picks the earlier beat; the scale
    /// at equal distance is identical either way, so the tie-break is not
    /// observable downstream.
    pub fn nearest(&self, t: f64) -> Option<f64> {
        if self.times.is_empty() {
            return None;
        }
        let idx = self.times.partition_point(|b| *b < t);
        let after = self.times.get(idx).copied();
        let before = if idx > 0 {
            Some(self.times[idx - 1])
        } else {
            None
        };
        match (before, after) {
            (Some(b), Some(a)) => {
                if (t - b).abs() <= (a - t).abs() {
                    Some(b)
                } else {
                    Some(a)
                }
            }
            (Some(b), None) => Some(b),
            (None, Some(a)) => Some(a),
            (None, None) => None,
        }
    }
}

/// Detect beats in a decoded track.
///
/// Onset strength envelope, then a tempo estimate (autocorrelation with a
/// log-normal prior around 120 BPM), then a dynamic-programming pass that
/// trades onset strength against spacing regularity. Runs once per
/// invocation; every rendered frame reuses the resulting grid.
pub fn track_beats(track: &AudioTrack) -> PulseResult<BeatGrid> {
    if track.sample_rate == 0 {
        return Err(PulseError::analysis("audio track has zero sample rate"));
    }

    let env = onset_envelope(&track.samples);
    let peak = env.iter().cloned().fold(0.0f32, f32::max);
    if env.is_empty() || peak <= f32::EPSILON {
        tracing::debug!("no onset energy; returning empty beat grid");
        return Ok(BeatGrid::empty());
    }

    // Normalize so TIGHTNESS has a stable meaning across loudness levels.
    let env: Vec<f64> = env.iter().map(|v| f64::from(*v / peak)).collect();

    let frame_rate = f64::from(track.sample_rate) / HOP_LENGTH as f64;
    let Some(period) = estimate_period(&env, frame_rate) else {
        tracing::debug!("no dominant tempo; returning empty beat grid");
        return Ok(BeatGrid::empty());
    };

    let beat_frames = pick_beats(&env, period);
    let times = beat_frames
        .into_iter()
        .map(|f| frame_to_secs(f, track.sample_rate))
        .collect::<Vec<_>>();

    tracing::info!(
        beats = times.len(),
        bpm = 60.0 * frame_rate / period as f64,
        "beat tracking complete"
    );
    BeatGrid::from_times(times)
}

/// Dominant inter-beat period in envelope frames.
fn estimate_period(env: &[f64], frame_rate: f64) -> Option<usize> {
    let min_lag = ((frame_rate * 60.0 / MAX_BPM).floor() as usize).max(1);
    let max_lag = (frame_rate * 60.0 / MIN_BPM).ceil() as usize;
    if env.len() <= min_lag + 1 {
        return None;
    }
    let max_lag = max_lag.min(env.len() - 1);

    let mut best: Option<(usize, f64)> = None;
    for lag in min_lag..=max_lag {
        let mut acf = 0.0;
        for i in 0..env.len() - lag {
            acf += env[i] * env[i + lag];
        }

        let bpm = 60.0 * frame_rate / lag as f64;
        let octave = (bpm / TEMPO_PRIOR_BPM).log2();
        let prior = (-0.5 * (octave / 1.0).powi(2)).exp();
        let weighted = acf * prior;

        match best {
            Some((_, score)) if weighted <= score => {}
            _ => best = Some((lag, weighted)),
        }
    }

    best.and_then(|(lag, score)| if score > 0.0 { Some(lag) } else { None })
}

/// Dynamic-programming beat picker over the onset envelope.
///
/// `score[i] = env[i] + max_j (score[j] - TIGHTNESS * ln((i-j)/period)^2)`
/// for `j` within half to double the period behind `i`; backtracking from
/// the best-scoring frame yields the beat sequence.
fn pick_beats(env: &[f64], period: usize) -> Vec<usize> {
    let n = env.len();
    let lo = (period / 2).max(1);
    let hi = period * 2;

    let mut score = env.to_vec();
    let mut backlink = vec![None::<usize>; n];

    for i in 0..n {
        let from = i.saturating_sub(hi);
        let to = i.saturating_sub(lo);
        let mut best: Option<(usize, f64)> = None;
        for j in from..=to {
            if j >= i {
                break;
            }
            let spacing = ((i - j) as f64 / period as f64).ln();
            let candidate = score[j] - TIGHTNESS * spacing * spacing;
            match best {
                Some((_, s)) if candidate <= s => {}
                _ => best = Some((j, candidate)),
            }
        }
        if let Some((j, s)) = best
            && s > 0.0
        {
            score[i] += s;
            backlink[i] = Some(j);
        }
    }

    let Some(mut cursor) = (0..n).max_by(|a, b| score[*a].total_cmp(&score[*b])) else {
        return Vec::new();
    };

    let mut beats = vec![cursor];
    while let Some(prev) = backlink[cursor] {
        beats.push(prev);
        cursor = prev;
    }
    beats.reverse();
    beats
}
