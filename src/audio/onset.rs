use rustfft::{FftPlanner, num_complex::Complex};

/// STFT window length for the onset spectrogram.
pub const N_FFT: usize = 2048;
/// Hop between successive analysis frames, in samples.
pub const HOP_LENGTH: usize = 512;

/// Onset strength envelope: one value per hop frame.
///
/// Per frame we take the log-compressed magnitude spectrum and sum the
/// positive change against the previous frame (half-wave rectified spectral
/// flux), averaged over bins. Silence yields an all-zero envelope. The cost
/// is O(samples log n_fft); it runs once per invocation and is reused by
/// every frame's zoom query.
pub fn onset_envelope(samples: &[f32]) -> Vec<f32> {
    if samples.len() < N_FFT {
        return Vec::new();
    }

    let frames = 1 + (samples.len() - N_FFT) / HOP_LENGTH;
    let bins = N_FFT / 2 + 1;

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(N_FFT);
    let window = hann_window(N_FFT);

    let mut buf = vec![Complex::new(0.0f32, 0.0f32); N_FFT];
    let mut prev = vec![0.0f32; bins];
    let mut cur = vec![0.0f32; bins];
    let mut env = Vec::with_capacity(frames);

    for frame in 0..frames {
        let start = frame * HOP_LENGTH;
        for (i, c) in buf.iter_mut().enumerate() {
            *c = Complex::new(samples[start + i] * window[i], 0.0);
        }
        fft.process(&mut buf);

        for (bin, value) in cur.iter_mut().enumerate() {
            *value = (1.0 + buf[bin].norm()).ln();
        }

        if frame == 0 {
            env.push(0.0);
        } else {
            let mut flux = 0.0f32;
            for (c, p) in cur.iter().zip(prev.iter()) {
                flux += (c - p).max(0.0);
            }
            env.push(flux / bins as f32);
        }

        std::mem::swap(&mut prev, &mut cur);
    }

    env
}

fn hann_window(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let x = std::f32::consts::TAU * i as f32 / len as f32;
            0.5 * (1.0 - x.cos())
        })
        .collect()
}

/// Timestamp of an envelope frame at the given sample rate.
pub fn frame_to_secs(frame: usize, sample_rate: u32) -> f64 {
    (frame * HOP_LENGTH) as f64 / f64::from(sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_yields_zero_envelope() {
        let env = onset_envelope(&vec![0.0; 22_050]);
        assert!(!env.is_empty());
        assert!(env.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn short_input_yields_empty_envelope() {
        assert!(onset_envelope(&[0.0; 100]).is_empty());
        assert!(onset_envelope(&[]).is_empty());
    }

    #[test]
    fn tone_onset_spikes_the_envelope() {
        // 0.5s of silence, then a 1kHz tone: the attack frame must dominate.
        let sr = 22_050usize;
        let mut samples = vec![0.0f32; sr];
        for i in sr / 2..sr {
            let t = i as f32 / sr as f32;
            samples[i] = (std::f32::consts::TAU * 1000.0 * t).sin();
        }

        let env = onset_envelope(&samples);
        let (peak_frame, peak) = env
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();

        assert!(*peak > 0.0);
        let peak_secs = frame_to_secs(peak_frame, sr as u32);
        assert!(
            (peak_secs - 0.5).abs() < 0.1,
            "onset peak at {peak_secs}s, expected near 0.5s"
        );
    }

    #[test]
    fn frame_to_secs_uses_hop() {
        assert_eq!(frame_to_secs(0, 22_050), 0.0);
        let t = frame_to_secs(43, 22_050);
        assert!((t - 43.0 * 512.0 / 22_050.0).abs() < 1e-12);
    }
}
