use crate::{audio::beats::BeatGrid, config::ZoomParams};

/// The per-frame animation primitive: a pure scale curve over time, driven
/// by a fixed beat grid.
///
/// `scale_at(t)` is `1 + intensity * (1 - d/radius)` when the distance `d`
/// to the nearest beat is inside the influence radius, linearly decaying
/// from full intensity at the beat to exactly `1.0` at the radius boundary,
/// and exactly `1.0` outside it (or when the grid is empty). The nearest
/// beat is found by binary search so per-frame queries stay cheap on long
/// tracks.
#[derive(Clone, Debug)]
pub struct ZoomPulse {
    grid: BeatGrid,
    params: ZoomParams,
}

impl ZoomPulse {
    pub fn new(grid: BeatGrid, params: ZoomParams) -> Self {
        Self { grid, params }
    }

    pub fn grid(&self) -> &BeatGrid {
        &self.grid
    }

    pub fn scale_at(&self, t: f64) -> f64 {
        let Some(beat) = self.grid.nearest(t) else {
            return 1.0;
        };
        let dist = (t - beat).abs();
        if dist >= self.params.radius_sec {
            return 1.0;
        }
        1.0 + self.params.intensity * (1.0 - dist / self.params.radius_sec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pulse(times: Vec<f64>, intensity: f64, radius_sec: f64) -> ZoomPulse {
        ZoomPulse::new(
            BeatGrid::from_times(times).unwrap(),
            ZoomParams {
                intensity,
                radius_sec,
            },
        )
    }

    #[test]
    fn scale_is_one_plus_intensity_on_the_beat() {
        let z = pulse(vec![1.0, 2.0], 0.1, 0.1);
        assert_eq!(z.scale_at(1.0), 1.1);
        assert_eq!(z.scale_at(2.0), 1.1);
    }

    #[test]
    fn scale_is_exactly_one_outside_the_radius() {
        let z = pulse(vec![1.0, 2.0], 0.1, 0.1);
        assert_eq!(z.scale_at(1.5), 1.0);
        assert_eq!(z.scale_at(0.0), 1.0);
        // The radius boundary itself is outside the pulse.
        assert_eq!(z.scale_at(1.1), 1.0);
    }

    #[test]
    fn scale_decays_linearly_within_the_radius() {
        let z = pulse(vec![1.0], 0.1, 0.1);
        assert!((z.scale_at(1.05) - 1.05).abs() < 1e-12);
        assert!((z.scale_at(1.025) - 1.075).abs() < 1e-12);

        // Non-increasing as distance grows.
        let mut last = z.scale_at(1.0);
        let mut t = 1.0;
        while t <= 1.12 {
            let s = z.scale_at(t);
            assert!(s <= last + 1e-12);
            last = s;
            t += 0.005;
        }
    }

    #[test]
    fn empty_grid_never_zooms() {
        let z = ZoomPulse::new(BeatGrid::empty(), ZoomParams::default());
        for t in [0.0, 0.5, 10.0] {
            assert_eq!(z.scale_at(t), 1.0);
        }
    }

    #[test]
    fn curve_is_symmetric_around_a_beat() {
        let z = pulse(vec![5.0], 0.08, 0.1);
        for d in [0.01, 0.03, 0.07, 0.099] {
            let before = z.scale_at(5.0 - d);
            let after = z.scale_at(5.0 + d);
            assert!((before - after).abs() < 1e-12);
        }
    }
}
