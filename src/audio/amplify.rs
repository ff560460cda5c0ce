use crate::config::RenderConfig;

use super::extract::FeatureVector;

/// Lower bound for the adaptive gain; keeps loud passages from being
/// flattened all the way down to the target level.
const MIN_GAIN: f32 = 0.5;

/// Running gain state. Owned by exactly one pipeline or session; the EMA
/// is order-dependent, so vectors must be processed in frame order.
#[derive(Debug, Clone)]
pub struct AmplifierState {
    ema_max: Vec<f32>,
    amplitude_ema_max: f32,
    seeded: bool,
}

/// Rescales feature vectors against recent history so quiet passages
/// stay visible without clipping loud ones.
///
/// Per band: `ema_max = max(observed, ema_max * decay)` and
/// `gain = clamp(target_level / max(ema_max, amp_floor), MIN_GAIN, amp_ceiling)`.
/// The first vector seeds the history and passes through at unity gain,
/// so a session never opens with an amplification spike.
#[derive(Debug)]
pub struct AdaptiveAmplifier {
    state: AmplifierState,
    decay: f32,
    floor: f32,
    ceiling: f32,
    target_level: f32,
}

impl AdaptiveAmplifier {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            state: AmplifierState {
                ema_max: vec![0.0; config.band_count],
                amplitude_ema_max: 0.0,
                seeded: false,
            },
            decay: config.amp_decay,
            floor: config.amp_floor,
            ceiling: config.amp_ceiling,
            target_level: config.target_level,
        }
    }

    /// Applies adaptive gain in place. Strictly sequential: one call per
    /// frame, in frame order.
    pub fn process(&mut self, features: &mut FeatureVector) {
        debug_assert_eq!(features.bands.len(), self.state.ema_max.len());

        if !self.state.seeded {
            self.state.ema_max.copy_from_slice(&features.bands);
            self.state.amplitude_ema_max = features.amplitude;
            self.state.seeded = true;
            return;
        }

        for (band, ema) in features.bands.iter_mut().zip(self.state.ema_max.iter_mut()) {
            *ema = band.max(*ema * self.decay);
            *band *= Self::gain_for(self.target_level, self.floor, self.ceiling, *ema);
        }

        let ema = &mut self.state.amplitude_ema_max;
        *ema = features.amplitude.max(*ema * self.decay);
        features.amplitude *= Self::gain_for(self.target_level, self.floor, self.ceiling, *ema);
    }

    fn gain_for(target_level: f32, floor: f32, ceiling: f32, ema_max: f32) -> f32 {
        (target_level / ema_max.max(floor)).clamp(MIN_GAIN, ceiling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amplifier(band_count: usize) -> AdaptiveAmplifier {
        let mut config = RenderConfig::default();
        config.band_count = band_count;
        AdaptiveAmplifier::new(&config)
    }

    fn vector(frame_index: u64, bands: &[f32], amplitude: f32) -> FeatureVector {
        FeatureVector {
            frame_index,
            bands: bands.to_vec(),
            amplitude,
        }
    }

    #[test]
    fn first_frame_passes_through_at_unity_gain() {
        let mut amp = amplifier(3);
        let mut features = vector(0, &[0.01, 0.6, 2.0], 0.4);
        let original = features.clone();
        amp.process(&mut features);
        assert_eq!(features, original);
    }

    #[test]
    fn constant_signal_converges_to_target_level() {
        let mut amp = amplifier(2);
        let target = RenderConfig::default().target_level;

        let mut last = vector(0, &[0.3, 0.3], 0.3);
        amp.process(&mut last);
        for frame in 1..10 {
            let mut features = vector(frame, &[0.3, 0.3], 0.3);
            amp.process(&mut features);
            last = features;
        }

        for &band in &last.bands {
            assert!((band - target).abs() < 0.01, "band {} vs target {}", band, target);
        }
        assert!((last.amplitude - target).abs() < 0.01);
    }

    #[test]
    fn quiet_bands_are_boosted_up_to_the_ceiling() {
        let config = RenderConfig::default();
        let mut amp = amplifier(1);

        let mut seed = vector(0, &[0.01], 0.01);
        amp.process(&mut seed);

        let mut features = vector(1, &[0.01], 0.01);
        amp.process(&mut features);

        // target/floor exceeds the ceiling, so the gain clamps there.
        let expected = 0.01 * config.amp_ceiling;
        assert!((features.bands[0] - expected).abs() < 1e-6);
    }

    #[test]
    fn loud_bands_are_attenuated_no_further_than_min_gain() {
        let mut amp = amplifier(1);

        let mut seed = vector(0, &[3.0], 3.0);
        amp.process(&mut seed);

        let mut features = vector(1, &[3.0], 3.0);
        amp.process(&mut features);

        assert!((features.bands[0] - 3.0 * MIN_GAIN).abs() < 1e-6);
    }

    #[test]
    fn gain_recovers_as_the_peak_estimate_decays() {
        let mut amp = amplifier(1);

        let mut seed = vector(0, &[1.0], 1.0);
        amp.process(&mut seed);

        // A loud burst, then silence-adjacent input: as ema_max decays,
        // the applied gain grows frame over frame.
        let mut previous = 0.0;
        for frame in 1..40 {
            let mut features = vector(frame, &[0.05], 0.05);
            amp.process(&mut features);
            assert!(features.bands[0] >= previous);
            previous = features.bands[0];
        }
        assert!(previous > 0.05);
    }
}
