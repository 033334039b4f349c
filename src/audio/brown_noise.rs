use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rodio::Source;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44_100;

/// Brown noise bed played under a meditation script.
/// Power decreases 6 dB per octave, which reads as a soft low rumble.
pub struct BrownNoise {
    last_value: f32,
    amplitude: f32,
    rng: StdRng,
}

impl BrownNoise {
    pub fn new() -> Self {
        Self::with_amplitude(0.3)
    }

    pub fn with_amplitude(amplitude: f32) -> Self {
        Self {
            last_value: 0.0,
            amplitude: amplitude.clamp(0.0, 1.0),
            rng: StdRng::from_entropy(),
        }
    }
}

impl Iterator for BrownNoise {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let white: f32 = self.rng.gen_range(-1.0..1.0);

        // Integrate white noise, clamped and decayed so it cannot drift.
        self.last_value = ((self.last_value + white * 0.02).clamp(-1.0, 1.0)) * 0.9999;

        Some(self.last_value * self.amplitude)
    }
}

impl Source for BrownNoise {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}
