use gstreamer as gst;
use gstreamer::prelude::*;

/// Generates the "psychedelic" S16 waveform fed into appsrc.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveGenerator {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    num_samples: u64,
    sample_rate: u32,
}

impl WaveGenerator {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            a: 0.0,
            b: 1.0,
            c: 0.0,
            d: 1.0,
            num_samples: 0,
            sample_rate,
        }
    }

    /// Samples produced so far.
    pub fn num_samples(&self) -> u64 {
        self.num_samples
    }

    /// Timestamp of the next chunk.
    pub fn pts(&self) -> Option<gst::ClockTime> {
        gst::ClockTime::SECOND.mul_div_floor(self.num_samples, u64::from(self.sample_rate))
    }

    pub fn duration(&self, samples: usize) -> Option<gst::ClockTime> {
        gst::ClockTime::SECOND.mul_div_floor(samples as u64, u64::from(self.sample_rate))
    }

    /// Fills one chunk. The carrier frequency drifts once per chunk.
    pub fn fill(&mut self, samples: &mut [i16]) {
        self.c += self.d;
        self.d -= self.c / 1000.0;
        let freq = 1100.0 + 1000.0 * self.d;

        for sample in samples.iter_mut() {
            self.a += self.b;
            self.b -= self.a / freq;
            *sample = (500.0 * self.a.trunc()).clamp(i16::MIN as f64, i16::MAX as f64) as i16;
        }

        self.num_samples += samples.len() as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_follow_sample_count() {
        let mut wave = WaveGenerator::new(44_100);
        assert_eq!(wave.pts(), Some(gst::ClockTime::ZERO));

        let mut chunk = [0i16; 512];
        wave.fill(&mut chunk);
        assert_eq!(wave.num_samples(), 512);
        assert_eq!(
            wave.pts(),
            gst::ClockTime::SECOND.mul_div_floor(512, 44_100)
        );
        assert_eq!(wave.duration(44_100), Some(gst::ClockTime::SECOND));
    }

    #[test]
    fn first_samples_start_at_zero_and_rise() {
        let mut wave = WaveGenerator::new(44_100);
        let mut chunk = [0i16; 4];
        wave.fill(&mut chunk);
        // a climbs by roughly b (just under 1) per sample
        assert_eq!(chunk[0], 500);
        assert_eq!(chunk[1], 500);
        assert_eq!(chunk[2], 1000);
    }

    #[test]
    fn long_runs_do_not_overflow() {
        let mut wave = WaveGenerator::new(44_100);
        let mut chunk = [0i16; 512];
        for _ in 0..200 {
            wave.fill(&mut chunk);
        }
        assert_eq!(wave.num_samples(), 200 * 512);
    }
}
