use crest_domain::SampleFormat;

/// One decoded file: interleaved samples held in the integer domain of `format`
/// (an s16 full-scale sample is 32768.0, a float one is 1.0).
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: u16,
    format: SampleFormat,
    samples: Vec<f64>,
}

impl AudioBuffer {
    pub fn new(sample_rate: u32, channels: u16, format: SampleFormat, samples: Vec<f64>) -> Self {
        Self {
            sample_rate,
            channels,
            format,
            samples,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels.max(1))
    }

    /// Largest magnitude the sample format can represent.
    pub fn max_possible_amplitude(&self) -> f64 {
        self.format.max_amplitude()
    }

    /// Largest absolute sample value actually present.
    pub fn max_amplitude(&self) -> f64 {
        self.samples
            .iter()
            .fold(0.0_f64, |peak, sample| peak.max(sample.abs()))
    }

    pub fn is_silent(&self) -> bool {
        self.max_amplitude() == 0.0
    }

    /// Same metadata, every sample passed through `f`.
    pub fn map_samples(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            samples: self.samples.iter().map(|&s| f(s)).collect(),
            ..*self
        }
    }
}
