use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use super::buffer::AudioBuffer;
use crate::error::{PlayerError, Result};

pub const DEFAULT_BUFFER_SIZE: u32 = 1024;

/// Power spectrum of fixed-size audio buffers.
///
/// Output bin `k` is `(2 |X_k| / Σw)²` where `w` is a Hann window spanning the
/// frames actually analysed, so a full-scale sine centred on a bin reads close
/// to 1.0 there even when the chunk is shorter than the transform.
pub struct SpectrumAnalyzer {
    buffer_size: u32,
    fft: Arc<dyn Fft<f32>>,
    // Hann window for the last chunk length seen
    window: Vec<f32>,
    window_sum: f32,
    scratch: Vec<Complex<f32>>,
}

impl SpectrumAnalyzer {
    pub fn new() -> Self {
        Self::plan(DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(buffer_size: u32) -> Result<Self> {
        if buffer_size == 0 {
            return Err(PlayerError::InvalidBufferSize(buffer_size));
        }
        Ok(Self::plan(buffer_size))
    }

    fn plan(buffer_size: u32) -> Self {
        let n = buffer_size as usize;
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n);
        let mut analyzer = Self {
            buffer_size,
            fft,
            window: Vec::new(),
            window_sum: 0.0,
            scratch: vec![Complex::new(0.0, 0.0); n],
        };
        analyzer.fit_window(n);
        analyzer
    }

    fn fit_window(&mut self, frames: usize) {
        if self.window.len() != frames {
            self.window = hann_window(frames);
            self.window_sum = self.window.iter().sum::<f32>().max(f32::EPSILON);
        }
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    pub fn set_buffer_size(&mut self, buffer_size: u32) -> Result<()> {
        if buffer_size == 0 {
            return Err(PlayerError::InvalidBufferSize(buffer_size));
        }
        if buffer_size != self.buffer_size {
            log::debug!("Replanning FFT: {} -> {}", self.buffer_size, buffer_size);
            *self = Self::plan(buffer_size);
        }
        Ok(())
    }

    /// Power spectrum of the first `num_frames` frames of `buffer`, channels
    /// averaged. Returns `buffer_size / 2` bins. Chunks shorter than the
    /// buffer size are windowed over their own length and zero-padded.
    pub fn render(&mut self, buffer: &AudioBuffer, num_frames: u32) -> Vec<f32> {
        let n = self.buffer_size as usize;
        let half = n / 2;
        let frames = (num_frames as usize).min(buffer.frames()).min(n);

        if frames == 0 || buffer.channels() == 0 {
            return vec![0.0; half];
        }

        let mono = buffer.mono_mix(frames);
        self.fit_window(frames);
        for (i, slot) in self.scratch.iter_mut().enumerate() {
            *slot = match mono.get(i) {
                Some(&s) => Complex::new(s * self.window[i], 0.0),
                None => Complex::new(0.0, 0.0),
            };
        }

        self.fft.process(&mut self.scratch);

        let scale = 2.0 / self.window_sum;
        self.scratch[..half]
            .iter()
            .map(|c| {
                let amplitude = c.norm() * scale;
                amplitude * amplitude
            })
            .collect()
    }
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Fold a spectrum into `bands` equal-width groups of mean power.
pub fn band_levels(spectrum: &[f32], bands: usize) -> Vec<f32> {
    if bands == 0 {
        return Vec::new();
    }
    if spectrum.is_empty() {
        return vec![0.0; bands];
    }
    (0..bands)
        .map(|b| {
            let start = b * spectrum.len() / bands;
            let end = ((b + 1) * spectrum.len() / bands).max(start + 1).min(spectrum.len());
            if start >= end {
                return 0.0;
            }
            spectrum[start..end].iter().sum::<f32>() / (end - start) as f32
        })
        .collect()
}

fn hann_window(size: usize) -> Vec<f32> {
    if size == 1 {
        return vec![1.0];
    }
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}
