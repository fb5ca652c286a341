use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::session::Renderer;
use crate::audio::decode::StreamFormat;
use crate::error::{PlayerError, Result};

/// Something that can turn a [`Renderer`] into sound.
pub trait AudioBackend {
    fn open(&self, format: StreamFormat, renderer: Renderer) -> Result<Box<dyn OutputStream>>;
}

/// A running output stream. Dropping it stops the callbacks.
pub trait OutputStream {
    fn resume(&mut self) -> Result<()>;
    fn suspend(&mut self) -> Result<()>;
}

/// Default output device of the default cpal host.
pub struct CpalBackend {
    period_frames: u32,
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CpalBackend {
    pub fn new() -> Self {
        Self::with_period_frames(1024)
    }

    /// Ask the device for callbacks of `period_frames` frames.
    pub fn with_period_frames(period_frames: u32) -> Self {
        Self {
            period_frames: period_frames.max(1),
        }
    }

    /// Prefer the source layout; accept any channel count at the source rate.
    fn stream_config(
        device: &cpal::Device,
        format: StreamFormat,
        period_frames: u32,
    ) -> Result<cpal::StreamConfig> {
        let rate = cpal::SampleRate(format.sample_rate);
        let configs: Vec<_> = device
            .supported_output_configs()
            .map_err(|e| PlayerError::Device(format!("Failed to query output configs: {}", e)))?
            .filter(|c| c.min_sample_rate() <= rate && rate <= c.max_sample_rate())
            .collect();

        let chosen = configs
            .iter()
            .find(|c| c.channels() as usize == format.channels)
            .or_else(|| configs.first())
            .ok_or_else(|| {
                PlayerError::Device(format!(
                    "Output device does not support {}Hz",
                    format.sample_rate
                ))
            })?;

        Ok(cpal::StreamConfig {
            channels: chosen.channels(),
            sample_rate: rate,
            buffer_size: fixed_buffer_size(chosen.buffer_size(), period_frames),
        })
    }
}

/// `Fixed(period_frames)` when the device range allows it, else the device default.
fn fixed_buffer_size(supported: &cpal::SupportedBufferSize, period_frames: u32) -> cpal::BufferSize {
    match *supported {
        cpal::SupportedBufferSize::Range { min, max } if (min..=max).contains(&period_frames) => {
            cpal::BufferSize::Fixed(period_frames)
        }
        cpal::SupportedBufferSize::Range { min, max } => {
            log::warn!(
                "Device buffer range {}..={} excludes {} frames, using the default",
                min,
                max,
                period_frames
            );
            cpal::BufferSize::Default
        }
        cpal::SupportedBufferSize::Unknown => {
            log::warn!("Device buffer range unknown, using the default");
            cpal::BufferSize::Default
        }
    }
}

impl AudioBackend for CpalBackend {
    fn open(&self, format: StreamFormat, mut renderer: Renderer) -> Result<Box<dyn OutputStream>> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| PlayerError::Device("No audio output device found".into()))?;

        let config = Self::stream_config(&device, format, self.period_frames)?;
        let out_channels = config.channels as usize;

        log::info!(
            "Audio: {} @ {}Hz, {} channel(s), buffer {:?}",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            config.sample_rate.0,
            out_channels,
            config.buffer_size
        );

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    renderer.render(data, out_channels);
                },
                |err| log::error!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| PlayerError::Device(format!("Failed to build audio stream: {}", e)))?;

        Ok(Box::new(CpalStream { stream }))
    }
}

struct CpalStream {
    stream: cpal::Stream,
}

impl OutputStream for CpalStream {
    fn resume(&mut self) -> Result<()> {
        self.stream
            .play()
            .map_err(|e| PlayerError::Device(format!("Failed to start audio stream: {}", e)))
    }

    fn suspend(&mut self) -> Result<()> {
        self.stream
            .pause()
            .map_err(|e| PlayerError::Device(format!("Failed to pause audio stream: {}", e)))
    }
}

/// Renders in real time on a clock thread and discards the samples.
pub struct NullBackend {
    period_frames: u32,
}

impl NullBackend {
    pub fn new(period_frames: u32) -> Self {
        Self {
            period_frames: period_frames.max(1),
        }
    }
}

impl AudioBackend for NullBackend {
    fn open(&self, format: StreamFormat, mut renderer: Renderer) -> Result<Box<dyn OutputStream>> {
        let running = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(AtomicBool::new(false));
        let channels = format.channels.max(1);
        let period = Duration::from_secs_f64(
            self.period_frames as f64 / format.sample_rate.max(1) as f64,
        );
        let mut scratch = vec![0.0f32; self.period_frames as usize * channels];

        let thread = {
            let running = Arc::clone(&running);
            let shutdown = Arc::clone(&shutdown);
            thread::Builder::new()
                .name("null-output".into())
                .spawn(move || {
                    let mut next = Instant::now();
                    while !shutdown.load(Ordering::SeqCst) {
                        if running.load(Ordering::SeqCst) {
                            renderer.render(&mut scratch, channels);
                        }
                        next += period;
                        let now = Instant::now();
                        if next > now {
                            thread::sleep(next - now);
                        } else {
                            next = now;
                        }
                    }
                })
                .map_err(|e| PlayerError::Device(format!("Failed to spawn output thread: {}", e)))?
        };

        log::info!(
            "Null output @ {}Hz, {} frames per period",
            format.sample_rate,
            self.period_frames
        );

        Ok(Box::new(NullStream {
            running,
            shutdown,
            thread: Some(thread),
        }))
    }
}

struct NullStream {
    running: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl OutputStream for NullStream {
    fn resume(&mut self) -> Result<()> {
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn suspend(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for NullStream {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
