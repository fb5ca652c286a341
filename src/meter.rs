use std::sync::mpsc::Sender;
use std::sync::Mutex;

use spectraplay::audio::fft::band_levels;
use spectraplay::{AudioBuffer, BufferTimestamp, PlayerDelegate, PlayerHandle, SpectrumAnalyzer};

const BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Events the meter forwards to the main loop.
#[derive(Debug, PartialEq)]
pub enum MeterEvent {
    Ready,
    Finished(bool),
}

/// Runs every outgoing buffer through the FFT and keeps the latest band levels.
pub struct SpectrumMeter {
    analyzer: Mutex<SpectrumAnalyzer>,
    bands: usize,
    levels: Mutex<Vec<f32>>,
    events: Mutex<Sender<MeterEvent>>,
}

impl SpectrumMeter {
    pub fn new(analyzer: SpectrumAnalyzer, bands: usize, events: Sender<MeterEvent>) -> Self {
        Self {
            analyzer: Mutex::new(analyzer),
            bands,
            levels: Mutex::new(vec![0.0; bands]),
            events: Mutex::new(events),
        }
    }

    pub fn levels(&self) -> Vec<f32> {
        self.levels.lock().map(|l| l.clone()).unwrap_or_default()
    }

    fn send(&self, event: MeterEvent) {
        if let Ok(tx) = self.events.lock() {
            let _ = tx.send(event);
        }
    }
}

impl PlayerDelegate for SpectrumMeter {
    fn did_finish_playing(&self, _player: &PlayerHandle, successfully: bool) {
        self.send(MeterEvent::Finished(successfully));
    }

    fn playback_ready(&self, _player: &PlayerHandle) {
        self.send(MeterEvent::Ready);
    }

    fn did_send_audio_buffers(
        &self,
        _player: &PlayerHandle,
        buffer: &mut AudioBuffer,
        num_frames: u32,
        _timestamp: &BufferTimestamp,
    ) {
        // audio thread: skip a frame rather than wait on the UI
        let Ok(mut analyzer) = self.analyzer.try_lock() else {
            return;
        };
        let spectrum = analyzer.render(buffer, num_frames);
        if let Ok(mut levels) = self.levels.try_lock() {
            *levels = band_levels(&spectrum, self.bands);
        }
    }
}

/// One block character per band, on a 60 dB scale.
pub fn render_bars(levels: &[f32]) -> String {
    levels
        .iter()
        .map(|&power| {
            let db = 10.0 * power.max(1e-12).log10();
            let norm = ((db + 60.0) / 60.0).clamp(0.0, 1.0);
            BARS[((norm * (BARS.len() - 1) as f32).round()) as usize]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn bars_span_the_scale() {
        assert_eq!(render_bars(&[0.0, 1.0, 2.0]), "▁██");
        assert_eq!(render_bars(&[1e-3]), "▅");
        assert_eq!(render_bars(&[]), "");
    }

    #[test]
    fn meter_tracks_latest_buffer() {
        let (tx, rx) = channel();
        let analyzer = SpectrumAnalyzer::with_buffer_size(64).unwrap();
        let meter = SpectrumMeter::new(analyzer, 4, tx);
        let handle = PlayerHandle::default();

        let mut buffer = AudioBuffer::new(1, 64);
        for (i, s) in buffer.channel_mut(0).iter_mut().enumerate() {
            *s = (2.0 * std::f32::consts::PI * 4.0 * i as f32 / 64.0).sin();
        }
        let ts = BufferTimestamp {
            sample_time: 0,
            seconds: 0.0,
        };
        meter.did_send_audio_buffers(&handle, &mut buffer, 64, &ts);
        let levels = meter.levels();
        assert_eq!(levels.len(), 4);
        assert!(levels[0] > levels[3]);

        meter.playback_ready(&handle);
        meter.did_finish_playing(&handle, true);
        assert_eq!(rx.try_recv(), Ok(MeterEvent::Ready));
        assert_eq!(rx.try_recv(), Ok(MeterEvent::Finished(true)));
    }
}
