use rayon::prelude::*;

use super::buffer::AudioBuffer;
use super::decode::DecodedAudio;
use super::features::{SpectrumDump, SpectrumFrame};
use super::fft::SpectrumAnalyzer;
use crate::error::Result;

/// Split decoded audio into consecutive `buffer_size` chunks and compute the
/// power spectrum of each. The final partial chunk is zero-padded.
pub fn analyze(audio: &DecodedAudio, source: &str, buffer_size: u32) -> Result<SpectrumDump> {
    // validates the size before fanning out
    SpectrumAnalyzer::with_buffer_size(buffer_size)?;

    let channels = audio.format.channels.max(1);
    let chunk_samples = buffer_size as usize * channels;
    let chunks: Vec<&[f32]> = audio.samples.chunks(chunk_samples).collect();

    log::info!(
        "Analyzing {} chunk(s) of {} frames...",
        chunks.len(),
        buffer_size
    );

    let frames: Vec<SpectrumFrame> = chunks
        .par_iter()
        .enumerate()
        .map_init(
            || SpectrumAnalyzer::with_buffer_size(buffer_size).unwrap_or_default(),
            |analyzer, (idx, chunk)| {
                let buffer = AudioBuffer::from_interleaved(chunk, channels);
                let spectrum = analyzer.render(&buffer, buffer.frames() as u32);
                SpectrumFrame {
                    time: audio.format.seconds(idx as u64 * buffer_size as u64),
                    spectrum,
                }
            },
        )
        .collect();

    Ok(SpectrumDump {
        source: source.to_string(),
        sample_rate: audio.format.sample_rate,
        channels: audio.format.channels,
        buffer_size,
        duration: audio.duration(),
        frames,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decode::StreamFormat;

    fn tone(sample_rate: u32, frames: usize, freq: f32) -> DecodedAudio {
        let samples = (0..frames)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect();
        DecodedAudio {
            samples,
            format: StreamFormat {
                sample_rate,
                channels: 1,
            },
        }
    }

    #[test]
    fn one_frame_per_chunk() {
        let audio = tone(8000, 2500, 1000.0);
        let dump = analyze(&audio, "tone", 1024).unwrap();
        assert_eq!(dump.frames.len(), 3);
        assert_eq!(dump.frames[1].time, 1024.0 / 8000.0);
        assert!(dump.frames.iter().all(|f| f.spectrum.len() == 512));
    }

    #[test]
    fn peak_tracks_tone() {
        // 1000 Hz at 8 kHz with 256-point frames lands on bin 32
        let audio = tone(8000, 2048, 1000.0);
        let dump = analyze(&audio, "tone", 256).unwrap();
        for frame in &dump.frames {
            let peak = frame
                .spectrum
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i);
            assert_eq!(peak, Some(32));
        }
    }

    #[test]
    fn serializes_to_json() {
        let audio = tone(8000, 256, 500.0);
        let dump = analyze(&audio, "tone.wav", 256).unwrap();
        let json = serde_json::to_value(&dump).unwrap();
        assert_eq!(json["sample_rate"], 8000);
        assert_eq!(json["buffer_size"], 256);
        assert_eq!(json["frames"].as_array().map(|a| a.len()), Some(1));
    }

    #[test]
    fn rejects_zero_buffer_size() {
        assert!(analyze(&tone(8000, 100, 100.0), "tone", 0).is_err());
    }
}
