use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{PlayerError, Result};
use crate::source::MediaSource;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: usize,
}

impl StreamFormat {
    pub fn seconds(&self, frames: u64) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        frames as f64 / self.sample_rate as f64
    }
}

/// Fully decoded source, interleaved.
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub format: StreamFormat,
}

impl DecodedAudio {
    pub fn frames(&self) -> u64 {
        if self.format.channels == 0 {
            return 0;
        }
        (self.samples.len() / self.format.channels) as u64
    }

    pub fn duration(&self) -> f64 {
        self.format.seconds(self.frames())
    }
}

/// Packet-at-a-time decoder over the first playable track of a source.
pub struct PacketDecoder {
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    format: StreamFormat,
    duration: Option<f64>,
    sample_buf: Option<SampleBuffer<f32>>,
}

impl PacketDecoder {
    pub fn open(source: &MediaSource) -> Result<Self> {
        let mss = MediaSourceStream::new(source.open()?, Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = source.extension_hint() {
            hint.with_extension(&ext);
        }

        let probed = symphonia::default::get_probe().format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;
        let reader = probed.format;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(PlayerError::NoTrack)?;

        let track_id = track.id;
        let channels = track.codec_params.channels.map_or(1, |c| c.count());
        let sample_rate = track.codec_params.sample_rate.ok_or(PlayerError::NoTrack)?;
        let duration = track
            .codec_params
            .n_frames
            .map(|n| n as f64 / sample_rate as f64);

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())?;

        log::info!(
            "Opened {}: {}Hz, {} channel(s), duration {}",
            source,
            sample_rate,
            channels,
            duration.map_or_else(|| "unknown".to_string(), |d| format!("{:.1}s", d))
        );

        Ok(Self {
            reader,
            decoder,
            track_id,
            format: StreamFormat {
                sample_rate,
                channels,
            },
            duration,
            sample_buf: None,
        })
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    /// Container-reported duration in seconds, when known.
    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    /// Next block of interleaved samples, `None` at end of stream.
    pub fn next_chunk(&mut self) -> Result<Option<Vec<f32>>> {
        loop {
            let packet = match self.reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => return Ok(None),
                Err(e) => return Err(e.into()),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(msg)) => {
                    log::warn!("Skipping corrupt packet: {}", msg);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if decoded.frames() == 0 {
                continue;
            }

            let spec = *decoded.spec();
            let capacity = decoded.capacity() as u64;
            let needs_alloc = self
                .sample_buf
                .as_ref()
                .map_or(true, |buf| buf.capacity() < decoded.capacity() * spec.channels.count());
            if needs_alloc {
                self.sample_buf = Some(SampleBuffer::<f32>::new(capacity, spec));
            }

            if let Some(buf) = self.sample_buf.as_mut() {
                buf.copy_interleaved_ref(decoded);
                return Ok(Some(buf.samples().to_vec()));
            }
        }
    }
}

/// Decode all of `source` into memory.
pub fn decode_all(source: &MediaSource) -> Result<DecodedAudio> {
    let mut decoder = PacketDecoder::open(source)?;
    let format = decoder.format();
    let mut samples: Vec<f32> = Vec::new();

    while let Some(chunk) = decoder.next_chunk()? {
        samples.extend_from_slice(&chunk);
    }

    let audio = DecodedAudio { samples, format };
    log::info!(
        "Decoded audio: {} frames, {}Hz, {:.1}s",
        audio.frames(),
        format.sample_rate,
        audio.duration()
    );
    Ok(audio)
}
