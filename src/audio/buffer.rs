/// Planar block of `f32` samples, one vector per channel.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
    frames: usize,
}

impl AudioBuffer {
    pub fn new(channels: usize, frames: usize) -> Self {
        Self {
            channels: vec![vec![0.0; frames]; channels],
            frames,
        }
    }

    /// De-interleave `samples` into `channels` planes. A trailing partial frame
    /// is dropped.
    pub fn from_interleaved(samples: &[f32], channels: usize) -> Self {
        if channels == 0 {
            return Self::default();
        }
        let frames = samples.len() / channels;
        let mut buffer = Self::new(channels, frames);
        for (frame, chunk) in samples.chunks_exact(channels).enumerate() {
            for (ch, &s) in chunk.iter().enumerate() {
                buffer.channels[ch][frame] = s;
            }
        }
        buffer
    }

    pub fn channels(&self) -> usize {
        self.channels.len()
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.channels[index]
    }

    /// Change the frame count in place, keeping the channel count and the
    /// allocation. New frames are zero.
    pub(crate) fn resize(&mut self, frames: usize) {
        for plane in &mut self.channels {
            plane.resize(frames, 0.0);
        }
        self.frames = frames;
    }

    /// Zero every sample without changing the shape.
    pub fn clear(&mut self) {
        for plane in &mut self.channels {
            plane.iter_mut().for_each(|s| *s = 0.0);
        }
    }

    /// Write frame `frame` from interleaved `src` (which has `src_channels`
    /// channels per frame) into this buffer.
    pub(crate) fn set_frame(&mut self, frame: usize, src: &[f32]) {
        for (ch, plane) in self.channels.iter_mut().enumerate() {
            plane[frame] = src.get(ch).copied().unwrap_or(0.0);
        }
    }

    /// Interleave into `out`, which has `out_channels` channels per frame.
    ///
    /// Mono is copied to every output channel; surplus source channels are
    /// dropped and missing ones are written as silence.
    pub fn write_interleaved(&self, out: &mut [f32], out_channels: usize) {
        if out_channels == 0 {
            return;
        }
        for (frame, dst) in out.chunks_mut(out_channels).enumerate() {
            for (ch, sample) in dst.iter_mut().enumerate() {
                *sample = if frame >= self.frames || self.channels.is_empty() {
                    0.0
                } else if self.channels.len() == 1 {
                    self.channels[0][frame]
                } else {
                    self.channels.get(ch).map_or(0.0, |plane| plane[frame])
                };
            }
        }
    }

    /// Average of all channels over the first `frames` frames.
    pub fn mono_mix(&self, frames: usize) -> Vec<f32> {
        let frames = frames.min(self.frames);
        if self.channels.is_empty() {
            return vec![0.0; frames];
        }
        let scale = 1.0 / self.channels.len() as f32;
        (0..frames)
            .map(|i| self.channels.iter().map(|plane| plane[i]).sum::<f32>() * scale)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deinterleaves_stereo() {
        let buf = AudioBuffer::from_interleaved(&[1.0, -1.0, 2.0, -2.0, 3.0], 2);
        assert_eq!(buf.channels(), 2);
        assert_eq!(buf.frames(), 2);
        assert_eq!(buf.channel(0), &[1.0, 2.0]);
        assert_eq!(buf.channel(1), &[-1.0, -2.0]);
    }

    #[test]
    fn mono_is_duplicated_on_output() {
        let buf = AudioBuffer::from_interleaved(&[0.5, 0.25], 1);
        let mut out = [9.0f32; 6];
        buf.write_interleaved(&mut out, 2);
        assert_eq!(out, [0.5, 0.5, 0.25, 0.25, 0.0, 0.0]);
    }

    #[test]
    fn surplus_channels_are_dropped() {
        let buf = AudioBuffer::from_interleaved(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3);
        let mut out = [0.0f32; 4];
        buf.write_interleaved(&mut out, 2);
        assert_eq!(out, [1.0, 2.0, 4.0, 5.0]);
    }

    #[test]
    fn mono_mix_averages_and_clamps() {
        let buf = AudioBuffer::from_interleaved(&[1.0, 0.0, 0.5, 0.5], 2);
        assert_eq!(buf.mono_mix(10), vec![0.5, 0.5]);
        assert_eq!(buf.mono_mix(1), vec![0.5]);
    }

    #[test]
    fn resize_keeps_channels_and_storage() {
        let mut buf = AudioBuffer::from_interleaved(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2);
        buf.resize(1);
        assert_eq!(buf.frames(), 1);
        assert_eq!(buf.channel(1), &[2.0]);
        let capacity = buf.channels[0].capacity();

        buf.resize(3);
        assert_eq!(buf.channels(), 2);
        assert_eq!(buf.channel(0), &[1.0, 0.0, 0.0]);
        assert_eq!(buf.channels[0].capacity(), capacity);
    }
}
