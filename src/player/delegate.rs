use crate::audio::buffer::AudioBuffer;

use super::PlayerHandle;

/// Position of a buffer within the playback session.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BufferTimestamp {
    /// Frames rendered before this buffer
    pub sample_time: u64,
    /// `sample_time` in seconds
    pub seconds: f64,
}

/// Observer for playback events.
///
/// Callbacks run on the audio thread. Keep them short and never block in
/// `did_send_audio_buffers`.
pub trait PlayerDelegate: Send + Sync {
    /// Playback reached the end of the source (`successfully == true`) or was
    /// cut short by a decode failure.
    fn did_finish_playing(&self, player: &PlayerHandle, successfully: bool);

    /// The source is open and the output stream is about to start.
    fn playback_ready(&self, _player: &PlayerHandle) {}

    /// Called with each buffer right before it is handed to the output device.
    /// Changes made to `buffer` are what gets played.
    fn did_send_audio_buffers(
        &self,
        _player: &PlayerHandle,
        _buffer: &mut AudioBuffer,
        _num_frames: u32,
        _timestamp: &BufferTimestamp,
    ) {
    }
}
