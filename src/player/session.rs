use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::{Arc, RwLock, Weak};

use crate::audio::buffer::AudioBuffer;
use crate::audio::decode::StreamFormat;

use super::delegate::{BufferTimestamp, PlayerDelegate};
use super::PlayerHandle;

pub(crate) type DelegateSlot = Arc<RwLock<Option<Weak<dyn PlayerDelegate>>>>;

/// Upgrade the current delegate, if it is still alive.
pub(crate) fn current_delegate(slot: &DelegateSlot) -> Option<Arc<dyn PlayerDelegate>> {
    slot.read().ok()?.as_ref()?.upgrade()
}

/// Transport and timing state shared between the player, its handles and the
/// audio thread. `generation` changes on every new session so a renderer left
/// over from a torn-down session cannot touch the current one.
#[derive(Default)]
pub(crate) struct PlayerState {
    generation: AtomicU64,
    playing: AtomicBool,
    finished: AtomicBool,
    frames_rendered: AtomicU64,
    sample_rate: AtomicU32,
    duration_bits: AtomicU64,
}

impl PlayerState {
    pub(crate) fn begin_session(&self, format: StreamFormat, duration: f64) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.playing.store(false, Ordering::SeqCst);
        self.finished.store(false, Ordering::SeqCst);
        self.frames_rendered.store(0, Ordering::SeqCst);
        self.sample_rate.store(format.sample_rate, Ordering::SeqCst);
        self.set_duration(duration);
        generation
    }

    /// Invalidate the running session and rewind.
    pub(crate) fn end_session(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.playing.store(false, Ordering::SeqCst);
        self.frames_rendered.store(0, Ordering::SeqCst);
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub(crate) fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    pub(crate) fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::SeqCst);
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    pub(crate) fn duration(&self) -> f64 {
        f64::from_bits(self.duration_bits.load(Ordering::Relaxed))
    }

    pub(crate) fn set_duration(&self, seconds: f64) {
        self.duration_bits.store(seconds.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }

    pub(crate) fn current_time(&self) -> f64 {
        let rate = self.sample_rate.load(Ordering::Relaxed);
        if rate == 0 {
            return 0.0;
        }
        self.frames_rendered() as f64 / rate as f64
    }
}

pub(crate) enum FeedMessage {
    Chunk(Vec<f32>),
    End,
    Failed(String),
}

pub(crate) enum Feed {
    /// Chunks arriving from the decoder thread
    Queue(Receiver<FeedMessage>),
    /// Whole source already in memory
    Preloaded(Vec<f32>),
}

enum Refill {
    Ready,
    Underrun,
    Ended,
    Failed,
}

/// Pulls decoded frames for the output device.
///
/// Owned by the output stream and driven from its callback through
/// [`Renderer::render`].
pub struct Renderer {
    queue: Option<Receiver<FeedMessage>>,
    pending: Vec<f32>,
    pos: usize,
    format: StreamFormat,
    buffer: AudioBuffer,
    handle: PlayerHandle,
    generation: u64,
    delegate: DelegateSlot,
    done: bool,
}

impl Renderer {
    pub(crate) fn new(
        feed: Feed,
        format: StreamFormat,
        handle: PlayerHandle,
        generation: u64,
        delegate: DelegateSlot,
    ) -> Self {
        let (queue, pending) = match feed {
            Feed::Queue(rx) => (Some(rx), Vec::new()),
            Feed::Preloaded(samples) => (None, samples),
        };
        Self {
            queue,
            pending,
            pos: 0,
            format,
            buffer: AudioBuffer::new(format.channels, 0),
            handle,
            generation,
            delegate,
            done: false,
        }
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    /// Fill `out` (interleaved, `out_channels` per frame). Writes silence
    /// while paused, after the end of the source, or once the session that
    /// created this renderer is gone.
    pub fn render(&mut self, out: &mut [f32], out_channels: usize) {
        let state = Arc::clone(&self.handle.state);
        if self.done
            || out_channels == 0
            || state.generation() != self.generation
            || !state.is_playing()
        {
            out.iter_mut().for_each(|s| *s = 0.0);
            return;
        }

        let frames = out.len() / out_channels;
        self.buffer.resize(frames);
        self.buffer.clear();

        let channels = self.format.channels.max(1);
        let mut filled = 0;
        let mut outcome = Refill::Ready;
        while filled < frames {
            if self.pos + channels > self.pending.len() {
                outcome = self.refill();
                match outcome {
                    Refill::Ready => continue,
                    _ => break,
                }
            }
            self.buffer
                .set_frame(filled, &self.pending[self.pos..self.pos + channels]);
            self.pos += channels;
            filled += 1;
        }

        let delegate = current_delegate(&self.delegate);

        if filled > 0 {
            let sample_time = state.frames_rendered();
            let timestamp = BufferTimestamp {
                sample_time,
                seconds: self.format.seconds(sample_time),
            };
            if let Some(ref delegate) = delegate {
                delegate.did_send_audio_buffers(
                    &self.handle,
                    &mut self.buffer,
                    filled as u32,
                    &timestamp,
                );
            }
            state.frames_rendered.fetch_add(filled as u64, Ordering::Relaxed);
        }
        self.buffer.write_interleaved(out, out_channels);

        match outcome {
            Refill::Ended => self.finish(delegate, true),
            Refill::Failed => self.finish(delegate, false),
            Refill::Ready => {}
            Refill::Underrun => log::trace!("Decoder underrun, {} of {} frames", filled, frames),
        }
    }

    fn refill(&mut self) -> Refill {
        let Some(queue) = self.queue.as_ref() else {
            return Refill::Ended;
        };
        match queue.try_recv() {
            Ok(FeedMessage::Chunk(chunk)) => {
                self.pending = chunk;
                self.pos = 0;
                Refill::Ready
            }
            Ok(FeedMessage::End) | Err(TryRecvError::Disconnected) => Refill::Ended,
            Ok(FeedMessage::Failed(reason)) => {
                log::error!("Playback stopped: {}", reason);
                Refill::Failed
            }
            Err(TryRecvError::Empty) => Refill::Underrun,
        }
    }

    fn finish(&mut self, delegate: Option<Arc<dyn PlayerDelegate>>, successfully: bool) {
        self.done = true;
        let state = &self.handle.state;
        state.playing.store(false, Ordering::SeqCst);
        state.finished.store(true, Ordering::SeqCst);
        log::info!(
            "Playback finished ({}) at {:.2}s",
            if successfully { "complete" } else { "failed" },
            state.current_time()
        );
        if let Some(delegate) = delegate {
            delegate.did_finish_playing(&self.handle, successfully);
        }
    }
}
