//! Transport façade over decoding and the output device.
//!
//! A [`Player`] owns at most one session at a time. A session is the output
//! stream plus, in streaming mode, a decoder thread that feeds it through a
//! bounded queue. Timing state lives in a shared [`PlayerHandle`] that the
//! delegate receives on every callback.

pub mod delegate;
pub mod output;
pub mod session;

use std::sync::mpsc::{sync_channel, SyncSender, TrySendError};
use std::sync::{Arc, RwLock, Weak};
use std::thread;
use std::time::Duration;

use serde::Deserialize;

use crate::audio::decode::{decode_all, PacketDecoder, StreamFormat};
use crate::error::{PlayerError, Result};
use crate::source::MediaSource;

use delegate::PlayerDelegate;
use output::{AudioBackend, CpalBackend, OutputStream};
use session::{current_delegate, DelegateSlot, Feed, FeedMessage, PlayerState, Renderer};

const QUEUE_POLL: Duration = Duration::from_millis(5);

#[derive(Clone, Debug, Deserialize)]
pub struct PlayerConfig {
    /// Decode while playing instead of loading the whole source first
    #[serde(default = "default_streaming")]
    pub streaming: bool,
    /// Decoded chunks buffered ahead of the output in streaming mode
    #[serde(default = "default_queue_buffers")]
    pub queue_buffers: usize,
    /// Callback size for the headless output
    #[serde(default = "default_period_frames")]
    pub period_frames: u32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            streaming: default_streaming(),
            queue_buffers: default_queue_buffers(),
            period_frames: default_period_frames(),
        }
    }
}

fn default_streaming() -> bool { true }
fn default_queue_buffers() -> usize { 3 }
fn default_period_frames() -> u32 { 1024 }

/// Read-only view of a player's timing state. Cheap to clone.
#[derive(Clone, Default)]
pub struct PlayerHandle {
    pub(crate) state: Arc<PlayerState>,
}

impl PlayerHandle {
    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    /// Total length in seconds; 0.0 until known.
    pub fn duration(&self) -> f64 {
        self.state.duration()
    }

    /// Seconds of audio handed to the output so far.
    pub fn current_time(&self) -> f64 {
        self.state.current_time()
    }
}

struct Session {
    stream: Box<dyn OutputStream>,
    decoder_thread: Option<thread::JoinHandle<()>>,
}

pub struct Player {
    config: PlayerConfig,
    backend: Box<dyn AudioBackend>,
    handle: PlayerHandle,
    delegate: DelegateSlot,
    source: Option<MediaSource>,
    session: Option<Session>,
}

impl Player {
    /// Streaming player on the default output device.
    pub fn new() -> Self {
        Self::with_streaming(true)
    }

    pub fn with_streaming(streaming: bool) -> Self {
        let config = PlayerConfig {
            streaming,
            ..PlayerConfig::default()
        };
        let backend = CpalBackend::with_period_frames(config.period_frames);
        Self::with_backend(Box::new(backend), config)
    }

    pub fn with_backend(backend: Box<dyn AudioBackend>, config: PlayerConfig) -> Self {
        Self {
            config,
            backend,
            handle: PlayerHandle::default(),
            delegate: Arc::new(RwLock::new(None)),
            source: None,
            session: None,
        }
    }

    /// Observe playback. Only a weak reference is kept.
    pub fn set_delegate<D: PlayerDelegate + 'static>(&self, delegate: &Arc<D>) {
        let weak: Weak<dyn PlayerDelegate> = Arc::downgrade(delegate) as Weak<dyn PlayerDelegate>;
        if let Ok(mut slot) = self.delegate.write() {
            *slot = Some(weak);
        }
    }

    pub fn clear_delegate(&self) {
        if let Ok(mut slot) = self.delegate.write() {
            *slot = None;
        }
    }

    pub fn handle(&self) -> PlayerHandle {
        self.handle.clone()
    }

    pub fn is_streaming(&self) -> bool {
        self.config.streaming
    }

    pub fn is_playing(&self) -> bool {
        self.handle.is_playing()
    }

    pub fn duration(&self) -> f64 {
        self.handle.duration()
    }

    pub fn current_time(&self) -> f64 {
        self.handle.current_time()
    }

    /// Fetch and play an `http(s)` URL.
    pub fn play_remote(&mut self, url: &str) -> Result<()> {
        self.play_source(MediaSource::Remote(url.to_string()))
    }

    /// Play a file from disk.
    pub fn play_file(&mut self, path: impl Into<std::path::PathBuf>) -> Result<()> {
        self.play_source(MediaSource::Local(path.into()))
    }

    /// Replace whatever is loaded with `source` and start playing it.
    pub fn play_source(&mut self, source: MediaSource) -> Result<()> {
        self.teardown();
        self.source = Some(source.clone());
        self.start_session(source)
    }

    pub fn toggle_playback(&mut self) -> Result<()> {
        if self.is_playing() {
            self.pause()
        } else {
            self.play()
        }
    }

    /// Resume a paused session, or start the loaded source from the beginning
    /// when it was stopped or has finished.
    pub fn play(&mut self) -> Result<()> {
        let restart = match self.session {
            Some(_) => self.handle.state.is_finished(),
            None => true,
        };

        if restart {
            let source = self.source.clone().ok_or(PlayerError::NothingLoaded)?;
            self.teardown();
            return self.start_session(source);
        }

        if let Some(session) = self.session.as_mut() {
            session.stream.resume()?;
            self.handle.state.set_playing(true);
            log::debug!("Resumed at {:.2}s", self.handle.current_time());
        }
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        if let Some(session) = self.session.as_mut() {
            self.handle.state.set_playing(false);
            session.stream.suspend()?;
            log::debug!("Paused at {:.2}s", self.handle.current_time());
        }
        Ok(())
    }

    /// Drop the session and rewind. The delegate is not notified.
    pub fn stop(&mut self) -> Result<()> {
        self.teardown();
        Ok(())
    }

    fn start_session(&mut self, source: MediaSource) -> Result<()> {
        let state = Arc::clone(&self.handle.state);

        let (feed, decoder_thread, format, generation) = if self.config.streaming {
            let mut decoder = PacketDecoder::open(&source)?;
            let format = decoder.format();
            let generation = state.begin_session(format, decoder.duration().unwrap_or(0.0));
            let known_duration = decoder.duration().is_some();

            let (tx, rx) = sync_channel(self.config.queue_buffers.max(1));
            let thread_state = Arc::clone(&state);
            let thread = thread::Builder::new()
                .name("decoder".into())
                .spawn(move || {
                    feed_queue(
                        || decoder.next_chunk(),
                        &tx,
                        &thread_state,
                        generation,
                        format,
                        known_duration,
                    );
                })
                .map_err(|e| PlayerError::Device(format!("Failed to spawn decoder: {}", e)))?;

            (Feed::Queue(rx), Some(thread), format, generation)
        } else {
            let audio = decode_all(&source)?;
            let format = audio.format;
            let generation = state.begin_session(format, audio.duration());
            (Feed::Preloaded(audio.samples), None, format, generation)
        };

        let renderer = Renderer::new(
            feed,
            format,
            self.handle.clone(),
            generation,
            Arc::clone(&self.delegate),
        );
        let stream = match self.backend.open(format, renderer) {
            Ok(stream) => stream,
            Err(e) => {
                state.end_session();
                return Err(e);
            }
        };
        self.session = Some(Session {
            stream,
            decoder_thread,
        });

        log::info!(
            "Ready: {} ({})",
            source,
            if self.config.streaming { "streaming" } else { "preloaded" }
        );
        if let Some(delegate) = current_delegate(&self.delegate) {
            delegate.playback_ready(&self.handle);
        }

        let resumed = match self.session.as_mut() {
            Some(session) => session.stream.resume(),
            None => Ok(()),
        };
        if let Err(e) = resumed {
            log::warn!("Output failed to start: {}", e);
            self.teardown();
            return Err(e);
        }
        state.set_playing(true);
        Ok(())
    }

    fn teardown(&mut self) {
        self.handle.state.end_session();
        if let Some(session) = self.session.take() {
            // end_session above makes the decoder give up on a full queue
            drop(session.stream);
            if let Some(thread) = session.decoder_thread {
                if thread.join().is_err() {
                    log::warn!("Decoder thread panicked");
                }
            }
            log::debug!("Session closed");
        }
    }
}

/// Decoder thread body: push chunks from `next` until the source ends, fails
/// or the session is torn down. Fills in the duration when the container did
/// not report one.
fn feed_queue<F>(
    mut next: F,
    tx: &SyncSender<FeedMessage>,
    state: &PlayerState,
    generation: u64,
    format: StreamFormat,
    known_duration: bool,
) where
    F: FnMut() -> Result<Option<Vec<f32>>>,
{
    let mut frames: u64 = 0;
    loop {
        match next() {
            Ok(Some(chunk)) => {
                frames += (chunk.len() / format.channels.max(1)) as u64;
                if !enqueue(tx, FeedMessage::Chunk(chunk), state, generation) {
                    log::debug!("Decoder stopped: session closed");
                    return;
                }
            }
            Ok(None) => {
                if !known_duration && state.generation() == generation {
                    state.set_duration(format.seconds(frames));
                }
                enqueue(tx, FeedMessage::End, state, generation);
                return;
            }
            Err(e) => {
                log::warn!("Decode failed after {} frames: {}", frames, e);
                enqueue(tx, FeedMessage::Failed(e.to_string()), state, generation);
                return;
            }
        }
    }
}

/// Blocking send that gives up once the session is torn down.
fn enqueue(
    tx: &SyncSender<FeedMessage>,
    mut message: FeedMessage,
    state: &PlayerState,
    generation: u64,
) -> bool {
    loop {
        match tx.try_send(message) {
            Ok(()) => return true,
            Err(TrySendError::Disconnected(_)) => return false,
            Err(TrySendError::Full(returned)) => {
                if state.generation() != generation {
                    return false;
                }
                message = returned;
                thread::sleep(QUEUE_POLL);
            }
        }
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.teardown();
    }
}
