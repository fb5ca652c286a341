//! Audio player and per-buffer spectrum analysis.
//!
//! [`Player`] decodes local or remote media with symphonia and plays it on the
//! default output device. Every buffer sent to the device is offered to a
//! [`PlayerDelegate`], which can feed it to a [`SpectrumAnalyzer`].

pub mod audio;
pub mod error;
pub mod player;
pub mod source;

pub use audio::buffer::AudioBuffer;
pub use audio::fft::SpectrumAnalyzer;
pub use error::{PlayerError, Result};
pub use player::delegate::{BufferTimestamp, PlayerDelegate};
pub use player::{Player, PlayerConfig, PlayerHandle};
pub use source::MediaSource;
