use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Remote fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("Remote fetch for {url} returned status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Unsupported or corrupt media: {0}")]
    Format(#[from] symphonia::core::errors::Error),

    #[error("No decodable audio track found")]
    NoTrack,

    #[error("Audio device error: {0}")]
    Device(String),

    #[error("Invalid FFT buffer size: {0}")]
    InvalidBufferSize(u32),

    #[error("Nothing loaded to play")]
    NothingLoaded,
}

pub type Result<T> = std::result::Result<T, PlayerError>;
