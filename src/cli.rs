use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "spectraplay", about = "Audio player with a live spectrum meter")]
pub struct Cli {
    /// Audio file path or http(s) URL (WAV, MP3, FLAC, OGG, AAC)
    pub input: Option<String>,

    /// Decode the whole file before playback instead of streaming it
    #[arg(long)]
    pub no_streaming: bool,

    /// FFT buffer size in frames
    #[arg(long, default_value_t = 1024)]
    pub fft_size: u32,

    /// Number of bands in the spectrum meter
    #[arg(long, default_value_t = 16)]
    pub bands: usize,

    /// Render on a clock thread instead of the sound card
    #[arg(long)]
    pub null_output: bool,

    /// Write the per-chunk spectrum of the whole file as JSON and exit
    #[arg(long)]
    pub dump_spectrum: Option<PathBuf>,

    /// Config file (default: ./spectraplay.toml, then the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
