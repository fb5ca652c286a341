use serde::Serialize;

/// Spectrum of one `buffer_size` chunk of the source.
#[derive(Clone, Debug, Serialize)]
pub struct SpectrumFrame {
    /// Start of the chunk in seconds
    pub time: f64,
    /// Power per bin (`buffer_size / 2` values)
    pub spectrum: Vec<f32>,
}

/// Offline analysis result, written by `--dump-spectrum`.
#[derive(Clone, Debug, Serialize)]
pub struct SpectrumDump {
    pub source: String,
    pub sample_rate: u32,
    pub channels: usize,
    pub buffer_size: u32,
    pub duration: f64,
    pub frames: Vec<SpectrumFrame>,
}
