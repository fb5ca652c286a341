use serde::Deserialize;
use std::path::Path;

use spectraplay::audio::fft::DEFAULT_BUFFER_SIZE;
use spectraplay::PlayerConfig;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub fft: FftConfig,
}

#[derive(Debug, Deserialize)]
pub struct FftConfig {
    #[serde(default = "default_buffer_size")]
    pub buffer_size: u32,
    #[serde(default = "default_bands")]
    pub bands: usize,
}

impl Default for FftConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            bands: default_bands(),
        }
    }
}

fn default_buffer_size() -> u32 { DEFAULT_BUFFER_SIZE }
fn default_bands() -> usize { 16 }

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            log::warn!("Invalid config {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert!(cfg.player.streaming);
        assert_eq!(cfg.player.queue_buffers, 3);
        assert_eq!(cfg.fft.buffer_size, 1024);
        assert_eq!(cfg.fft.bands, 16);
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [player]
            streaming = false

            [fft]
            buffer_size = 4096
            "#,
        )
        .unwrap();
        assert!(!cfg.player.streaming);
        assert_eq!(cfg.player.period_frames, 1024);
        assert_eq!(cfg.fft.buffer_size, 4096);
        assert_eq!(cfg.fft.bands, 16);
    }

    #[test]
    fn unreadable_or_invalid_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(&dir.path().join("missing.toml")).is_none());

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[fft]\nbuffer_size = \"big\"\n").unwrap();
        assert!(load_config(&bad).is_none());
    }
}
