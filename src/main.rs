mod cli;
mod config;
mod meter;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use cli::Cli;
use meter::{render_bars, MeterEvent, SpectrumMeter};
use spectraplay::audio::{analysis, decode};
use spectraplay::player::output::{AudioBackend, CpalBackend, NullBackend};
use spectraplay::{MediaSource, Player, PlayerConfig, SpectrumAnalyzer};

const REFRESH: Duration = Duration::from_millis(50);

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Toggle,
    Stop,
    Restart,
    Quit,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    // Load config: explicit --config path, or auto-detect spectraplay.toml / global config
    let config_path = cli.config.clone().or_else(|| {
        let local = PathBuf::from("spectraplay.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(home) = dirs::home_dir() {
            let xdg = home.join(".config").join("spectraplay").join("config.toml");
            if xdg.exists() {
                return Some(xdg);
            }
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("spectraplay").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    });

    let mut player_config = PlayerConfig::default();
    if let Some(ref path) = config_path {
        if let Some(cfg) = config::load_config(path) {
            log::info!("Loaded config from {}", path.display());
            // Merge: config values apply only when CLI is at its default
            if cli.fft_size == 1024 { cli.fft_size = cfg.fft.buffer_size; }
            if cli.bands == 16 { cli.bands = cfg.fft.bands; }
            if !cli.no_streaming { cli.no_streaming = !cfg.player.streaming; }
            player_config = cfg.player;
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }
    player_config.streaming = !cli.no_streaming;
    // One device callback per analysed chunk
    player_config.period_frames = cli.fft_size;

    let input = cli.input.as_deref().context("Input audio file or URL is required")?;
    let source = MediaSource::parse(input);
    if let MediaSource::Local(ref path) = source {
        if !path.exists() {
            anyhow::bail!("Input file not found: {}", path.display());
        }
    }

    if let Some(ref out) = cli.dump_spectrum {
        return dump_spectrum(&source, cli.fft_size, out);
    }

    let analyzer = SpectrumAnalyzer::with_buffer_size(cli.fft_size)
        .context("Invalid --fft-size")?;

    log::info!("spectraplay - audio player with spectrum meter");
    log::info!("Input: {}", source);
    log::info!(
        "Mode: {}, FFT size: {}, bands: {}",
        if player_config.streaming { "streaming" } else { "preloaded" },
        cli.fft_size,
        cli.bands
    );

    let backend: Box<dyn AudioBackend> = if cli.null_output {
        Box::new(NullBackend::new(player_config.period_frames))
    } else {
        Box::new(CpalBackend::with_period_frames(player_config.period_frames))
    };

    let (event_tx, event_rx) = mpsc::channel();
    let meter = Arc::new(SpectrumMeter::new(analyzer, cli.bands, event_tx));
    let mut player = Player::with_backend(backend, player_config);
    player.set_delegate(&meter);

    player
        .play_source(source.clone())
        .with_context(|| format!("Failed to play {}", source))?;

    let commands = spawn_stdin_reader();
    println!("Controls: <enter> or p = play/pause, s = stop, r = restart, q = quit");

    let pb = ProgressBar::new(1);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:30.cyan/blue} {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );

    loop {
        match event_rx.recv_timeout(REFRESH) {
            Ok(MeterEvent::Ready) => log::debug!("Playback ready"),
            Ok(MeterEvent::Finished(ok)) => {
                if !ok {
                    pb.abandon_with_message("Playback failed");
                    anyhow::bail!("Playback of {} failed", source);
                }
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        while let Ok(cmd) = commands.try_recv() {
            match cmd {
                Command::Toggle => player.toggle_playback()?,
                Command::Stop => player.stop()?,
                Command::Restart => {
                    player.stop()?;
                    player.play()?;
                }
                Command::Quit => {
                    player.stop()?;
                    pb.finish_with_message("Stopped");
                    return Ok(());
                }
            }
        }

        let duration = player.duration();
        let position = player.current_time();
        let millis = (duration * 1000.0) as u64;
        pb.set_length(millis.max(1));
        pb.set_position(((position * 1000.0) as u64).min(millis.max(1)));
        pb.set_message(format!(
            "{} / {} {} {}",
            format_time(position),
            format_time(duration),
            if player.is_playing() { ">" } else { "||" },
            render_bars(&meter.levels())
        ));
    }

    pb.finish_with_message(format!("Finished {}", format_time(player.duration())));
    log::info!("Done: {}", source);
    Ok(())
}

fn dump_spectrum(source: &MediaSource, fft_size: u32, out: &Path) -> Result<()> {
    log::info!("Decoding {}...", source);
    let audio = decode::decode_all(source).with_context(|| format!("Failed to decode {}", source))?;
    let dump = analysis::analyze(&audio, &source.to_string(), fft_size)?;

    let file = std::fs::File::create(out)
        .with_context(|| format!("Failed to create {}", out.display()))?;
    serde_json::to_writer(std::io::BufWriter::new(file), &dump)
        .context("Failed to write spectrum JSON")?;

    log::info!("Wrote {} spectra to {}", dump.frames.len(), out.display());
    Ok(())
}

fn spawn_stdin_reader() -> mpsc::Receiver<Command> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let Some(cmd) = parse_command(&line) else {
                log::warn!("Unknown command: {}", line.trim());
                continue;
            };
            if tx.send(cmd).is_err() {
                break;
            }
        }
    });
    rx
}

fn parse_command(line: &str) -> Option<Command> {
    match line.trim() {
        "" | "p" => Some(Command::Toggle),
        "s" => Some(Command::Stop),
        "r" => Some(Command::Restart),
        "q" => Some(Command::Quit),
        _ => None,
    }
}

fn format_time(seconds: f64) -> String {
    let total_secs = seconds.max(0.0) as u64;
    let centis = ((seconds.max(0.0) - total_secs as f64) * 100.0) as u64;
    if total_secs >= 3600 {
        format!("{:02}:{:02}:{:02}.{:02}", total_secs / 3600, (total_secs % 3600) / 60, total_secs % 60, centis)
    } else {
        format!("{:02}:{:02}.{:02}", total_secs / 60, total_secs % 60, centis)
    }
}
