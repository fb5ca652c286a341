use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use symphonia::core::io::MediaSource as SymphoniaSource;

use crate::error::{PlayerError, Result};

/// Where a playback session reads its media from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MediaSource {
    Local(PathBuf),
    Remote(String),
}

impl MediaSource {
    /// `http(s)://` becomes a remote source, `file://` is stripped, anything
    /// else is taken as a local path.
    pub fn parse(locator: &str) -> Self {
        let lower = locator.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return MediaSource::Remote(locator.to_string());
        }
        let path = locator.strip_prefix("file://").unwrap_or(locator);
        MediaSource::Local(PathBuf::from(path))
    }

    /// File extension used as a probe hint, if the locator has one.
    pub fn extension_hint(&self) -> Option<String> {
        match self {
            MediaSource::Local(path) => path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase()),
            MediaSource::Remote(url) => {
                let path = url.split(['?', '#']).next().unwrap_or(url);
                let last = path.rsplit('/').next().unwrap_or(path);
                Path::new(last)
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.to_ascii_lowercase())
            }
        }
    }

    /// Open the source for probing. Remote bodies are buffered in memory so the
    /// demuxer can seek.
    pub fn open(&self) -> Result<Box<dyn SymphoniaSource>> {
        match self {
            MediaSource::Local(path) => {
                let file = std::fs::File::open(path).map_err(|source| PlayerError::Open {
                    path: path.display().to_string(),
                    source,
                })?;
                Ok(Box::new(file))
            }
            MediaSource::Remote(url) => {
                log::info!("Fetching {}", url);
                let response = reqwest::blocking::get(url.as_str())?;
                let status = response.status();
                if !status.is_success() {
                    return Err(PlayerError::HttpStatus {
                        url: url.clone(),
                        status: status.as_u16(),
                    });
                }
                let body = response.bytes()?.to_vec();
                log::debug!("Fetched {} bytes from {}", body.len(), url);
                Ok(Box::new(Cursor::new(body)))
            }
        }
    }
}

impl fmt::Display for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaSource::Local(path) => write!(f, "{}", path.display()),
            MediaSource::Remote(url) => f.write_str(url),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    /// Answer a single HTTP request with `status` and `body`; returns the URL.
    pub(crate) fn serve_once(status: &str, body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let status = status.to_string();
        std::thread::spawn(move || {
            let Ok((mut conn, _)) = listener.accept() else {
                return;
            };
            let mut request = Vec::new();
            let mut byte = [0u8; 1];
            while !request.ends_with(b"\r\n\r\n") {
                match conn.read(&mut byte) {
                    Ok(1) => request.push(byte[0]),
                    _ => break,
                }
            }
            let header = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                body.len()
            );
            let _ = conn.write_all(header.as_bytes());
            let _ = conn.write_all(&body);
            let _ = conn.flush();
        });
        format!("http://{}/media/tone.wav", addr)
    }

    #[test]
    fn parses_remote_urls() {
        assert_eq!(
            MediaSource::parse("https://example.com/a.mp3"),
            MediaSource::Remote("https://example.com/a.mp3".into())
        );
        assert_eq!(
            MediaSource::parse("HTTP://example.com/a.mp3"),
            MediaSource::Remote("HTTP://example.com/a.mp3".into())
        );
    }

    #[test]
    fn parses_local_paths() {
        assert_eq!(
            MediaSource::parse("file:///tmp/song.flac"),
            MediaSource::Local(PathBuf::from("/tmp/song.flac"))
        );
        assert_eq!(
            MediaSource::parse("music/song.wav"),
            MediaSource::Local(PathBuf::from("music/song.wav"))
        );
    }

    #[test]
    fn extension_hint_ignores_query() {
        let src = MediaSource::parse("https://cdn.example.com/track.OGG?token=abc");
        assert_eq!(src.extension_hint().as_deref(), Some("ogg"));
        let none = MediaSource::parse("https://cdn.example.com/stream");
        assert_eq!(none.extension_hint(), None);
    }

    #[test]
    fn missing_file_reports_path() {
        let src = MediaSource::parse("/definitely/not/here.wav");
        let err = src.open().err().map(|e| e.to_string()).unwrap_or_default();
        assert!(err.contains("/definitely/not/here.wav"));
    }

    #[test]
    fn remote_body_is_fetched_and_decoded() {
        let dir = tempfile::tempdir().unwrap();
        let path =
            crate::audio::decode::tests::write_sine_wav(dir.path(), "r.wav", 8000, 1, 800, 440.0);
        let url = serve_once("200 OK", std::fs::read(&path).unwrap());

        let src = MediaSource::parse(&url);
        assert_eq!(src.extension_hint().as_deref(), Some("wav"));
        let audio = crate::audio::decode::decode_all(&src).unwrap();
        assert_eq!(audio.frames(), 800);
        assert_eq!(audio.format.sample_rate, 8000);
    }

    #[test]
    fn remote_error_status_is_reported() {
        let url = serve_once("404 Not Found", b"gone".to_vec());
        match MediaSource::parse(&url).open() {
            Err(PlayerError::HttpStatus { url: failed, status }) => {
                assert_eq!(status, 404);
                assert_eq!(failed, url);
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("404 must not open"),
        }
    }
}
