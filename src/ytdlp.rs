//! Audio fetching through the yt-dlp binary.
//!
//! yt-dlp does the heavy lifting: stream selection, download, and MP3
//! extraction via its ffmpeg post-processor. This module shells out, parses
//! the info JSON yt-dlp prints, and renames the artifact to a presentable,
//! sanitized title instead of the tool's `<id>.mp3` default.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::pipeline::PipelineError;
use crate::sanitize::sanitize_filename;

/// Preferred quality for the initial extraction, before any size fitting.
const EXTRACT_QUALITY: &str = "192K";

/// Subset of yt-dlp's info JSON the bot cares about.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackMetadata {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub view_count: Option<u64>,
}

impl TrackMetadata {
    /// Duration when it is usable for bitrate math.
    pub fn known_duration(&self) -> Option<f64> {
        self.duration.filter(|d| *d > 0.0)
    }
}

/// A downloaded audio file plus the metadata the orchestrator needs.
#[derive(Debug)]
pub struct DownloadResult {
    /// Local MP3, already renamed to the sanitized title.
    pub path: PathBuf,
    /// `None` when yt-dlp could not determine a duration.
    pub duration_secs: Option<f64>,
    pub title: String,
}

/// Seam between the orchestrator and the download tool.
#[async_trait]
pub trait AudioFetcher: Send + Sync {
    /// Download the best audio stream for `url` into `dest` as MP3.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<DownloadResult, PipelineError>;
}

/// Production fetcher backed by the yt-dlp binary.
pub struct YtDlpFetcher {
    bin: String,
}

impl YtDlpFetcher {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    /// Fetch metadata only, without downloading. Used by `/info`.
    pub async fn probe(&self, url: &str) -> Result<TrackMetadata, PipelineError> {
        let output = Command::new(&self.bin)
            .args(["-J", "--no-warnings", url])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| PipelineError::Fetch(format!("failed to start {}: {}", self.bin, e)))?;

        if !output.status.success() {
            return Err(PipelineError::Fetch(stderr_excerpt(&output.stderr)));
        }

        parse_info_json(&output.stdout)
    }

    /// Quick startup check that the binary is runnable.
    pub async fn is_available(&self) -> bool {
        Command::new(&self.bin)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl AudioFetcher for YtDlpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<DownloadResult, PipelineError> {
        let template = dest.join("%(id)s.%(ext)s");
        let output = Command::new(&self.bin)
            .args(["-f", "bestaudio/best"])
            .args(["-x", "--audio-format", "mp3"])
            .args(["--audio-quality", EXTRACT_QUALITY])
            .arg("-o")
            .arg(&template)
            .args(["--print-json", "--no-warnings", url])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| PipelineError::Fetch(format!("failed to start {}: {}", self.bin, e)))?;

        if !output.status.success() {
            return Err(PipelineError::Fetch(stderr_excerpt(&output.stderr)));
        }

        let meta = parse_info_json(&output.stdout)?;
        debug!("Downloaded {:?} ({:?}s)", meta.title, meta.duration);

        // The post-processor converts whatever arrived into <id>.mp3.
        let downloaded = dest.join(format!("{}.mp3", meta.id));
        let downloaded = if downloaded.is_file() {
            downloaded
        } else {
            // Some extractors report an id that differs from the one used in
            // the output template. Fall back to whatever MP3 landed in the
            // workspace, which holds only this request's files.
            find_mp3(dest).ok_or_else(|| {
                PipelineError::Fetch(format!("no audio file produced for {}", meta.id))
            })?
        };

        let mut base = sanitize_filename(&meta.title);
        if base.is_empty() {
            base = meta.id.clone();
        }
        let renamed = dest.join(format!("{}.mp3", base));
        if renamed != downloaded {
            tokio::fs::rename(&downloaded, &renamed).await?;
        }

        Ok(DownloadResult {
            path: renamed,
            duration_secs: meta.known_duration(),
            title: meta.title,
        })
    }
}

/// yt-dlp prints one JSON object per downloaded entry; take the first line
/// that parses.
fn parse_info_json(stdout: &[u8]) -> Result<TrackMetadata, PipelineError> {
    let text = String::from_utf8_lossy(stdout);
    text.lines()
        .filter(|l| l.trim_start().starts_with('{'))
        .find_map(|l| serde_json::from_str(l).ok())
        .ok_or_else(|| PipelineError::Fetch("unparseable yt-dlp metadata output".to_string()))
}

fn find_mp3(dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().is_some_and(|e| e == "mp3") {
            return Some(path);
        }
    }
    None
}

/// Last few stderr lines; yt-dlp errors come at the end of a long log.
fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let tail = lines.iter().rev().take(3).rev().cloned().collect::<Vec<_>>().join(" | ");
    if tail.is_empty() {
        warn!("Downloader failed without stderr output");
        "downloader exited with an error".to_string()
    } else {
        tail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_info_json_line() {
        let stdout = br#"{"id":"dQw4w9WgXcQ","title":"Test: Song?","duration":212.5,"thumbnail":"https://i.ytimg.com/x.jpg","uploader":"Channel","view_count":1234567}"#;
        let meta = parse_info_json(stdout).unwrap();
        assert_eq!(meta.id, "dQw4w9WgXcQ");
        assert_eq!(meta.known_duration(), Some(212.5));
        assert_eq!(meta.view_count, Some(1_234_567));
    }

    #[test]
    fn ignores_noise_around_json() {
        let stdout = b"[download] Destination: x\n{\"id\":\"abc\",\"title\":\"t\"}\n";
        let meta = parse_info_json(stdout).unwrap();
        assert_eq!(meta.id, "abc");
        assert_eq!(meta.known_duration(), None);
    }

    #[test]
    fn rejects_empty_output() {
        assert!(parse_info_json(b"").is_err());
    }

    #[test]
    fn zero_duration_is_unknown() {
        let stdout = br#"{"id":"abc","title":"t","duration":0}"#;
        let meta = parse_info_json(stdout).unwrap();
        assert_eq!(meta.known_duration(), None);
    }

    #[test]
    fn stderr_excerpt_keeps_tail() {
        let err = b"warning: a\nwarning: b\nERROR: no video\n";
        let excerpt = stderr_excerpt(err);
        assert!(excerpt.contains("ERROR: no video"));
    }
}
