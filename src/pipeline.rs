//! Request orchestration: fetch, size check, optional re-encode, deliver.
//!
//! One request moves through `Fetching -> SizeCheck -> (Delivering |
//! Compressing -> Delivering)`; failure is reachable from every step and is
//! reported as exactly one user-facing message. All files live inside a
//! [`RequestWorkspace`](crate::workspace::RequestWorkspace) so cleanup is a
//! drop, not a code path anyone can forget.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::bitrate::calculate_bitrate;
use crate::config::Config;
use crate::ffmpeg::{CompressionJob, Transcoder};
use crate::workspace::RequestWorkspace;
use crate::ytdlp::AudioFetcher;

/// Orchestration failures, one variant per user-distinguishable cause.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("not a recognized video URL: {0}")]
    InvalidUrl(String),
    #[error("download failed: {0}")]
    Fetch(String),
    #[error("could not determine the audio duration, so the re-encode cannot be sized")]
    UnknownDuration,
    #[error("re-encoding failed: {0}")]
    Compression(String),
    #[error("upload failed: {0}")]
    Delivery(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// One-line message shown to the requester.
    pub fn user_message(&self) -> String {
        format!("❌ {}", self)
    }
}

/// Progress points surfaced to the requester while a request runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Downloading,
    Compressing,
    Uploading,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Downloading => "⬇️ Downloading audio...",
            Stage::Compressing => "🔧 Compressing audio to fit the upload limit...",
            Stage::Uploading => "⬆️ Uploading audio...",
        }
    }
}

/// What to do with a fetched file of a given size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeDecision {
    /// Fits as-is.
    DeliverOriginal,
    /// Too big, duration known: re-encode at this rate.
    Compress { bitrate_kbps: u32 },
    /// Too big and the duration is unusable; fail instead of delivering an
    /// oversized file.
    RejectUnknownDuration,
}

/// Pure sizing decision, separated from the IO around it.
pub fn decide(size_bytes: u64, limit_bytes: u64, duration_secs: Option<f64>) -> SizeDecision {
    if size_bytes <= limit_bytes {
        return SizeDecision::DeliverOriginal;
    }
    match duration_secs {
        Some(d) if d > 0.0 => SizeDecision::Compress {
            bitrate_kbps: calculate_bitrate(limit_bytes, d),
        },
        _ => SizeDecision::RejectUnknownDuration,
    }
}

/// Validate that `raw` is an http(s) URL on an accepted host. Subdomains of
/// an accepted host are accepted too. Runs before any file operation.
pub fn validate_url(raw: &str, allowed_hosts: &[String]) -> Result<Url, PipelineError> {
    let url = Url::parse(raw).map_err(|_| PipelineError::InvalidUrl(raw.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(PipelineError::InvalidUrl(raw.to_string()));
    }
    let host = url
        .host_str()
        .ok_or_else(|| PipelineError::InvalidUrl(raw.to_string()))?;
    let accepted = allowed_hosts
        .iter()
        .any(|h| host == h || host.ends_with(&format!(".{}", h)));
    if !accepted {
        return Err(PipelineError::InvalidUrl(raw.to_string()));
    }
    Ok(url)
}

/// Where finished audio goes: progress notifications and the file upload
/// itself. Implemented by the Telegram layer and by test doubles.
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn progress(&self, stage: Stage) -> Result<(), PipelineError>;
    async fn deliver(&self, file: &Path, title: &str) -> Result<(), PipelineError>;
}

/// Summary of a successful request, mostly for logging and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivered {
    pub title: String,
    pub compressed: bool,
    pub bitrate_kbps: Option<u32>,
}

/// Run one audio request end to end.
///
/// The workspace guard owns every file this request creates, so each early
/// return below releases exactly the resources acquired so far.
pub async fn process_request<F, T, S>(
    config: &Config,
    url: &str,
    fetcher: &F,
    transcoder: &T,
    sink: &S,
) -> Result<Delivered, PipelineError>
where
    F: AudioFetcher + ?Sized,
    T: Transcoder + ?Sized,
    S: AudioSink + ?Sized,
{
    validate_url(url, &config.allowed_hosts)?;

    let workspace = RequestWorkspace::create(&config.work_dir)?;

    sink.progress(Stage::Downloading).await?;
    let download = fetcher.fetch(url, workspace.root()).await?;

    let size = tokio::fs::metadata(&download.path).await?.len();
    info!("Fetched {:?}: {} bytes", download.title, size);

    match decide(size, config.max_upload_bytes, download.duration_secs) {
        SizeDecision::DeliverOriginal => {
            sink.progress(Stage::Uploading).await?;
            sink.deliver(&download.path, &download.title).await?;
            Ok(Delivered {
                title: download.title,
                compressed: false,
                bitrate_kbps: None,
            })
        }

        SizeDecision::RejectUnknownDuration => Err(PipelineError::UnknownDuration),

        SizeDecision::Compress { bitrate_kbps } => {
            sink.progress(Stage::Compressing).await?;

            let file_name = download
                .path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("audio.mp3");
            let job = CompressionJob {
                input: download.path.clone(),
                output: workspace.file(&format!("compressed_{}", file_name)),
                bitrate_kbps,
            };
            transcoder.transcode(&job).await?;

            sink.progress(Stage::Uploading).await?;
            sink.deliver(&job.output, &download.title).await?;
            info!("Delivered {:?} re-encoded at {}k", download.title, bitrate_kbps);
            Ok(Delivered {
                title: download.title,
                compressed: true,
                bitrate_kbps: Some(bitrate_kbps),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts() -> Vec<String> {
        vec!["youtube.com".to_string(), "youtu.be".to_string()]
    }

    #[test]
    fn small_file_is_delivered_as_is() {
        let decision = decide(5_000_000, 8 * 1024 * 1024, Some(600.0));
        assert_eq!(decision, SizeDecision::DeliverOriginal);
    }

    #[test]
    fn file_at_exact_limit_is_delivered_as_is() {
        let limit = 8 * 1024 * 1024;
        assert_eq!(decide(limit, limit, None), SizeDecision::DeliverOriginal);
    }

    #[test]
    fn oversized_with_unknown_duration_is_rejected() {
        assert_eq!(
            decide(12_000_000, 8 * 1024 * 1024, Some(0.0)),
            SizeDecision::RejectUnknownDuration
        );
        assert_eq!(
            decide(12_000_000, 8 * 1024 * 1024, None),
            SizeDecision::RejectUnknownDuration
        );
    }

    #[test]
    fn oversized_with_duration_gets_bitrate() {
        match decide(12_000_000, 8 * 1024 * 1024, Some(600.0)) {
            SizeDecision::Compress { bitrate_kbps } => assert_eq!(bitrate_kbps, 106),
            other => panic!("expected compression, got {:?}", other),
        }
    }

    #[test]
    fn accepts_known_hosts_and_subdomains() {
        for url in [
            "https://youtube.com/watch?v=abc",
            "https://www.youtube.com/watch?v=abc",
            "https://music.youtube.com/watch?v=abc",
            "https://youtu.be/abc",
            "http://m.youtube.com/watch?v=abc",
        ] {
            assert!(validate_url(url, &hosts()).is_ok(), "rejected {}", url);
        }
    }

    #[test]
    fn rejects_foreign_and_malformed_urls() {
        for url in [
            "https://example.com/watch?v=abc",
            "https://notyoutube.com/x",
            "https://youtube.com.evil.org/x",
            "ftp://youtube.com/x",
            "not a url",
            "",
        ] {
            assert!(validate_url(url, &hosts()).is_err(), "accepted {}", url);
        }
    }
}
