//! Tunebot
//!
//! Telegram bot that turns video links into MP3s delivered in the chat.
//!
//! # Features
//!
//! - **Audio Fetch**: `/audio <url>` downloads the best audio stream via yt-dlp
//! - **Size Fitting**: re-encodes with ffmpeg at a computed bitrate when the
//!   file exceeds the 8 MiB upload limit
//! - **Metadata Cards**: `/info <url>` replies with title, duration, channel,
//!   views and thumbnail without downloading
//! - **Scoped Workspaces**: every request gets its own temp directory,
//!   removed on completion or failure
//! - **Role Watch**: optional background sweep that demotes admins carrying a
//!   configured custom title
//!
//! # Architecture
//!
//! ```text
//! Telegram ──► Dispatcher ──► Pipeline ──► yt-dlp (fetch + metadata)
//!               (teloxide)       │
//!                                ├── Bitrate calculator
//!                                ├── ffmpeg (re-encode)
//!                                └── Workspace (scoped temp dir)
//! ```

pub mod bitrate;
pub mod config;
pub mod ffmpeg;
pub mod pipeline;
pub mod rolewatch;
pub mod sanitize;
pub mod telegram;
pub mod workspace;
pub mod ytdlp;

#[cfg(test)]
mod telegram_tests;

pub use bitrate::calculate_bitrate;
pub use config::Config;
pub use ffmpeg::{CompressionJob, FfmpegTranscoder, Transcoder};
pub use pipeline::{AudioSink, Delivered, PipelineError, SizeDecision, Stage};
pub use sanitize::sanitize_filename;
pub use workspace::RequestWorkspace;
pub use ytdlp::{AudioFetcher, DownloadResult, TrackMetadata, YtDlpFetcher};
