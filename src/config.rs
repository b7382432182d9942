//! Configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Default upload ceiling imposed by the delivery channel.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 8 * 1024 * 1024;

/// Bot configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot token
    pub bot_token: String,

    /// Base directory for per-request workspaces
    pub work_dir: PathBuf,

    /// Largest file the bot will deliver without re-encoding
    pub max_upload_bytes: u64,

    /// Downloader binary (yt-dlp)
    pub ytdlp_bin: String,

    /// Transcoder binary (ffmpeg)
    pub ffmpeg_bin: String,

    /// Hosts accepted by the URL check; subdomains included
    pub allowed_hosts: Vec<String>,

    /// Group whose admin list the role watcher sweeps (disabled when unset)
    pub watch_chat_id: Option<i64>,

    /// Admin custom title the watcher demotes on sight
    pub watch_title: String,

    /// Seconds between role watcher sweeps
    pub watch_interval_secs: u64,
}

impl Config {
    /// Load configuration from environment variables, bootstrapping the bot
    /// token from `token.json` (prompting on first run) when the environment
    /// does not provide one.
    pub fn from_env() -> Result<Self> {
        let work_dir = std::env::var("TUNEBOT_WORK_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("downloads"));

        let token_file = std::env::var("TUNEBOT_TOKEN_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("token.json"));

        let bot_token = match std::env::var("TELOXIDE_TOKEN") {
            Ok(t) if !t.trim().is_empty() => t,
            _ => load_or_prompt_token(&token_file)?,
        };

        let max_upload_bytes = std::env::var("TUNEBOT_MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        let ytdlp_bin = std::env::var("TUNEBOT_YTDLP_BIN").unwrap_or_else(|_| "yt-dlp".to_string());
        let ffmpeg_bin = std::env::var("TUNEBOT_FFMPEG_BIN").unwrap_or_else(|_| "ffmpeg".to_string());

        let allowed_hosts = std::env::var("TUNEBOT_ALLOWED_HOSTS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| vec!["youtube.com".to_string(), "youtu.be".to_string()]);

        let watch_chat_id = std::env::var("TUNEBOT_WATCH_CHAT_ID")
            .ok()
            .and_then(|v| v.parse().ok());

        let watch_title =
            std::env::var("TUNEBOT_WATCH_TITLE").unwrap_or_else(|_| "muted".to_string());

        let watch_interval_secs = std::env::var("TUNEBOT_WATCH_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(300);

        Ok(Self {
            bot_token,
            work_dir,
            max_upload_bytes,
            ytdlp_bin,
            ffmpeg_bin,
            allowed_hosts,
            watch_chat_id,
            watch_title,
            watch_interval_secs,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenFile {
    token: String,
}

/// Read the bot token from `path`, prompting on stdin and persisting the
/// file when it is missing. An unreadable file is removed and re-prompted
/// rather than left to fail on every start.
fn load_or_prompt_token(path: &Path) -> Result<String> {
    if path.exists() {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        match serde_json::from_str::<TokenFile>(&raw) {
            Ok(f) if !f.token.trim().is_empty() => return Ok(f.token),
            _ => {
                tracing::warn!("Invalid token file {}, recreating", path.display());
                std::fs::remove_file(path).ok();
            }
        }
    }

    let token = prompt_token()?;
    let file = TokenFile { token: token.clone() };
    std::fs::write(path, serde_json::to_string(&file)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Token saved to {}", path.display());
    Ok(token)
}

fn prompt_token() -> Result<String> {
    print!("Please enter your Telegram bot token: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("Failed to read token from stdin")?;
    let token = line.trim().to_string();
    anyhow::ensure!(!token.is_empty(), "Empty bot token");
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn reads_existing_token_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, r#"{"token":"123:abc"}"#).unwrap();
        assert_eq!(load_or_prompt_token(&path).unwrap(), "123:abc");
    }

    #[test]
    fn token_file_roundtrip() {
        let file = TokenFile { token: "123:abc".into() };
        let json = serde_json::to_string(&file).unwrap();
        let back: TokenFile = serde_json::from_str(&json).unwrap();
        assert_eq!(back.token, "123:abc");
    }
}
