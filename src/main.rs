//! Tunebot - Entry Point
//!
//! Telegram bot: `/audio <url>` delivers an MP3 that fits the upload limit,
//! `/info <url>` shows track metadata.

use tracing_subscriber::EnvFilter;
use tunebot::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("Tunebot v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage: tunebot");
        println!();
        println!("Environment variables:");
        println!("  TELOXIDE_TOKEN              Bot token (falls back to token.json)");
        println!("  TUNEBOT_TOKEN_FILE          Token file path (default: token.json)");
        println!("  TUNEBOT_WORK_DIR            Workspace base (default: downloads)");
        println!("  TUNEBOT_MAX_UPLOAD_BYTES    Upload ceiling (default: 8 MiB)");
        println!("  TUNEBOT_YTDLP_BIN           Downloader binary (default: yt-dlp)");
        println!("  TUNEBOT_FFMPEG_BIN          Transcoder binary (default: ffmpeg)");
        println!("  TUNEBOT_ALLOWED_HOSTS       Comma-separated accepted hosts");
        println!("  TUNEBOT_WATCH_CHAT_ID       Group for the role watcher (optional)");
        println!("  TUNEBOT_WATCH_TITLE         Admin title to demote (default: muted)");
        println!("  TUNEBOT_WATCH_INTERVAL_SECS Sweep interval (default: 300)");
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tunebot=info,teloxide=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Tunebot v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    tunebot::telegram::run_bot(config).await
}
