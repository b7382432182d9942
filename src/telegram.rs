//! Telegram integration.
//!
//! Wires the audio pipeline to a bot account: command parsing, progress
//! messages edited in place, file delivery, and the metadata card for
//! `/info`. Failures are converted to a single user-facing message at this
//! boundary and never crash the process.
//!
//! Uses explicit Dispatcher pattern for reliable message polling.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use teloxide::{
    dispatching::{Dispatcher, UpdateFilterExt},
    dptree,
    error_handlers::LoggingErrorHandler,
    prelude::*,
    types::{InputFile, MessageId, ParseMode, Update},
    utils::command::BotCommands,
    utils::html,
};
use tokio::sync::Mutex;
use url::Url;

use crate::config::Config;
use crate::ffmpeg::FfmpegTranscoder;
use crate::pipeline::{self, AudioSink, PipelineError, Stage};
use crate::rolewatch::RoleWatch;
use crate::ytdlp::YtDlpFetcher;

/// Shared per-process state handed to every handler through dptree.
pub struct AppContext {
    pub config: Config,
    pub fetcher: YtDlpFetcher,
    pub transcoder: FfmpegTranscoder,
}

#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "show the welcome message")]
    Start,
    #[command(description = "show this help")]
    Help,
    #[command(description = "fetch audio from a video URL")]
    Audio(String),
    #[command(description = "show metadata for a video URL")]
    Info(String),
}

/// Run the bot until the process is stopped.
pub async fn run_bot(config: Config) -> Result<()> {
    tracing::info!("===========================================");
    tracing::info!("  Tunebot - Starting...");
    tracing::info!("===========================================");
    tracing::info!("Working directory: {:?}", config.work_dir);
    tracing::info!("Upload limit: {} bytes", config.max_upload_bytes);
    tracing::info!("Accepted hosts: {:?}", config.allowed_hosts);

    tokio::fs::create_dir_all(&config.work_dir).await?;

    let bot = Bot::new(config.bot_token.clone());

    // Verify bot token by calling getMe
    tracing::info!("Verifying bot token...");
    match bot.get_me().await {
        Ok(me) => {
            tracing::info!(
                "Bot authenticated: @{} (ID: {})",
                me.username.as_deref().unwrap_or("unknown"),
                me.id
            );
        }
        Err(e) => {
            tracing::error!("Failed to authenticate bot: {}", e);
            anyhow::bail!("Bot authentication failed: {}", e);
        }
    }

    // Delete any existing webhook to ensure polling works
    if let Err(e) = bot.delete_webhook().await {
        tracing::warn!("Failed to delete webhook: {} (continuing anyway)", e);
    }

    let fetcher = YtDlpFetcher::new(config.ytdlp_bin.clone());
    let transcoder = FfmpegTranscoder::new(config.ffmpeg_bin.clone());

    // The pipeline cannot work without its external tools; say so up front
    // instead of failing on the first request.
    if !fetcher.is_available().await {
        tracing::error!("{} not found! Audio requests will fail", config.ytdlp_bin);
    }
    if !transcoder.is_available().await {
        tracing::error!("{} not found! Oversized audio cannot be re-encoded", config.ffmpeg_bin);
    }

    if let Some(watch) = RoleWatch::from_config(bot.clone(), &config) {
        tracing::info!(
            "Role watch enabled: chat {} / title {:?} every {}s",
            config.watch_chat_id.unwrap_or_default(),
            config.watch_title,
            config.watch_interval_secs
        );
        watch.spawn();
    }

    let ctx = Arc::new(AppContext {
        config,
        fetcher,
        transcoder,
    });

    let handler = dptree::entry().branch(
        Update::filter_message()
            .filter_command::<Command>()
            .endpoint(command_handler),
    );

    tracing::info!("Starting dispatcher with long polling...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![ctx])
        .default_handler(|upd| async move {
            tracing::debug!("Unhandled update: {:?}", upd);
        })
        .error_handler(LoggingErrorHandler::with_custom_text(
            "Error in message handler",
        ))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    tracing::warn!("Dispatcher stopped");
    Ok(())
}

async fn command_handler(
    bot: Bot,
    msg: Message,
    cmd: Command,
    ctx: Arc<AppContext>,
) -> ResponseResult<()> {
    let chat_id = msg.chat.id;
    tracing::info!(">>> Command: chat={}, cmd={:?}", chat_id, cmd);

    match cmd {
        Command::Start | Command::Help => {
            bot.send_message(chat_id, Command::descriptions().to_string())
                .await?;
        }
        Command::Audio(url) => {
            if let Err(e) = handle_audio(&bot, chat_id, url.trim(), &ctx).await {
                tracing::error!("Audio request failed: {}", e);
            }
        }
        Command::Info(url) => {
            if let Err(e) = handle_info(&bot, chat_id, url.trim(), &ctx).await {
                tracing::error!("Info request failed: {}", e);
            }
        }
    }

    Ok(())
}

async fn handle_audio(bot: &Bot, chat_id: ChatId, url: &str, ctx: &AppContext) -> Result<()> {
    if url.is_empty() {
        bot.send_message(chat_id, "Usage: /audio <video URL>").await?;
        return Ok(());
    }

    let sink = TelegramSink::new(bot.clone(), chat_id);

    match pipeline::process_request(&ctx.config, url, &ctx.fetcher, &ctx.transcoder, &sink).await {
        Ok(delivered) => {
            tracing::info!(
                "Delivered {:?} (compressed: {})",
                delivered.title,
                delivered.compressed
            );
            sink.finish().await;
        }
        Err(e) => {
            tracing::warn!("Request for {} failed: {}", url, e);
            sink.fail(&e.user_message()).await;
        }
    }

    Ok(())
}

async fn handle_info(bot: &Bot, chat_id: ChatId, url: &str, ctx: &AppContext) -> Result<()> {
    if url.is_empty() {
        bot.send_message(chat_id, "Usage: /info <video URL>").await?;
        return Ok(());
    }

    if let Err(e) = pipeline::validate_url(url, &ctx.config.allowed_hosts) {
        bot.send_message(chat_id, e.user_message()).await?;
        return Ok(());
    }

    match ctx.fetcher.probe(url).await {
        Ok(meta) => {
            let caption = format!(
                "<b>{}</b>\nDuration: {}\nChannel: {}\nViews: {}",
                html::escape(&meta.title),
                format_duration(meta.duration.unwrap_or(0.0) as u64),
                html::escape(meta.uploader.as_deref().unwrap_or("Unknown")),
                format_view_count(meta.view_count.unwrap_or(0)),
            );

            let thumbnail = meta.thumbnail.as_deref().and_then(|t| Url::parse(t).ok());
            match thumbnail {
                Some(thumb) => {
                    bot.send_photo(chat_id, InputFile::url(thumb))
                        .caption(caption)
                        .parse_mode(ParseMode::Html)
                        .await?;
                }
                None => {
                    bot.send_message(chat_id, caption)
                        .parse_mode(ParseMode::Html)
                        .await?;
                }
            }
        }
        Err(e) => {
            bot.send_message(chat_id, e.user_message()).await?;
        }
    }

    Ok(())
}

/// Delivery side of the pipeline: one status message edited through the
/// stages, then the audio file itself.
struct TelegramSink {
    bot: Bot,
    chat_id: ChatId,
    status: Mutex<Option<MessageId>>,
}

impl TelegramSink {
    fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self {
            bot,
            chat_id,
            status: Mutex::new(None),
        }
    }

    /// Remove the status message once the audio has been delivered.
    async fn finish(&self) {
        if let Some(id) = self.status.lock().await.take() {
            if let Err(e) = self.bot.delete_message(self.chat_id, id).await {
                tracing::debug!("Could not delete status message: {}", e);
            }
        }
    }

    /// Replace the status message with the failure text, or send it fresh
    /// when the request failed before any progress was reported.
    async fn fail(&self, text: &str) {
        let existing = self.status.lock().await.take();
        let result = match existing {
            Some(id) => self
                .bot
                .edit_message_text(self.chat_id, id, text)
                .await
                .map(|_| ()),
            None => self.bot.send_message(self.chat_id, text).await.map(|_| ()),
        };
        if let Err(e) = result {
            tracing::warn!("Could not report failure to chat {}: {}", self.chat_id, e);
        }
    }
}

#[async_trait::async_trait]
impl AudioSink for TelegramSink {
    async fn progress(&self, stage: Stage) -> Result<(), PipelineError> {
        let mut status = self.status.lock().await;
        match *status {
            Some(id) => {
                self.bot
                    .edit_message_text(self.chat_id, id, stage.label())
                    .await
                    .map_err(|e| PipelineError::Delivery(e.to_string()))?;
            }
            None => {
                let msg = self
                    .bot
                    .send_message(self.chat_id, stage.label())
                    .await
                    .map_err(|e| PipelineError::Delivery(e.to_string()))?;
                *status = Some(msg.id);
            }
        }
        Ok(())
    }

    async fn deliver(&self, file: &Path, _title: &str) -> Result<(), PipelineError> {
        self.bot
            .send_audio(self.chat_id, InputFile::file(file.to_path_buf()))
            .await
            .map_err(|e| PipelineError::Delivery(e.to_string()))?;
        Ok(())
    }
}

/// `HH:MM:SS` rendering for track durations.
pub(crate) fn format_duration(total_secs: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        total_secs / 3600,
        (total_secs % 3600) / 60,
        total_secs % 60
    )
}

/// Thousands separators for view counts.
pub(crate) fn format_view_count(count: u64) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
