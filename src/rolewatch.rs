//! Background admin-title watcher.
//!
//! Periodically sweeps one configured group's administrator list; any admin
//! carrying the configured custom title is demoted and the chat is notified.
//! Runs as its own task: sweep errors are logged and the loop keeps going,
//! and nothing here can affect in-flight audio requests.

use chrono::Utc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::ChatMemberKind;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::config::Config;

pub struct RoleWatch {
    bot: Bot,
    chat_id: ChatId,
    title: String,
    interval: Duration,
}

impl RoleWatch {
    /// Build the watcher when a chat is configured; `None` disables it.
    pub fn from_config(bot: Bot, config: &Config) -> Option<Self> {
        let chat_id = config.watch_chat_id?;
        Some(Self {
            bot,
            chat_id: ChatId(chat_id),
            title: config.watch_title.clone(),
            interval: Duration::from_secs(config.watch_interval_secs.max(10)),
        })
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = self.sweep().await {
                warn!("Role sweep of chat {} failed: {}", self.chat_id, e);
            }
        }
    }

    /// One pass over the admin list.
    async fn sweep(&self) -> anyhow::Result<()> {
        let admins = self.bot.get_chat_administrators(self.chat_id).await?;

        for member in admins {
            let ChatMemberKind::Administrator(ref admin) = member.kind else {
                continue;
            };
            if admin.custom_title.as_deref() != Some(self.title.as_str()) {
                continue;
            }
            // The API only lets us touch admins this bot promoted.
            if !admin.can_be_edited {
                warn!(
                    "Found title {:?} on {} but cannot edit that admin",
                    self.title, member.user.id
                );
                continue;
            }

            info!("Demoting {} (title {:?})", member.user.id, self.title);
            self.demote(member.user.id).await?;

            let name = member
                .user
                .username
                .as_deref()
                .map(|u| format!("@{}", u))
                .unwrap_or_else(|| member.user.full_name());
            self.bot
                .send_message(
                    self.chat_id,
                    format!(
                        "Removed admin rights from {} (title {:?}) at {}",
                        name,
                        self.title,
                        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
                    ),
                )
                .await?;
        }

        Ok(())
    }

    /// Demotion is promoteChatMember with every capability withdrawn.
    async fn demote(&self, user_id: UserId) -> anyhow::Result<()> {
        self.bot
            .promote_chat_member(self.chat_id, user_id)
            .can_manage_chat(false)
            .can_change_info(false)
            .can_delete_messages(false)
            .can_invite_users(false)
            .can_restrict_members(false)
            .can_pin_messages(false)
            .can_promote_members(false)
            .await?;
        Ok(())
    }
}
