//! Discord -> Minecraft live chat bridge.
//!
//! Messages in the configured console channel are sanitized, rate limited per
//! user, and relayed as a `say` command on the server console.

use std::sync::Arc;
use std::time::Duration;

use hopper_exaroton::stream::StreamHandle;
use hopper_exaroton::ttl::TtlCache;
use poise::serenity_prelude as serenity;
use poise::serenity_prelude::Message;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error};

pub const MAX_MESSAGE_LENGTH: usize = 200;
pub const MAX_NAME_LENGTH: usize = 32;

/// Per-user cooldown map keyed by Discord user id.
#[derive(Debug)]
pub struct ChatCooldowns {
    recent: Mutex<TtlCache<u64>>,
}

impl ChatCooldowns {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            recent: Mutex::new(TtlCache::new(cooldown)),
        }
    }

    /// True if the user may send now; records the attempt when allowed.
    pub async fn check(&self, user_id: u64, now: Instant) -> bool {
        let mut recent = self.recent.lock().await;
        if recent.contains(&user_id, now) {
            return false;
        }
        recent.insert(user_id, now);
        true
    }
}

/// Collapse whitespace, strip control characters, and cap length.
pub fn sanitize_text(value: &str, max_length: usize) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .filter(|c| !c.is_control())
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(max_length).collect()
}

pub struct BridgeContext<'a> {
    pub stream: &'a StreamHandle,
    pub cooldowns: &'a ChatCooldowns,
    pub console_channel_id: u64,
}

/// Handle one guild message; relays it to the server console when it lands
/// in the bridged channel.
pub async fn handle_message(
    ctx: &serenity::Context,
    message: &Message,
    bridge: BridgeContext<'_>,
) {
    if message.guild_id.is_none() {
        return;
    }
    if message.author.bot || message.webhook_id.is_some() {
        return;
    }
    if message.channel_id.get() != bridge.console_channel_id {
        return;
    }

    let content = sanitize_text(&message.content, MAX_MESSAGE_LENGTH);
    if content.is_empty() {
        return;
    }

    if !bridge
        .cooldowns
        .check(message.author.id.get(), Instant::now())
        .await
    {
        return;
    }

    let display_name = message
        .member
        .as_ref()
        .and_then(|m| m.nick.as_deref())
        .unwrap_or(&message.author.name);
    let display_name = sanitize_text(display_name, MAX_NAME_LENGTH);
    let display_name = if display_name.is_empty() {
        "Player".to_string()
    } else {
        display_name
    };

    let command = format!("say [Discord] {display_name}: {content}");
    let sent = bridge.stream.send_console_command(&command);
    debug!(
        user = %message.author.id,
        sent,
        "live chat Discord->MC from {display_name}: {content}"
    );

    if !sent {
        match message
            .reply(
                &ctx.http,
                "Unable to send to the server right now. Try again in a moment.",
            )
            .await
        {
            Ok(reply) => {
                let http = ctx.http.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    let _ = reply.delete(&http).await;
                });
            }
            Err(err) => error!("failed to send live chat failure notice: {err}"),
        }
    }
}

/// Relay an in-game chat line to the bridged Discord channel.
pub async fn relay_chat_line(
    http: &Arc<serenity::Http>,
    console_channel_id: u64,
    player: &str,
    text: &str,
) {
    let channel = serenity::ChannelId::new(console_channel_id);
    let content = format!("<{player}> {text}");
    if let Err(err) = channel
        .send_message(http, serenity::CreateMessage::new().content(&content))
        .await
    {
        error!("failed to relay chat line to Discord: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_collapses_whitespace_and_strips_control() {
        assert_eq!(sanitize_text("  hello\r\nworld  ", 200), "hello world");
        assert_eq!(sanitize_text("a\u{0000}b\u{001F}c", 200), "abc");
        assert_eq!(sanitize_text("\t \n ", 200), "");
    }

    #[test]
    fn test_sanitize_caps_length() {
        let long = "x".repeat(300);
        assert_eq!(sanitize_text(&long, 200).len(), 200);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_per_user() {
        let cooldowns = ChatCooldowns::new(Duration::from_millis(1500));
        let now = Instant::now();
        assert!(cooldowns.check(1, now).await);
        assert!(!cooldowns.check(1, now + Duration::from_millis(500)).await);
        // Different user is unaffected.
        assert!(cooldowns.check(2, now + Duration::from_millis(500)).await);
        // Window expired.
        assert!(cooldowns.check(1, now + Duration::from_millis(1600)).await);
    }
}
