//! Live status embed: one message per channel, edited in place.

use std::sync::Arc;

use hopper_exaroton::protocol::{ServerStatus, status_label};
use hopper_exaroton::roster::RosterTracker;
use poise::serenity_prelude as serenity;
use poise::serenity_prelude::{
    ChannelId, CreateEmbed, CreateMessage, EditMessage, GetMessages, MessageId, Timestamp, UserId,
};
use tracing::{debug, error};

pub const PANEL_TITLE: &str = "Server Status";

const NEUTRAL_COLOR: u32 = 0x95a5a6;
const PLAYERS_VALUE_LIMIT: usize = 1000;

/// `Players` field body: count label on one line, the name list on the next,
/// truncated to Discord's field limit.
pub fn players_value(tracker: &RosterTracker) -> String {
    let count_label = tracker.count_label();
    let names: Vec<&str> = tracker
        .snapshot()
        .map(|s| s.players.iter().map(|n| n.as_str()).collect())
        .unwrap_or_default();
    if names.is_empty() {
        return format!("{count_label}\nNone");
    }
    let mut list = names.join(", ");
    if list.len() > PLAYERS_VALUE_LIMIT {
        let mut cut = PLAYERS_VALUE_LIMIT - 3;
        while !list.is_char_boundary(cut) {
            cut -= 1;
        }
        list.truncate(cut);
        list.push_str("...");
    }
    format!("{count_label}\n{list}")
}

pub fn build_embed(tracker: &RosterTracker) -> CreateEmbed {
    let status = tracker.snapshot().and_then(|s| s.status);
    let color = status
        .and_then(ServerStatus::from_code)
        .map(ServerStatus::color)
        .unwrap_or(NEUTRAL_COLOR);
    let address = tracker
        .snapshot()
        .and_then(|s| s.address.clone())
        .unwrap_or_else(|| "unknown".to_string());
    CreateEmbed::default()
        .title(PANEL_TITLE)
        .color(color)
        .field("Status", status_label(status), true)
        .field("Players", players_value(tracker), false)
        .field("Address", address, true)
        .timestamp(Timestamp::now())
}

/// Tracks the bot's status message in one channel, creating it on first use
/// and re-adopting an existing one after a restart.
#[derive(Debug)]
pub struct StatusPanel {
    channel: ChannelId,
    bot_user: UserId,
    message_id: Option<MessageId>,
}

impl StatusPanel {
    pub fn new(channel_id: u64, bot_user: UserId) -> Self {
        Self {
            channel: ChannelId::new(channel_id),
            bot_user,
            message_id: None,
        }
    }

    pub async fn update(&mut self, http: &Arc<serenity::Http>, tracker: &RosterTracker) {
        let embed = build_embed(tracker);
        if let Some(id) = self.message_id {
            match self
                .channel
                .edit_message(http, id, EditMessage::new().embed(embed.clone()))
                .await
            {
                Ok(_) => return,
                Err(err) => {
                    debug!("status embed edit failed, re-locating: {err}");
                    self.message_id = None;
                }
            }
        }

        if let Some(existing) = self.find_existing(http).await {
            self.message_id = Some(existing);
            if let Err(err) = self
                .channel
                .edit_message(http, existing, EditMessage::new().embed(embed))
                .await
            {
                error!("failed to update status embed: {err}");
                self.message_id = None;
            }
            return;
        }

        match self
            .channel
            .send_message(http, CreateMessage::new().embed(embed))
            .await
        {
            Ok(sent) => self.message_id = Some(sent.id),
            Err(err) => error!("failed to create status embed: {err}"),
        }
    }

    /// Scan the last 50 messages for an embed of ours with the panel title.
    async fn find_existing(&self, http: &Arc<serenity::Http>) -> Option<MessageId> {
        let recent = self
            .channel
            .messages(http, GetMessages::new().limit(50))
            .await
            .inspect_err(|err| error!("failed to find status embed message: {err}"))
            .ok()?;
        recent
            .iter()
            .find(|msg| {
                msg.author.id == self.bot_user
                    && msg
                        .embeds
                        .first()
                        .and_then(|e| e.title.as_deref())
                        .is_some_and(|title| title == PANEL_TITLE)
            })
            .map(|msg| msg.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use hopper_exaroton::protocol::{PlayersData, StatusData};
    use hopper_exaroton::roster::DEFAULT_DEDUPE_WINDOW;
    use serde_json::json;
    use tokio::time::Instant;

    fn tracker_with(names: &[&str], count: i64, max: i64) -> RosterTracker {
        let mut tracker = RosterTracker::new(DEFAULT_DEDUPE_WINDOW);
        tracker.apply(
            &StatusData {
                status: Some(1),
                address: Some("mc.example.com".to_string()),
                players: Some(PlayersData {
                    list: Some(names.iter().map(|n| json!(n)).collect()),
                    count: Some(count),
                    max: Some(max),
                }),
            },
            Instant::now(),
        );
        tracker
    }

    #[tokio::test(start_paused = true)]
    async fn test_players_value_lists_names() {
        let tracker = tracker_with(&["Steve", "Alex"], 2, 20);
        assert_eq!(players_value(&tracker), "2/20\nSteve, Alex");
        tokio::time::advance(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_players_value_empty_roster() {
        let tracker = RosterTracker::new(DEFAULT_DEDUPE_WINDOW);
        assert_eq!(players_value(&tracker), "unknown\nNone");
    }

    #[tokio::test(start_paused = true)]
    async fn test_players_value_truncates_long_list() {
        let names: Vec<String> = (0..100).map(|i| format!("player_{i:03}xx")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let tracker = tracker_with(&refs, 100, 200);
        let value = players_value(&tracker);
        let list = value.split_once('\n').unwrap().1;
        assert_eq!(list.len(), PLAYERS_VALUE_LIMIT);
        assert!(list.ends_with("..."));
    }
}
