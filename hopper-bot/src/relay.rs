//! Stream event consumer: folds status updates into the roster tracker and
//! fans the results out to Discord (status panel or announcements, bridged
//! chat, join/leave logs).

use std::sync::Arc;

use hopper_exaroton::console::{ConsoleEvent, parse_line};
use hopper_exaroton::roster::{RosterChange, RosterTracker};
use hopper_exaroton::stream::StreamEvent;
use poise::serenity_prelude as serenity;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::bridge;
use crate::config::{Config, StatusMode};
use crate::panel::StatusPanel;

/// Join/leave announcement posted in announce mode.
pub fn format_announcement(change: &RosterChange) -> String {
    let mut parts = Vec::new();
    if !change.joined.is_empty() {
        let names: Vec<&str> = change.joined.iter().map(|n| n.as_str()).collect();
        parts.push(format!("**{}** joined the server", names.join("**, **")));
    }
    if !change.left.is_empty() {
        let names: Vec<&str> = change.left.iter().map(|n| n.as_str()).collect();
        parts.push(format!("**{}** left the server", names.join("**, **")));
    }
    format!("{}. Players online: {}", parts.join(". "), change.count_label)
}

/// Drives the Discord side of the stream until the event channel closes.
pub async fn run(
    http: Arc<serenity::Http>,
    config: Config,
    bot_user: serenity::UserId,
    mut events: mpsc::Receiver<StreamEvent>,
) {
    let mut tracker = RosterTracker::new(config.dedupe_window);
    let mut panel = match (config.status_mode, config.status_channel_id) {
        (StatusMode::Panel, Some(id)) => Some(StatusPanel::new(id, bot_user)),
        _ => None,
    };

    while let Some(event) = events.recv().await {
        match event {
            StreamEvent::Ready => info!("status stream ready"),
            StreamEvent::ServerConnected => info!("server console connected"),
            StreamEvent::ServerDisconnected => info!("server console disconnected"),
            StreamEvent::ConnectionLost { reason } => {
                warn!("status stream connection lost: {reason}");
            }
            StreamEvent::Status(data) => {
                let change = tracker.apply(&data, Instant::now());
                if let Some(panel) = &mut panel {
                    panel.update(&http, &tracker).await;
                } else if let (StatusMode::Announce, Some(change), Some(channel_id)) =
                    (config.status_mode, change, config.status_channel_id)
                {
                    let channel = serenity::ChannelId::new(channel_id);
                    if let Err(err) = channel.say(&http, format_announcement(&change)).await {
                        error!("failed to post status announcement: {err}");
                    }
                }
            }
            StreamEvent::ConsoleLine(line) => match parse_line(&line) {
                Some(ConsoleEvent::Chat {
                    player,
                    message,
                    insecure,
                }) => {
                    if insecure {
                        debug!("relaying unsigned chat from {player}");
                    }
                    if let Some(channel_id) = config.console_channel_id {
                        bridge::relay_chat_line(&http, channel_id, &player, &message).await;
                    }
                }
                Some(ConsoleEvent::Join { player }) => info!("player join: {player}"),
                Some(ConsoleEvent::Leave { player }) => info!("player leave: {player}"),
                None => {}
            },
        }
    }
    info!("status stream event channel closed");
}
