//! Command audit log: one line per privileged command into a Discord channel.

use std::fmt;

use poise::serenity_prelude::{ChannelId, CreateMessage, Http};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    Success,
    Failure,
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditStatus::Success => write!(f, "SUCCESS"),
            AuditStatus::Failure => write!(f, "FAILURE"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub status: AuditStatus,
    pub command: String,
    pub action: String,
    pub user_name: String,
    pub user_id: u64,
    pub guild: String,
    pub channel: String,
    pub details: String,
}

pub fn format_entry(entry: &AuditEntry) -> String {
    format!(
        "[{}] {} | Action: {} | User: {} ({}) | Guild: {} | Channel: {} | Details: {}",
        entry.status,
        entry.command,
        entry.action,
        entry.user_name,
        entry.user_id,
        entry.guild,
        entry.channel,
        entry.details
    )
}

/// Posts audit entries to the configured log channel. A missing channel or a
/// failed send never fails the command that triggered the entry.
#[derive(Debug, Clone)]
pub struct CommandAudit {
    channel: Option<ChannelId>,
}

impl CommandAudit {
    pub fn new(channel: Option<u64>) -> Self {
        Self {
            channel: channel.map(ChannelId::new),
        }
    }

    pub async fn record(&self, http: &Http, entry: AuditEntry) {
        let Some(channel) = self.channel else {
            return;
        };
        let line = format_entry(&entry);
        if let Err(err) = channel
            .send_message(http, CreateMessage::new().content(&line))
            .await
        {
            warn!("failed to write audit entry: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_entry() {
        let entry = AuditEntry {
            status: AuditStatus::Success,
            command: "/server start".to_string(),
            action: "Start server".to_string(),
            user_name: "steve".to_string(),
            user_id: 42,
            guild: "Test Guild".to_string(),
            channel: "#general".to_string(),
            details: "Server is starting.".to_string(),
        };
        assert_eq!(
            format_entry(&entry),
            "[SUCCESS] /server start | Action: Start server | User: steve (42) | \
             Guild: Test Guild | Channel: #general | Details: Server is starting."
        );
    }

    #[test]
    fn test_failure_status_label() {
        assert_eq!(AuditStatus::Failure.to_string(), "FAILURE");
    }
}
