use std::env::var;
use std::time::Duration;

use dotenvy::dotenv;

/// How status updates reach Discord: keep one embed edited in place, or post
/// a message per change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMode {
    Panel,
    Announce,
}

/// Application configuration with environment variable overrides
#[derive(Debug, Clone)]
pub struct Config {
    /// Discord API Token
    /// Env: DISCORD_TOKEN (required at startup, panic if missing)
    pub discord_token: Option<String>,

    /// Hosting API token
    /// Env: EXAROTON_TOKEN (optional; server features disabled if missing)
    pub exaroton_token: Option<String>,

    /// Hosting server id
    /// Env: EXAROTON_SERVER_ID (optional; server features disabled if missing)
    pub exaroton_server_id: Option<String>,

    /// Channel that holds the live status embed / status announcements
    /// Env: EXAROTON_STATUS_CHANNEL_ID (optional)
    pub status_channel_id: Option<u64>,

    /// Channel bridged to the server console chat
    /// Env: EXAROTON_CONSOLE_CHANNEL_ID (optional)
    pub console_channel_id: Option<u64>,

    /// Channel for command audit entries
    /// Env: LOG_CHANNEL_ID (optional)
    pub log_channel_id: Option<u64>,

    /// Channel the /announce command posts to
    /// Env: ANNOUNCEMENTS_CHANNEL_ID (optional)
    pub announcements_channel_id: Option<u64>,

    /// Roles allowed to run privileged commands, comma separated ids
    /// Env: ADMIN_ROLE_IDS (default: empty, privileged commands refuse)
    pub admin_role_ids: Vec<u64>,

    /// Status delivery mode, "panel" or "announce"
    /// Env: STATUS_MODE (default: "panel")
    pub status_mode: StatusMode,

    /// Spend the bot owner's credits when starting the server
    /// Env: USE_OWN_CREDITS (default: true)
    pub use_own_credits: bool,

    /// Per-user chat relay cooldown in milliseconds
    /// Env: CHAT_COOLDOWN_MS (default: 1500)
    pub chat_cooldown: Duration,

    /// Websocket liveness probe interval in seconds
    /// Env: HEARTBEAT_INTERVAL_SECS (default: 15)
    pub heartbeat_interval: Duration,

    /// Silence before the websocket is considered dead, in seconds
    /// Env: STALE_AFTER_SECS (default: 90)
    pub stale_after: Duration,

    /// Join/leave announcement dedupe window in seconds
    /// Env: DEDUPE_WINDOW_SECS (default: 6)
    pub dedupe_window: Duration,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let _ = dotenv(); //for debugging mostly
        Self {
            discord_token: var("DISCORD_TOKEN")
                .expect("DISCORD_TOKEN environment variable is required")
                .into(),
            exaroton_token: var("EXAROTON_TOKEN").ok(),
            exaroton_server_id: var("EXAROTON_SERVER_ID").ok(),
            status_channel_id: env_channel("EXAROTON_STATUS_CHANNEL_ID"),
            console_channel_id: env_channel("EXAROTON_CONSOLE_CHANNEL_ID"),
            log_channel_id: env_channel("LOG_CHANNEL_ID"),
            announcements_channel_id: env_channel("ANNOUNCEMENTS_CHANNEL_ID"),
            admin_role_ids: env_id_list("ADMIN_ROLE_IDS"),
            status_mode: match env_or_default_string("STATUS_MODE", "panel").as_str() {
                "announce" => StatusMode::Announce,
                _ => StatusMode::Panel,
            },
            use_own_credits: env_or_default("USE_OWN_CREDITS", true),
            chat_cooldown: Duration::from_millis(env_or_default("CHAT_COOLDOWN_MS", 1500)),
            heartbeat_interval: Duration::from_secs(env_or_default("HEARTBEAT_INTERVAL_SECS", 15)),
            stale_after: Duration::from_secs(env_or_default("STALE_AFTER_SECS", 90)),
            dedupe_window: Duration::from_secs(env_or_default("DEDUPE_WINDOW_SECS", 6)),
        }
    }

    /// Create configuration with all default values
    pub fn default() -> Self {
        Self {
            discord_token: None,
            exaroton_token: None,
            exaroton_server_id: None,
            status_channel_id: None,
            console_channel_id: None,
            log_channel_id: None,
            announcements_channel_id: None,
            admin_role_ids: Vec::new(),
            status_mode: StatusMode::Panel,
            use_own_credits: true,
            chat_cooldown: Duration::from_millis(1500),
            heartbeat_interval: Duration::from_secs(15),
            stale_after: Duration::from_secs(90),
            dedupe_window: Duration::from_secs(6),
        }
    }
}

/// Parse environment variable or return default value
fn env_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    var(key)
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(default)
}

/// Parse environment variable string or return default value
fn env_or_default_string(key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a Discord snowflake id, None if unset or malformed
fn env_channel(key: &str) -> Option<u64> {
    var(key).ok().and_then(|val| val.trim().parse().ok())
}

/// Parse a comma separated list of snowflake ids, skipping malformed entries
fn env_id_list(key: &str) -> Vec<u64> {
    var(key)
        .map(|val| {
            val.split(',')
                .filter_map(|part| part.trim().parse().ok())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.status_mode, StatusMode::Panel);
        assert!(config.use_own_credits);
        assert_eq!(config.chat_cooldown, Duration::from_millis(1500));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(15));
        assert_eq!(config.stale_after, Duration::from_secs(90));
        assert_eq!(config.dedupe_window, Duration::from_secs(6));
        assert!(config.admin_role_ids.is_empty());
    }
}
