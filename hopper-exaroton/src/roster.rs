//! Roster tracking and join/leave delta derivation.
//!
//! Successive status snapshots are folded into a last-known view of the
//! server; the delta between two rosters becomes a join/leave notification.
//! A TTL dedupe map suppresses flicker from flaky reconnects, and an
//! announcement signature suppresses exact duplicates from near-simultaneous
//! status frames.

use std::collections::HashSet;
use std::time::Duration;

use arrayvec::ArrayString;
use tokio::time::Instant;
use tracing::debug;

use crate::protocol::{StatusData, player_name};
use crate::ttl::TtlCache;

pub type PlayerName = ArrayString<16>;

pub const DEFAULT_DEDUPE_WINDOW: Duration = Duration::from_secs(6);

/// Last-known server state, replaced atomically on every status update.
/// A status update that omits `players` keeps the previous roster; stale
/// player data can therefore persist across a restart cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub status: Option<i64>,
    pub address: Option<String>,
    pub players: Vec<PlayerName>,
    pub count: Option<i64>,
    pub max: Option<i64>,
    pub observed_at: Instant,
}

/// Join/leave delta between two consecutive rosters.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterChange {
    pub joined: Vec<PlayerName>,
    pub left: Vec<PlayerName>,
    pub count_label: String,
}

#[derive(Debug)]
pub struct RosterTracker {
    snapshot: Option<StatusSnapshot>,
    roster: Option<HashSet<PlayerName>>,
    dedupe: TtlCache<String>,
    last_signature: Option<(String, Instant)>,
    window: Duration,
}

impl RosterTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            snapshot: None,
            roster: None,
            dedupe: TtlCache::new(window),
            last_signature: None,
            window,
        }
    }

    pub fn snapshot(&self) -> Option<&StatusSnapshot> {
        self.snapshot.as_ref()
    }

    /// `count[/max]` label for display, preferring the live roster size over
    /// the last reported count.
    pub fn count_label(&self) -> String {
        let count = match (&self.roster, &self.snapshot) {
            (Some(roster), _) => Some(roster.len() as i64),
            (None, Some(snapshot)) => snapshot.count,
            (None, None) => None,
        };
        match count {
            Some(count) => match self.snapshot.as_ref().and_then(|s| s.max) {
                Some(max) => format!("{count}/{max}"),
                None => count.to_string(),
            },
            None => "unknown".to_string(),
        }
    }

    /// Fold one status update into the tracker. Returns a [`RosterChange`]
    /// when a join/leave notification should go out.
    pub fn apply(&mut self, data: &StatusData, now: Instant) -> Option<RosterChange> {
        let previous = self.snapshot.take();
        let mut snapshot = StatusSnapshot {
            status: data
                .status
                .or_else(|| previous.as_ref().and_then(|s| s.status)),
            address: data
                .address
                .clone()
                .or_else(|| previous.as_ref().and_then(|s| s.address.clone())),
            players: previous.as_ref().map(|s| s.players.clone()).unwrap_or_default(),
            count: previous.as_ref().and_then(|s| s.count),
            max: previous.as_ref().and_then(|s| s.max),
            observed_at: now,
        };

        let names = match data.players.as_ref() {
            Some(players) => {
                if let Some(count) = players.count {
                    snapshot.count = Some(count);
                }
                if let Some(max) = players.max {
                    snapshot.max = Some(max);
                }
                players.list.as_ref().map(|list| normalize_names(list))
            }
            None => None,
        };

        let Some(names) = names else {
            self.snapshot = Some(snapshot);
            return None;
        };

        let current: HashSet<PlayerName> = names.iter().copied().collect();
        snapshot.players = names;

        let Some(previous_roster) = self.roster.replace(current.clone()) else {
            // Cold start: seed the roster, announce nothing.
            self.snapshot = Some(snapshot);
            return None;
        };

        // Both lists are sorted so consumers see stable name ordering.
        let mut joined: Vec<PlayerName> = snapshot
            .players
            .iter()
            .filter(|name| !previous_roster.contains(*name))
            .copied()
            .collect();
        joined.sort();
        let mut left: Vec<PlayerName> = previous_roster
            .iter()
            .filter(|name| !current.contains(*name))
            .copied()
            .collect();
        left.sort();

        joined.retain(|name| !self.recently_announced("join", name, now));
        left.retain(|name| !self.recently_announced("leave", name, now));

        self.snapshot = Some(snapshot);
        if joined.is_empty() && left.is_empty() {
            return None;
        }

        let count_label = self.count_label();
        let signature = announcement_signature(&joined, &left, &count_label);
        if let Some((last, at)) = &self.last_signature {
            if *last == signature && now.duration_since(*at) <= self.window {
                return None;
            }
        }

        for name in &joined {
            self.dedupe.insert(format!("join:{name}"), now);
        }
        for name in &left {
            self.dedupe.insert(format!("leave:{name}"), now);
        }
        self.last_signature = Some((signature, now));

        Some(RosterChange {
            joined,
            left,
            count_label,
        })
    }

    fn recently_announced(&mut self, kind: &str, name: &PlayerName, now: Instant) -> bool {
        self.dedupe.contains(&format!("{kind}:{name}"), now)
    }
}

/// Unique player names in list order; entries that cannot be normalized or
/// exceed the Minecraft name limit are skipped.
fn normalize_names(list: &[serde_json::Value]) -> Vec<PlayerName> {
    let mut seen = HashSet::new();
    list.iter()
        .filter_map(|value| {
            let name = player_name(value)?;
            let name = PlayerName::try_from(name)
                .inspect_err(|_| debug!(name, "skipping over-long player name"))
                .ok()?;
            seen.insert(name).then_some(name)
        })
        .collect()
}

fn announcement_signature(joined: &[PlayerName], left: &[PlayerName], count_label: &str) -> String {
    let mut joined: Vec<&str> = joined.iter().map(|n| n.as_str()).collect();
    let mut left: Vec<&str> = left.iter().map(|n| n.as_str()).collect();
    joined.sort_unstable();
    left.sort_unstable();
    format!("+{}|-{}|{}", joined.join(","), left.join(","), count_label)
}
