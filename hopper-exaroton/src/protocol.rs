use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const API_HOST: &str = "api.exaroton.com";

pub fn websocket_url(server_id: &str) -> String {
    format!("wss://{API_HOST}/v1/servers/{server_id}/websocket")
}

/// Server status codes as reported by the hosting API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Offline,
    Online,
    Starting,
    Stopping,
    Restarting,
    Saving,
    Loading,
    Crashed,
    Pending,
    Transferring,
    Preparing,
}

impl ServerStatus {
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => Self::Offline,
            1 => Self::Online,
            2 => Self::Starting,
            3 => Self::Stopping,
            4 => Self::Restarting,
            5 => Self::Saving,
            6 => Self::Loading,
            7 => Self::Crashed,
            8 => Self::Pending,
            9 => Self::Transferring,
            10 => Self::Preparing,
            _ => return None,
        })
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Online => "online",
            Self::Starting => "starting",
            Self::Stopping => "stopping",
            Self::Restarting => "restarting",
            Self::Saving => "saving",
            Self::Loading => "loading",
            Self::Crashed => "crashed",
            Self::Pending => "pending",
            Self::Transferring => "transferring",
            Self::Preparing => "preparing",
        }
    }

    /// Embed accent color for this status.
    pub fn color(self) -> u32 {
        match self {
            Self::Online => 0x2ecc71,
            Self::Starting => 0xf1c40f,
            Self::Stopping => 0xe67e22,
            Self::Restarting => 0x9b59b6,
            Self::Crashed => 0xe74c3c,
            _ => 0x95a5a6,
        }
    }
}

/// Human-readable label for an optional status code.
pub fn status_label(code: Option<i64>) -> String {
    match code.and_then(ServerStatus::from_code) {
        Some(status) => status.label().to_string(),
        None => match code {
            Some(code) => format!("unknown ({code})"),
            None => "unknown (n/a)".to_string(),
        },
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PlayersData {
    #[serde(default)]
    pub list: Option<Vec<Value>>,
    #[serde(default)]
    pub count: Option<i64>,
    #[serde(default)]
    pub max: Option<i64>,
}

/// Payload of a status-stream frame. Every field is optional: updates during
/// startup or shutdown routinely omit `players` or `address`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StatusData {
    #[serde(default)]
    pub status: Option<i64>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub players: Option<PlayersData>,
}

/// Player list entries arrive either as plain strings or as objects carrying
/// a `name` or `username` field.
pub fn player_name(value: &Value) -> Option<&str> {
    match value {
        Value::String(name) => Some(name),
        Value::Object(map) => map
            .get("name")
            .or_else(|| map.get("username"))
            .and_then(Value::as_str),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default)]
    stream: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    data: Value,
}

/// One classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Ready,
    ServerConnected,
    ServerDisconnected,
    Status(StatusData),
    ConsoleLine(String),
    Unknown,
}

impl InboundFrame {
    /// Classify a raw websocket text message. Malformed JSON and unrecognized
    /// shapes map to `Unknown`; they are never an error.
    pub fn parse(text: &str) -> Self {
        let Ok(raw) = serde_json::from_str::<RawFrame>(text) else {
            return Self::Unknown;
        };
        match raw.kind.as_deref() {
            Some("ready") => Self::Ready,
            Some("connected") => Self::ServerConnected,
            Some("disconnected") => Self::ServerDisconnected,
            Some("status") if raw.stream.as_deref() == Some("status") => {
                match serde_json::from_value::<StatusData>(raw.data) {
                    Ok(data) => Self::Status(data),
                    Err(_) => Self::Unknown,
                }
            }
            Some("line") if raw.stream.as_deref() == Some("console") => match raw.data {
                Value::String(line) => Self::ConsoleLine(line),
                _ => Self::Unknown,
            },
            _ => Self::Unknown,
        }
    }
}

/// One outbound subscription or command frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundFrame {
    pub stream: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl OutboundFrame {
    pub fn status_start() -> Self {
        Self {
            stream: "status",
            kind: "start",
            data: None,
        }
    }

    pub fn console_start() -> Self {
        Self {
            stream: "console",
            kind: "start",
            data: Some(json!({ "tail": 0 })),
        }
    }

    pub fn console_command(command: impl Into<String>) -> Self {
        Self {
            stream: "console",
            kind: "command",
            data: Some(Value::String(command.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifies_lifecycle_frames() {
        assert_eq!(InboundFrame::parse(r#"{"type":"ready"}"#), InboundFrame::Ready);
        assert_eq!(
            InboundFrame::parse(r#"{"type":"connected"}"#),
            InboundFrame::ServerConnected
        );
        assert_eq!(
            InboundFrame::parse(r#"{"type":"disconnected"}"#),
            InboundFrame::ServerDisconnected
        );
    }

    #[test]
    fn test_classifies_status_frame() {
        let frame = InboundFrame::parse(
            r#"{"stream":"status","type":"status","data":{"status":1,"address":"mc.example.com","players":{"list":["Steve"],"count":1,"max":20}}}"#,
        );
        let InboundFrame::Status(data) = frame else {
            panic!("expected status frame");
        };
        assert_eq!(data.status, Some(1));
        assert_eq!(data.address.as_deref(), Some("mc.example.com"));
        let players = data.players.unwrap();
        assert_eq!(players.count, Some(1));
        assert_eq!(players.max, Some(20));
    }

    #[test]
    fn test_classifies_console_line() {
        let frame = InboundFrame::parse(r#"{"stream":"console","type":"line","data":"hello"}"#);
        assert_eq!(frame, InboundFrame::ConsoleLine("hello".to_string()));
    }

    #[test]
    fn test_unknown_shapes_never_fail() {
        assert_eq!(InboundFrame::parse("not json"), InboundFrame::Unknown);
        assert_eq!(InboundFrame::parse(r#"{"type":"debug"}"#), InboundFrame::Unknown);
        assert_eq!(InboundFrame::parse(r#"{"stream":"tick"}"#), InboundFrame::Unknown);
        // A console line whose data is not a string is dropped, not an error.
        assert_eq!(
            InboundFrame::parse(r#"{"stream":"console","type":"line","data":42}"#),
            InboundFrame::Unknown
        );
    }

    #[test]
    fn test_player_name_normalization() {
        assert_eq!(player_name(&json!("Steve")), Some("Steve"));
        assert_eq!(player_name(&json!({"name": "Alex"})), Some("Alex"));
        assert_eq!(player_name(&json!({"username": "Herobrine"})), Some("Herobrine"));
        assert_eq!(player_name(&json!(42)), None);
        assert_eq!(player_name(&json!({"id": 7})), None);
    }

    #[test]
    fn test_outbound_frame_shapes() {
        assert_eq!(
            serde_json::to_string(&OutboundFrame::status_start()).unwrap(),
            r#"{"stream":"status","type":"start"}"#
        );
        assert_eq!(
            serde_json::to_string(&OutboundFrame::console_start()).unwrap(),
            r#"{"stream":"console","type":"start","data":{"tail":0}}"#
        );
        assert_eq!(
            serde_json::to_string(&OutboundFrame::console_command("op Steve")).unwrap(),
            r#"{"stream":"console","type":"command","data":"op Steve"}"#
        );
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(status_label(Some(1)), "online");
        assert_eq!(status_label(Some(7)), "crashed");
        assert_eq!(status_label(Some(42)), "unknown (42)");
        assert_eq!(status_label(None), "unknown (n/a)");
    }

    #[test]
    fn test_status_colors() {
        assert_eq!(ServerStatus::Online.color(), 0x2ecc71);
        assert_eq!(ServerStatus::Crashed.color(), 0xe74c3c);
        assert_eq!(ServerStatus::Saving.color(), 0x95a5a6);
    }
}
