//! End-to-end tests for the status/console stream over a scripted transport.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hopper_exaroton::stream::{Dial, StatusStream, StreamConfig, StreamEvent, Transport};
use hopper_exaroton::StreamError;

/// Replays scripted inbound frames, records outbound frames, then either
/// closes or idles.
struct ScriptTransport {
    incoming: VecDeque<String>,
    sent: Arc<Mutex<Vec<String>>>,
    close_after_script: bool,
}

#[async_trait]
impl Transport for ScriptTransport {
    async fn send(&mut self, text: String) -> Result<(), StreamError> {
        self.sent.lock().unwrap().push(text);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, StreamError>> {
        match self.incoming.pop_front() {
            Some(text) => Some(Ok(text)),
            None if self.close_after_script => None,
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) {}
}

struct ScriptDial {
    connections: VecDeque<ScriptTransport>,
}

#[async_trait]
impl Dial for ScriptDial {
    type Conn = ScriptTransport;

    async fn dial(&mut self) -> Result<ScriptTransport, StreamError> {
        match self.connections.pop_front() {
            Some(transport) => Ok(transport),
            None => std::future::pending().await,
        }
    }
}

fn script(frames: &[&str], sent: &Arc<Mutex<Vec<String>>>, close_after_script: bool) -> ScriptTransport {
    ScriptTransport {
        incoming: frames.iter().map(|f| f.to_string()).collect(),
        sent: Arc::clone(sent),
        close_after_script,
    }
}

fn config() -> StreamConfig {
    StreamConfig::new("token", "srv").with_console(true)
}

#[tokio::test(start_paused = true)]
async fn test_full_session_flow() {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let dial = ScriptDial {
        connections: VecDeque::from([script(
            &[
                r#"{"type":"ready"}"#,
                r#"{"type":"connected"}"#,
                r#"{"stream":"status","type":"status","data":{"status":1,"address":"mc.example.com","players":{"list":["Steve"],"count":1,"max":20}}}"#,
                r#"{"stream":"console","type":"line","data":"[12:00:00] [Server thread/INFO]: <Steve> hi"}"#,
            ],
            &sent,
            false,
        )]),
    };

    let (handle, mut events) = StatusStream::spawn(config(), dial);

    assert_eq!(events.recv().await, Some(StreamEvent::Ready));
    assert_eq!(events.recv().await, Some(StreamEvent::ServerConnected));
    let Some(StreamEvent::Status(data)) = events.recv().await else {
        panic!("expected status event");
    };
    assert_eq!(data.status, Some(1));
    let Some(StreamEvent::ConsoleLine(line)) = events.recv().await else {
        panic!("expected console line event");
    };
    assert!(line.contains("<Steve> hi"));

    let sent = sent.lock().unwrap();
    assert_eq!(
        *sent,
        vec![
            r#"{"stream":"status","type":"start"}"#.to_string(),
            r#"{"stream":"console","type":"start","data":{"tail":0}}"#.to_string(),
        ]
    );
    drop(sent);
    handle.stop();
}

#[tokio::test(start_paused = true)]
async fn test_reconnects_after_close_and_resubscribes() {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let dial = ScriptDial {
        connections: VecDeque::from([
            script(&[r#"{"type":"ready"}"#], &sent, true),
            script(&[r#"{"type":"ready"}"#], &sent, false),
        ]),
    };

    let (handle, mut events) = StatusStream::spawn(config(), dial);

    assert_eq!(events.recv().await, Some(StreamEvent::Ready));
    let Some(StreamEvent::ConnectionLost { reason }) = events.recv().await else {
        panic!("expected connection lost");
    };
    assert!(reason.contains("closed"));
    // The paused clock skips the backoff; the second connection comes up.
    assert_eq!(events.recv().await, Some(StreamEvent::Ready));

    // Both sessions requested the status stream.
    assert_eq!(
        *sent.lock().unwrap(),
        vec![
            r#"{"stream":"status","type":"start"}"#.to_string(),
            r#"{"stream":"status","type":"start"}"#.to_string(),
        ]
    );
    handle.stop();
}

#[tokio::test(start_paused = true)]
async fn test_console_command_sent_when_connected() {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let dial = ScriptDial {
        connections: VecDeque::from([script(
            &[r#"{"type":"ready"}"#, r#"{"type":"connected"}"#],
            &sent,
            false,
        )]),
    };

    let (handle, mut events) = StatusStream::spawn(config(), dial);
    assert_eq!(events.recv().await, Some(StreamEvent::Ready));
    assert_eq!(events.recv().await, Some(StreamEvent::ServerConnected));

    assert!(handle.send_console_command("  op Steve  "));
    // Give the stream task a turn to drain the command.
    tokio::time::sleep(Duration::from_millis(10)).await;

    let sent = sent.lock().unwrap();
    assert!(
        sent.contains(&r#"{"stream":"console","type":"command","data":"op Steve"}"#.to_string()),
        "command frame missing from {sent:?}"
    );
    drop(sent);
    handle.stop();
}

#[tokio::test(start_paused = true)]
async fn test_missing_credentials_fail_fast() {
    let Err(err) = StatusStream::connect(StreamConfig::new("", "srv")) else {
        panic!("empty token must be rejected");
    };
    assert!(matches!(err, StreamError::MissingCredentials));
    let Err(err) = StatusStream::connect(StreamConfig::new("token", "   ")) else {
        panic!("blank server id must be rejected");
    };
    assert!(matches!(err, StreamError::MissingCredentials));
}
