//! Protocol state machine for one websocket session.
//!
//! [`Session`] consumes classified inbound frames and produces effects; it
//! never touches the socket itself. Subscription requests and console commands
//! issued before the `ready` frame are queued and flushed in FIFO order once
//! readiness is reached.

use std::collections::VecDeque;

use crate::protocol::{InboundFrame, OutboundFrame, StatusData};

const STATUS_ONLINE: i64 = 1;

/// Domain event surfaced to the connection loop, one per relevant frame.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Ready,
    ServerConnected,
    ServerDisconnected,
    Status(StatusData),
    ConsoleLine(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Send(OutboundFrame),
    Emit(SessionEvent),
}

#[derive(Debug)]
pub struct Session {
    ready: bool,
    server_connected: bool,
    console_subscribed: bool,
    console_enabled: bool,
    pending: VecDeque<OutboundFrame>,
}

impl Session {
    pub fn new(console_enabled: bool) -> Self {
        Self {
            ready: false,
            server_connected: false,
            console_subscribed: false,
            console_enabled,
            pending: VecDeque::new(),
        }
    }

    pub fn ready(&self) -> bool {
        self.ready
    }

    pub fn server_connected(&self) -> bool {
        self.server_connected
    }

    /// Reset per-socket state. Queued frames are kept; they flush after the
    /// next `ready`.
    pub fn on_open(&mut self) {
        self.ready = false;
        self.server_connected = false;
        self.console_subscribed = false;
    }

    pub fn on_frame(&mut self, frame: InboundFrame, effects: &mut Vec<Effect>) {
        match frame {
            InboundFrame::Ready => {
                self.ready = true;
                effects.push(Effect::Emit(SessionEvent::Ready));
                while let Some(frame) = self.pending.pop_front() {
                    effects.push(Effect::Send(frame));
                }
                self.queue_or_send(OutboundFrame::status_start(), effects);
            }
            InboundFrame::ServerConnected => {
                self.server_connected = true;
                effects.push(Effect::Emit(SessionEvent::ServerConnected));
                self.start_console(effects);
            }
            InboundFrame::ServerDisconnected => {
                // The game server went away; the transport itself is fine.
                self.server_connected = false;
                self.console_subscribed = false;
                effects.push(Effect::Emit(SessionEvent::ServerDisconnected));
            }
            InboundFrame::Status(data) => {
                if !self.ready {
                    return;
                }
                if data.status == Some(STATUS_ONLINE) {
                    self.start_console(effects);
                }
                effects.push(Effect::Emit(SessionEvent::Status(data)));
            }
            InboundFrame::ConsoleLine(line) => {
                if !self.ready {
                    return;
                }
                effects.push(Effect::Emit(SessionEvent::ConsoleLine(line)));
            }
            InboundFrame::Unknown => {}
        }
    }

    /// Queue a console command, subscribing to the console stream first if
    /// needed. Preconditions (relay enabled, server connected, non-empty text)
    /// are re-checked here so the state machine stays correct even if the
    /// caller races a disconnect.
    pub fn send_console_command(&mut self, command: &str, effects: &mut Vec<Effect>) -> bool {
        if !self.console_enabled || !self.server_connected {
            return false;
        }
        let trimmed = command.trim();
        if trimmed.is_empty() {
            return false;
        }
        self.start_console(effects);
        self.queue_or_send(OutboundFrame::console_command(trimmed), effects);
        true
    }

    fn start_console(&mut self, effects: &mut Vec<Effect>) {
        if !self.console_enabled || self.console_subscribed || !self.server_connected {
            return;
        }
        self.console_subscribed = true;
        self.queue_or_send(OutboundFrame::console_start(), effects);
    }

    fn queue_or_send(&mut self, frame: OutboundFrame, effects: &mut Vec<Effect>) {
        if self.ready {
            effects.push(Effect::Send(frame));
        } else {
            self.pending.push_back(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sends(effects: &[Effect]) -> Vec<&OutboundFrame> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Send(frame) => Some(frame),
                Effect::Emit(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_ready_requests_status_stream() {
        let mut session = Session::new(false);
        let mut effects = Vec::new();
        session.on_frame(InboundFrame::Ready, &mut effects);
        assert_eq!(effects[0], Effect::Emit(SessionEvent::Ready));
        assert_eq!(sends(&effects), vec![&OutboundFrame::status_start()]);
    }

    #[test]
    fn test_commands_before_ready_flush_in_order() {
        let mut session = Session::new(true);
        let mut effects = Vec::new();
        session.on_frame(InboundFrame::ServerConnected, &mut effects);

        effects.clear();
        assert!(session.send_console_command("say one", &mut effects));
        assert!(session.send_console_command("say two", &mut effects));
        assert!(session.send_console_command("say three", &mut effects));
        // Nothing goes out before ready.
        assert!(sends(&effects).is_empty());

        effects.clear();
        session.on_frame(InboundFrame::Ready, &mut effects);
        assert_eq!(
            sends(&effects),
            vec![
                &OutboundFrame::console_start(),
                &OutboundFrame::console_command("say one"),
                &OutboundFrame::console_command("say two"),
                &OutboundFrame::console_command("say three"),
                &OutboundFrame::status_start(),
            ]
        );
    }

    #[test]
    fn test_command_rejected_when_not_connected() {
        let mut session = Session::new(true);
        let mut effects = Vec::new();
        assert!(!session.send_console_command("say hi", &mut effects));
        assert!(effects.is_empty());
    }

    #[test]
    fn test_command_rejected_when_console_disabled() {
        let mut session = Session::new(false);
        let mut effects = Vec::new();
        session.on_frame(InboundFrame::ServerConnected, &mut effects);
        effects.clear();
        assert!(!session.send_console_command("say hi", &mut effects));
        assert!(effects.is_empty());
    }

    #[test]
    fn test_command_rejected_when_empty() {
        let mut session = Session::new(true);
        let mut effects = Vec::new();
        session.on_frame(InboundFrame::ServerConnected, &mut effects);
        effects.clear();
        assert!(!session.send_console_command("   ", &mut effects));
        assert!(effects.is_empty());
    }

    #[test]
    fn test_console_subscription_requires_server_connected() {
        let mut session = Session::new(true);
        let mut effects = Vec::new();
        session.on_frame(InboundFrame::Ready, &mut effects);
        effects.clear();
        // Online status without a connected frame must not subscribe.
        session.on_frame(
            InboundFrame::Status(StatusData {
                status: Some(1),
                ..StatusData::default()
            }),
            &mut effects,
        );
        assert!(sends(&effects).is_empty());
    }

    #[test]
    fn test_online_status_subscribes_console_once() {
        let mut session = Session::new(true);
        let mut effects = Vec::new();
        session.on_frame(InboundFrame::Ready, &mut effects);
        session.on_frame(InboundFrame::ServerConnected, &mut effects);
        effects.clear();
        session.on_frame(
            InboundFrame::Status(StatusData {
                status: Some(1),
                ..StatusData::default()
            }),
            &mut effects,
        );
        // Already subscribed by the connected frame; no duplicate start.
        assert!(sends(&effects).is_empty());
    }

    #[test]
    fn test_disconnected_clears_console_subscription() {
        let mut session = Session::new(true);
        let mut effects = Vec::new();
        session.on_frame(InboundFrame::Ready, &mut effects);
        session.on_frame(InboundFrame::ServerConnected, &mut effects);
        session.on_frame(InboundFrame::ServerDisconnected, &mut effects);
        assert!(!session.server_connected());

        effects.clear();
        session.on_frame(InboundFrame::ServerConnected, &mut effects);
        // Resubscribes after the server comes back.
        assert_eq!(sends(&effects), vec![&OutboundFrame::console_start()]);
    }

    #[test]
    fn test_frames_before_ready_are_dropped() {
        let mut session = Session::new(true);
        let mut effects = Vec::new();
        session.on_frame(InboundFrame::Status(StatusData::default()), &mut effects);
        session.on_frame(InboundFrame::ConsoleLine("line".into()), &mut effects);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_unknown_frames_are_ignored() {
        let mut session = Session::new(true);
        let mut effects = Vec::new();
        session.on_frame(InboundFrame::Ready, &mut effects);
        effects.clear();
        session.on_frame(InboundFrame::Unknown, &mut effects);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_on_open_resets_flags_but_keeps_queue() {
        let mut session = Session::new(true);
        let mut effects = Vec::new();
        session.on_frame(InboundFrame::ServerConnected, &mut effects);
        assert!(session.send_console_command("say queued", &mut effects));

        session.on_open();
        assert!(!session.ready());
        assert!(!session.server_connected());

        effects.clear();
        session.on_frame(InboundFrame::Ready, &mut effects);
        let sent = sends(&effects);
        assert!(sent.contains(&&OutboundFrame::console_command("say queued")));
    }
}
