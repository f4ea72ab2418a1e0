//! Client library for the exaroton hosting API: a persistent status/console
//! websocket stream, console line parsing, roster tracking, and the
//! control-plane HTTP wrappers.

pub mod console;
pub mod control;
pub mod protocol;
pub mod roster;
pub mod session;
pub mod stream;
pub mod ttl;

mod error;

pub use error::{ControlError, StreamError};
pub use stream::{StatusStream, StreamConfig, StreamEvent, StreamHandle};
