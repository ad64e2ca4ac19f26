//! Notifications emitted by the transport before it returns certain errors.

use std::fmt;
use std::sync::Arc;

use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    ServerUnreachable,
    Unauthorized,
    AccessRestricted,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::ServerUnreachable => "ServerUnreachable",
            EventKind::Unauthorized => "Unauthorized",
            EventKind::AccessRestricted => "AccessRestricted",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientEvent {
    pub kind: EventKind,
    pub server_id: Option<String>,
}

impl ClientEvent {
    pub fn new(kind: EventKind, server_id: Option<&str>) -> Self {
        Self {
            kind,
            server_id: server_id.map(str::to_string),
        }
    }

    /// `{"ServerId": ...}`, the payload shape listeners expect.
    pub fn payload(&self) -> Value {
        json!({ "ServerId": self.server_id })
    }
}

/// Listener invoked synchronously on the calling thread.
pub type EventCallback = Arc<dyn Fn(&ClientEvent) + Send + Sync>;
