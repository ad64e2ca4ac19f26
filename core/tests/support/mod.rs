//! Scripted connector for transport tests.
//!
//! Responses and failures are queued up front and handed out one per
//! dispatch. Every prepared request and every session opening is recorded so
//! tests can count attempts and sessions.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io::Cursor;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use jellyfin_core::{
    AppInfo, ClientConfig, ClientEvent, Connector, DispatchError, HttpResponse, JellyfinClient, PreparedRequest,
    Session,
};

#[derive(Debug)]
struct Canned {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

#[derive(Debug, Default)]
struct Shared {
    script: RefCell<VecDeque<Result<Canned, DispatchError>>>,
    sent: RefCell<Vec<PreparedRequest>>,
    connects: Cell<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedConnector {
    shared: Rc<Shared>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, status: u16, body: &str) -> &Self {
        self.respond_raw(status, Vec::new(), body.as_bytes().to_vec())
    }

    pub fn respond_with_headers(&self, status: u16, headers: &[(&str, &str)], body: &str) -> &Self {
        let headers = headers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        self.respond_raw(status, headers, body.as_bytes().to_vec())
    }

    pub fn respond_raw(&self, status: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> &Self {
        self.shared
            .script
            .borrow_mut()
            .push_back(Ok(Canned { status, headers, body }));
        self
    }

    pub fn fail(&self, error: DispatchError) -> &Self {
        self.shared.script.borrow_mut().push_back(Err(error));
        self
    }

    /// Requests dispatched so far, in order.
    pub fn sent(&self) -> Vec<PreparedRequest> {
        self.shared.sent.borrow().clone()
    }

    pub fn connects(&self) -> u32 {
        self.shared.connects.get()
    }

    pub fn remaining(&self) -> usize {
        self.shared.script.borrow().len()
    }
}

pub struct ScriptedSession {
    shared: Rc<Shared>,
}

impl Connector for ScriptedConnector {
    type Session = ScriptedSession;

    fn connect(&self, _config: &ClientConfig) -> Result<ScriptedSession, DispatchError> {
        self.shared.connects.set(self.shared.connects.get() + 1);
        Ok(ScriptedSession {
            shared: Rc::clone(&self.shared),
        })
    }
}

impl Session for ScriptedSession {
    fn send(&mut self, request: &PreparedRequest) -> Result<HttpResponse, DispatchError> {
        self.shared.sent.borrow_mut().push(request.clone());
        match self.shared.script.borrow_mut().pop_front() {
            Some(Ok(canned)) => Ok(HttpResponse::new(canned.status, canned.headers, Cursor::new(canned.body))),
            Some(Err(error)) => Err(error),
            None => panic!("script exhausted at {}", request.url),
        }
    }
}

pub const SERVER: &str = "http://media.local:8096";

/// Configuration with the reference identity and no backoff.
pub fn test_config() -> ClientConfig {
    let mut config = ClientConfig::new(AppInfo::new("X", "9.9", "D", "1"));
    config.http.retry_backoff_ms = 0;
    config
}

pub fn client(connector: &ScriptedConnector) -> JellyfinClient<ScriptedConnector> {
    let mut client = JellyfinClient::with_connector(test_config(), connector.clone());
    client.set_server(SERVER);
    client
}

pub fn logged_in_client(connector: &ScriptedConnector) -> JellyfinClient<ScriptedConnector> {
    let mut client = client(connector);
    client
        .auth_mut()
        .set_credentials(Some("srv-1".to_string()), "u1".to_string(), "tok".to_string());
    client
}

/// Record every event the client emits.
pub fn record_events<C: Connector>(client: &mut JellyfinClient<C>) -> Arc<Mutex<Vec<ClientEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    client.on_event(move |event| sink.lock().unwrap().push(event.clone()));
    events
}
