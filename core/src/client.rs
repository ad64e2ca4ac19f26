//! Client facade for the media-server API.
//!
//! # Design
//! `JellyfinClient` owns the three pieces a call needs: the configuration
//! snapshot, the mutable `AuthState` and the `Transport`. Catalogue functions
//! build requests; `execute` runs them. The handful of operations that
//! interpret a response themselves (login, UTC time, server probing) live
//! here.
//!
//! Every call takes `&mut self` and blocks until the transport returns.

use std::io::Write;

use chrono::Utc;
use log::info;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::auth::AuthState;
use crate::catalogue;
use crate::config::ClientConfig;
use crate::connector::{Connector, UreqConnector};
use crate::error::ApiError;
use crate::events::ClientEvent;
use crate::http::HttpRequest;
use crate::placeholder::PlaceholderValues;
use crate::transport::{Reply, Transport};
use crate::types::{AuthenticationResult, PublicSystemInfo, UtcTimeResponse, UtcTimeSample};

#[derive(Debug)]
pub struct JellyfinClient<C: Connector = UreqConnector> {
    config: ClientConfig,
    auth: AuthState,
    transport: Transport<C>,
}

impl JellyfinClient<UreqConnector> {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_connector(config, UreqConnector)
    }
}

impl<C: Connector> JellyfinClient<C> {
    pub fn with_connector(config: ClientConfig, connector: C) -> Self {
        Self {
            config,
            auth: AuthState::new(),
            transport: Transport::with_connector(connector),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Replace the configuration. Takes effect from the next request.
    pub fn set_config(&mut self, config: ClientConfig) {
        self.config = config;
    }

    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    pub fn auth_mut(&mut self) -> &mut AuthState {
        &mut self.auth
    }

    pub fn transport(&self) -> &Transport<C> {
        &self.transport
    }

    /// Register the listener for `ServerUnreachable`, `Unauthorized` and
    /// `AccessRestricted` events.
    pub fn on_event<F>(&mut self, callback: F)
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.transport.set_event_callback(std::sync::Arc::new(callback));
    }

    pub fn set_server(&mut self, address: &str) {
        self.auth.set_server(address);
    }

    /// Run a request and return its JSON body. `None` means an empty body,
    /// a non-JSON body, or a swallowed 500.
    pub fn execute(&mut self, request: HttpRequest) -> Result<Option<Value>, ApiError> {
        self.transport.request(&self.config, &mut self.auth, request, None)
    }

    /// Like `execute`, decoding the body into `T`.
    pub fn execute_as<T: DeserializeOwned>(&mut self, request: HttpRequest) -> Result<Option<T>, ApiError> {
        let value = self.execute(request)?;
        decode(value)
    }

    /// Run a request in streaming mode, writing the body to `destination`.
    pub fn stream(&mut self, request: HttpRequest, destination: &mut dyn Write) -> Result<(), ApiError> {
        self.transport
            .request(&self.config, &mut self.auth, request, Some(destination))
            .map(|_| ())
    }

    /// Authenticate against `server` and store the resulting credentials.
    ///
    /// Any previous credentials are dropped first, so the login request goes
    /// out without a token.
    pub fn login(&mut self, server: &str, username: &str, password: &str) -> Result<AuthenticationResult, ApiError> {
        self.auth.clear();
        self.auth.set_server(server);
        info!(server = server, username = username; "Logging in");

        let result: AuthenticationResult = self
            .execute_as(catalogue::authenticate_by_name(username, password))?
            .ok_or_else(|| ApiError::UnexpectedResponse("empty authentication response".to_string()))?;

        self.auth
            .set_credentials(result.server_id.clone(), result.user.id.clone(), result.access_token.clone());
        Ok(result)
    }

    /// Forget the token and close the session. The server address is kept.
    pub fn logout(&mut self) {
        self.auth.revoke_token();
        self.transport.stop_session();
    }

    /// Close the session, whatever the keep-alive setting.
    pub fn stop(&mut self) {
        self.transport.stop_session();
    }

    /// Public server information; works without credentials.
    pub fn try_server(&mut self) -> Result<Option<PublicSystemInfo>, ApiError> {
        self.execute_as(catalogue::try_server())
    }

    /// Public information of the server at `address`. The current server
    /// and credentials are left alone.
    pub fn get_public_info(&mut self, address: &str) -> Result<Option<PublicSystemInfo>, ApiError> {
        let reply = self.detached(address, catalogue::try_server())?;
        decode(reply.json)
    }

    /// Check `token` against the server at `address`.
    ///
    /// Returns the full system information when the token is accepted and
    /// `None` when the server rejects it. The client's own credentials are
    /// not touched either way.
    pub fn validate_token(&mut self, address: &str, token: &str) -> Result<Option<Value>, ApiError> {
        match self.detached(address, catalogue::validate_token(token)) {
            Ok(reply) => Ok(reply.json),
            Err(ApiError::Unauthorized) => {
                info!(server = address; "Stored access token rejected");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// The address the server at `address` prefers, after following its
    /// redirects.
    pub fn check_redirect(&mut self, address: &str) -> Result<String, ApiError> {
        let reply = self.detached(address, catalogue::try_server())?;
        let preferred = server_root(reply.final_url);
        if preferred != address.trim_end_matches('/') {
            info!(from = address, to = preferred.as_str(); "Server redirects to a new address");
        }
        Ok(preferred)
    }

    /// Run `request` against `address` with blank credentials and no event
    /// listener.
    fn detached(&mut self, address: &str, request: HttpRequest) -> Result<Reply, ApiError> {
        let mut scratch = AuthState::new();
        scratch.set_server(address);
        let listener = self.transport.take_event_callback();
        let result = self.transport.send(&self.config, &mut scratch, request, None);
        if let Some(listener) = listener {
            self.transport.set_event_callback(listener);
        }
        result
    }

    /// Whether the sync-queue companion plugin answers. Single attempt.
    pub fn check_companion_installed(&mut self) -> bool {
        self.execute(catalogue::get_server_time().with_retry(1)).is_ok()
    }

    /// Sample the server clock with local timestamps on both sides.
    pub fn get_utc_time(&mut self) -> Result<UtcTimeSample, ApiError> {
        let request_sent = Utc::now();
        let response: UtcTimeResponse = self
            .execute_as(catalogue::get_utc_time())?
            .ok_or_else(|| ApiError::UnexpectedResponse("empty GetUTCTime response".to_string()))?;
        let response_received = Utc::now();

        Ok(UtcTimeSample {
            request_sent,
            request_received: response.request_reception_time,
            response_sent: response.response_transmission_time,
            response_received,
        })
    }

    /// Download the universal audio stream of `item_id` into `destination`.
    pub fn download_audio_stream(
        &mut self,
        destination: &mut dyn Write,
        item_id: &str,
        play_id: &str,
        container: &str,
        audio_codec: Option<&str>,
    ) -> Result<(), ApiError> {
        const MAX_STREAMING_BITRATE: u64 = 140_000_000;
        let request = catalogue::get_audio_stream(item_id, play_id, container, MAX_STREAMING_BITRATE, audio_codec);
        self.stream(request, destination)
    }

    /// Artwork URL with the server address filled in.
    pub fn artwork_url(&self, item_id: &str, art: &str, max_width: u32, ext: &str, index: Option<u32>) -> String {
        let template = catalogue::artwork(item_id, art, max_width, ext, index);
        PlaceholderValues::from_state(&self.config, &self.auth)
            .resolve(&template)
            .into_owned()
    }
}

fn decode<T: DeserializeOwned>(value: Option<Value>) -> Result<Option<T>, ApiError> {
    match value {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Strip the public-info handler from the URL that answered it.
fn server_root(mut url: Url) -> String {
    const PUBLIC_INFO: &str = "/System/Info/Public";
    url.set_query(None);
    url.set_fragment(None);
    let path = url.path().to_string();
    let root = path
        .len()
        .checked_sub(PUBLIC_INFO.len())
        .filter(|&cut| path.get(cut..).is_some_and(|tail| tail.eq_ignore_ascii_case(PUBLIC_INFO)))
        .map_or(path.as_str(), |cut| &path[..cut]);
    url.set_path(root);
    url.as_str().trim_end_matches('/').to_string()
}
