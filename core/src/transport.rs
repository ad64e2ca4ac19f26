//! Request dispatch, retry and response classification.
//!
//! # Design
//! `Transport::request` turns an `HttpRequest` into a `PreparedRequest`
//! (placeholders resolved, headers injected, URL validated), dispatches it
//! through the current session under a bounded retry budget, and classifies
//! the response:
//!
//! | outcome                              | result                                  |
//! |--------------------------------------|-----------------------------------------|
//! | connection failure / timeout / 502   | retried; then `ServerUnreachable`, `ReadTimeout` or `Http { 502 }` |
//! | 401 with `X-Application-Error-Code`  | `AccessRestricted`, token kept          |
//! | 401 otherwise                        | token revoked, `Unauthorized`           |
//! | 500                                  | logged, `Ok(None)`                      |
//! | other non-2xx                        | `Http { status, body }`                 |
//! | 2xx                                  | JSON body, or streamed to the destination |
//!
//! Every attempt uses the same prepared request, including POSTs. The media
//! server's mutation endpoints tolerate repeats.
//!
//! Unless `keep_alive` is configured the session is dropped after each call
//! and reopened by the next one.

use std::io::{self, Read, Write};
use std::time::Instant;

use log::{debug, error, info, warn};
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

use crate::auth::{apply_headers, AuthState, APPLICATION_ERROR_HEADER};
use crate::config::ClientConfig;
use crate::connector::{Connector, Session, UreqConnector};
use crate::error::{ApiError, DispatchError};
use crate::events::{ClientEvent, EventCallback, EventKind};
use crate::http::{HttpRequest, HttpResponse, PreparedRequest, Target};
use crate::placeholder::{Placeholder, PlaceholderValues};
use crate::retry::{retry, Retry, RetryFailure, RetryPolicy};

/// Streaming downloads are written in chunks of this size.
pub const CHUNK_SIZE: usize = 8192;

const BAD_GATEWAY: u16 = 502;

/// What a finished request produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// Parsed body; `None` for streamed, empty, non-JSON and 500 responses.
    pub json: Option<Value>,
    /// The URL that answered, after any redirects.
    pub final_url: Url,
}

#[derive(Debug, Error)]
enum AttemptError {
    #[error(transparent)]
    Dispatch(DispatchError),
    #[error("HTTP 502: {0}")]
    BadGateway(String),
}

pub struct Transport<C: Connector = UreqConnector> {
    connector: C,
    session: Option<C::Session>,
    events: Option<EventCallback>,
}

impl<C: Connector> std::fmt::Debug for Transport<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("has_session", &self.session.is_some())
            .field("has_event_callback", &self.events.is_some())
            .finish()
    }
}

impl Transport<UreqConnector> {
    pub fn new() -> Self {
        Self::with_connector(UreqConnector)
    }
}

impl Default for Transport<UreqConnector> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connector> Transport<C> {
    pub fn with_connector(connector: C) -> Self {
        Self {
            connector,
            session: None,
            events: None,
        }
    }

    pub fn set_event_callback(&mut self, callback: EventCallback) {
        self.events = Some(callback);
    }

    /// Remove the event callback, returning it so it can be put back.
    pub fn take_event_callback(&mut self) -> Option<EventCallback> {
        self.events.take()
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Open the session now instead of on the first request.
    pub fn start_session(&mut self, config: &ClientConfig) -> Result<(), ApiError> {
        if self.session.is_none() {
            let session = self.connector.connect(config).map_err(ApiError::Dispatch)?;
            info!("Session opened");
            self.session = Some(session);
        }
        Ok(())
    }

    pub fn stop_session(&mut self) {
        if self.session.take().is_some() {
            info!("Session closed");
        }
    }

    /// Execute `request`.
    ///
    /// With a `destination` the response body is copied into it in
    /// `CHUNK_SIZE` pieces and `Ok(None)` is returned. Otherwise the body is
    /// parsed as JSON; an empty or non-JSON body yields `Ok(None)`, as does a
    /// 500 response.
    pub fn request(
        &mut self,
        config: &ClientConfig,
        auth: &mut AuthState,
        request: HttpRequest,
        destination: Option<&mut dyn Write>,
    ) -> Result<Option<Value>, ApiError> {
        self.send(config, auth, request, destination).map(|reply| reply.json)
    }

    /// Like `request`, also reporting the URL that finally answered.
    pub fn send(
        &mut self,
        config: &ClientConfig,
        auth: &mut AuthState,
        request: HttpRequest,
        destination: Option<&mut dyn Write>,
    ) -> Result<Reply, ApiError> {
        let prepared = prepare(config, auth, request)?;
        debug!(method:% = prepared.method, url:% = prepared.url, attempts = prepared.attempts; "Dispatching request");

        let started = Instant::now();
        let result = self.exchange(config, auth, &prepared, destination);
        if !config.http.keep_alive {
            self.stop_session();
        }
        debug!(
            url:% = prepared.url,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok();
            "Request finished"
        );
        result
    }

    fn exchange(
        &mut self,
        config: &ClientConfig,
        auth: &mut AuthState,
        prepared: &PreparedRequest,
        destination: Option<&mut dyn Write>,
    ) -> Result<Reply, ApiError> {
        let policy = RetryPolicy::new(prepared.attempts, config.http.retry_backoff());
        let response = match retry(&policy, |_| self.attempt(config, prepared)) {
            Ok(response) => response,
            Err(failure) => return Err(self.give_up(auth, prepared, failure)),
        };
        let final_url = response.final_url.clone().unwrap_or_else(|| prepared.url.clone());
        let json = self.finish(auth, response, destination)?;
        Ok(Reply { json, final_url })
    }

    fn attempt(&mut self, config: &ClientConfig, prepared: &PreparedRequest) -> Result<HttpResponse, Retry<AttemptError>> {
        let mut session = match self.session.take() {
            Some(session) => session,
            None => {
                let session = self.connector.connect(config).map_err(into_retry)?;
                info!("Session opened");
                session
            }
        };
        let result = session.send(prepared);
        self.session = Some(session);

        match result {
            Ok(mut response) if response.status == BAD_GATEWAY => {
                Err(Retry::Transient(AttemptError::BadGateway(read_text(&mut response))))
            }
            Ok(response) => Ok(response),
            Err(error) => Err(into_retry(error)),
        }
    }

    fn give_up(&self, auth: &AuthState, prepared: &PreparedRequest, failure: RetryFailure<AttemptError>) -> ApiError {
        match failure {
            RetryFailure::Exhausted { attempts, last } => {
                error!(url:% = prepared.url, attempts = attempts; "Giving up: {last}");
                match last {
                    AttemptError::Dispatch(source @ DispatchError::Timeout(_)) => ApiError::ReadTimeout { attempts, source },
                    AttemptError::Dispatch(source @ DispatchError::Connect(_)) => {
                        self.emit(EventKind::ServerUnreachable, auth);
                        ApiError::ServerUnreachable { attempts, source }
                    }
                    AttemptError::Dispatch(source) => ApiError::Dispatch(source),
                    AttemptError::BadGateway(body) => ApiError::Http {
                        status: BAD_GATEWAY,
                        body,
                    },
                }
            }
            RetryFailure::Permanent(AttemptError::Dispatch(DispatchError::InvalidUrl(reason))) => {
                error!(url:% = prepared.url; "Request url rejected: {reason}");
                ApiError::MissingSchema {
                    url: prepared.url.to_string(),
                }
            }
            RetryFailure::Permanent(AttemptError::Dispatch(source)) => {
                error!(url:% = prepared.url; "Request failed: {source}");
                ApiError::Dispatch(source)
            }
            RetryFailure::Permanent(AttemptError::BadGateway(body)) => ApiError::Http {
                status: BAD_GATEWAY,
                body,
            },
        }
    }

    fn finish(
        &self,
        auth: &mut AuthState,
        mut response: HttpResponse,
        destination: Option<&mut dyn Write>,
    ) -> Result<Option<Value>, ApiError> {
        if !response.is_success() {
            return self.reject(auth, response);
        }

        if let Some(date) = response.header("Date") {
            auth.record_server_time(date);
        }

        if let Some(sink) = destination {
            let written = copy_chunks(&mut response.body, sink)?;
            debug!(bytes = written; "Response streamed to destination");
            return Ok(None);
        }

        let mut bytes = Vec::new();
        response.body.read_to_end(&mut bytes)?;
        if bytes.is_empty() {
            return Ok(None);
        }
        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                debug!("Response body is not JSON: {e}");
                Ok(None)
            }
        }
    }

    fn reject(&self, auth: &mut AuthState, mut response: HttpResponse) -> Result<Option<Value>, ApiError> {
        match response.status {
            401 => {
                if let Some(code) = response.header(APPLICATION_ERROR_HEADER) {
                    let code = code.to_string();
                    warn!(code = code.as_str(); "Access restricted by server");
                    self.emit(EventKind::AccessRestricted, auth);
                    return Err(ApiError::AccessRestricted { code });
                }
                warn!("Unauthorized, revoking access token");
                self.emit(EventKind::Unauthorized, auth);
                auth.revoke_token();
                return Err(ApiError::Unauthorized);
            }
            500 => {
                let body = read_text(&mut response);
                error!(body = body.as_str(); "Server returned 500, treating as empty result");
                return Ok(None);
            }
            status => {
                let body = read_text(&mut response);
                error!(status = status, body = body.as_str(); "Request rejected");
                Err(ApiError::Http { status, body })
            }
        }
    }

    fn emit(&self, kind: EventKind, auth: &AuthState) {
        if let Some(callback) = &self.events {
            callback(&ClientEvent::new(kind, auth.server_id()));
        }
    }
}

fn into_retry(error: DispatchError) -> Retry<AttemptError> {
    if error.is_transient() {
        Retry::Transient(AttemptError::Dispatch(error))
    } else {
        Retry::Permanent(AttemptError::Dispatch(error))
    }
}

/// Resolve a descriptor against the current configuration and auth state.
///
/// A handler target becomes `{server}/{handler}`. Placeholders are resolved
/// in the URL, the query parameters and the JSON body; `null` parameters are
/// dropped. Fails with `MissingSchema` when the result is not an absolute
/// `http`/`https` URL.
pub fn prepare(config: &ClientConfig, auth: &AuthState, request: HttpRequest) -> Result<PreparedRequest, ApiError> {
    let HttpRequest {
        method,
        target,
        mut params,
        mut body,
        mut headers,
        timeout,
        verify_tls,
        retry,
    } = request;

    let values = PlaceholderValues::from_state(config, auth);
    let raw_url = match target {
        Target::Url(url) => url,
        Target::Handler(handler) => format!("{{server}}/{}", handler.trim_start_matches('/')),
    };
    let unresolved = unresolved_placeholders(&values, &raw_url, &params, body.as_ref());
    if !unresolved.is_empty() {
        debug!(url = raw_url.as_str(), tokens:? = unresolved; "Placeholder values not set, sent verbatim");
    }
    let resolved = values.resolve(&raw_url).into_owned();
    for value in params.values_mut() {
        values.resolve_value(value);
    }
    if let Some(body) = body.as_mut() {
        values.resolve_value(body);
    }

    let mut url = parse_url(&resolved)?;
    append_query(&mut url, &params);
    apply_headers(&mut headers, config, auth);
    let body = body.map(|b| serde_json::to_vec(&b)).transpose()?;

    Ok(PreparedRequest {
        method,
        url,
        headers,
        body,
        timeout: timeout.unwrap_or_else(|| config.http.timeout()),
        verify_tls: verify_tls.unwrap_or(config.http.verify_tls),
        attempts: retry.unwrap_or(config.http.max_retries),
        unresolved,
    })
}

fn unresolved_placeholders(
    values: &PlaceholderValues<'_>,
    url: &str,
    params: &Map<String, Value>,
    body: Option<&Value>,
) -> Vec<Placeholder> {
    let mut found = values.unresolved(url);
    for value in params.values().chain(body) {
        for placeholder in values.unresolved_in_value(value) {
            if !found.contains(&placeholder) {
                found.push(placeholder);
            }
        }
    }
    found
}

fn parse_url(text: &str) -> Result<Url, ApiError> {
    match Url::parse(text) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(url),
        _ => {
            error!(url = text; "Request url is missing an http(s) scheme");
            Err(ApiError::MissingSchema { url: text.to_string() })
        }
    }
}

fn append_query(url: &mut Url, params: &Map<String, Value>) {
    let pairs: Vec<(&str, String)> = params
        .iter()
        .filter_map(|(key, value)| query_value(value).map(|v| (key.as_str(), v)))
        .collect();
    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }
}

fn query_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => Some(items.iter().filter_map(query_value).collect::<Vec<_>>().join(",")),
        Value::Object(_) => Some(value.to_string()),
    }
}

fn read_text(response: &mut HttpResponse) -> String {
    let mut bytes = Vec::new();
    if let Err(e) = response.body.read_to_end(&mut bytes) {
        debug!("Could not read error body: {e}");
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

fn copy_chunks(reader: &mut dyn Read, sink: &mut dyn Write) -> io::Result<u64> {
    let mut buffer = [0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        sink.write_all(&buffer[..read])?;
        total += read as u64;
    }
    sink.flush()?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AUTHORIZATION_HEADER, TOKEN_HEADER};
    use crate::config::AppInfo;
    use crate::error::ErrorKind;
    use crate::http::HttpMethod;
    use serde_json::json;
    use std::time::Duration;

    fn config() -> ClientConfig {
        ClientConfig::new(AppInfo::new("X", "9.9", "D", "dev-1"))
    }

    fn auth() -> AuthState {
        let mut auth = AuthState::new();
        auth.set_server("http://media.local:8096");
        auth.set_credentials(Some("srv".to_string()), "u1".to_string(), "tok".to_string());
        auth
    }

    #[test]
    fn prepare_joins_handler_and_resolves_everything() {
        let request = HttpRequest::post("/Users/{UserId}/Items")
            .with_params(json!({"UserId": "{UserId}", "ParentId": null, "Recursive": true, "Ids": ["a", "b"]}))
            .with_body(json!({"DeviceId": "{DeviceId}"}));

        let prepared = prepare(&config(), &auth(), request).unwrap();

        assert_eq!(prepared.method, HttpMethod::Post);
        assert_eq!(prepared.url.path(), "/Users/u1/Items");
        let query: Vec<(String, String)> = prepared.url.query_pairs().into_owned().collect();
        assert!(query.contains(&("UserId".to_string(), "u1".to_string())));
        assert!(query.contains(&("Recursive".to_string(), "true".to_string())));
        assert!(query.contains(&("Ids".to_string(), "a,b".to_string())));
        assert!(!query.iter().any(|(k, _)| k == "ParentId"));

        let body: Value = serde_json::from_slice(prepared.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"DeviceId": "dev-1"}));
        assert_eq!(prepared.header(TOKEN_HEADER), Some("tok"));
        assert!(prepared.header(AUTHORIZATION_HEADER).is_some());
    }

    #[test]
    fn prepare_applies_config_defaults_and_overrides() {
        let prepared = prepare(&config(), &auth(), HttpRequest::get("System/Info")).unwrap();
        assert_eq!(prepared.timeout, Duration::from_secs(30));
        assert_eq!(prepared.attempts, 5);
        assert!(prepared.verify_tls);
        assert!(prepared.url.query().is_none());

        let request = HttpRequest::get("System/Info")
            .with_timeout(Duration::from_secs(2))
            .with_retry(1)
            .with_verify_tls(false);
        let prepared = prepare(&config(), &auth(), request).unwrap();
        assert_eq!(prepared.timeout, Duration::from_secs(2));
        assert_eq!(prepared.attempts, 1);
        assert!(!prepared.verify_tls);
    }

    #[test]
    fn prepare_keeps_explicit_url() {
        let request = HttpRequest::get("ignored").with_url("https://other.host/System/Info/Public");
        let prepared = prepare(&config(), &AuthState::new(), request).unwrap();
        assert_eq!(prepared.url.as_str(), "https://other.host/System/Info/Public");
    }

    #[test]
    fn prepare_records_placeholders_without_value() {
        let mut auth = AuthState::new();
        auth.set_server("http://media.local:8096");
        let request = HttpRequest::get("Users/{UserId}/Items")
            .with_param("ControllableByUserId", "{UserId}")
            .with_body(json!({"Owner": "{UserId}"}));

        let prepared = prepare(&config(), &auth, request).unwrap();

        assert_eq!(prepared.unresolved, vec![Placeholder::UserId]);
        assert_eq!(prepared.url.path(), "/Users/%7BUserId%7D/Items");
        assert!(prepare(&config(), &self::auth(), HttpRequest::get("Users/{UserId}/Items"))
            .unwrap()
            .unresolved
            .is_empty());
    }

    #[test]
    fn missing_server_is_missing_schema() {
        let err = prepare(&config(), &AuthState::new(), HttpRequest::get("System/Info")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingSchema);
        match err {
            ApiError::MissingSchema { url } => assert_eq!(url, "{server}/System/Info"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn schemeless_server_is_missing_schema() {
        let mut auth = AuthState::new();
        auth.set_server("192.168.1.20:8096");
        let err = prepare(&config(), &auth, HttpRequest::get("System/Info")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingSchema);
    }

    #[test]
    fn copy_chunks_preserves_order_across_chunks() {
        let data: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        let mut reader = std::io::Cursor::new(data.clone());
        let mut sink = Vec::new();
        let written = copy_chunks(&mut reader, &mut sink).unwrap();
        assert_eq!(written, data.len() as u64);
        assert_eq!(sink, data);
    }

    #[test]
    fn query_values_render_like_the_server_expects() {
        assert_eq!(query_value(&json!(null)), None);
        assert_eq!(query_value(&json!(false)).as_deref(), Some("false"));
        assert_eq!(query_value(&json!(20)).as_deref(), Some("20"));
        assert_eq!(query_value(&json!(["Movie", "Episode"])).as_deref(), Some("Movie,Episode"));
    }
}
