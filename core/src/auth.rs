//! Authentication state and request headers.
//!
//! # Design
//! `AuthState` is the only mutable state the transport touches. It changes at
//! four points:
//! - `set_server` when the caller picks a server,
//! - `set_credentials` after a successful login,
//! - `revoke_token` when the server answers 401 without an application error,
//! - `record_server_time` after every successful response with a `Date` header.

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::config::ClientConfig;
use crate::http::find_header;

pub const AUTHORIZATION_HEADER: &str = "x-emby-authorization";
pub const TOKEN_HEADER: &str = "X-MediaBrowser-Token";
pub const APPLICATION_ERROR_HEADER: &str = "X-Application-Error-Code";

/// Server address and credentials of the current session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    server: Option<String>,
    server_id: Option<String>,
    user_id: Option<String>,
    token: Option<String>,
    server_time: Option<String>,
}

impl AuthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn server(&self) -> Option<&str> {
        self.server.as_deref()
    }

    pub fn server_id(&self) -> Option<&str> {
        self.server_id.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// The raw `Date` header of the last successful response.
    pub fn server_time(&self) -> Option<&str> {
        self.server_time.as_deref()
    }

    /// The last server `Date` header, parsed.
    pub fn server_time_utc(&self) -> Option<DateTime<Utc>> {
        let raw = self.server_time.as_deref()?;
        DateTime::parse_from_rfc2822(raw).ok().map(|t| t.with_timezone(&Utc))
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.user_id.is_some()
    }

    /// Set the server address. A trailing slash is dropped so handlers can
    /// be joined with a single `/`.
    pub fn set_server(&mut self, address: &str) {
        self.server = Some(address.trim_end_matches('/').to_string());
    }

    pub fn set_credentials(&mut self, server_id: Option<String>, user_id: String, token: String) {
        info!(user_id = user_id.as_str(); "Stored credentials");
        self.server_id = server_id;
        self.user_id = Some(user_id);
        self.token = Some(token);
    }

    /// Forget the access token. The user id is kept so a later login can be
    /// matched to the same account.
    pub fn revoke_token(&mut self) {
        if self.token.take().is_some() {
            info!("Access token revoked");
        }
    }

    pub fn record_server_time(&mut self, date: &str) {
        debug!(date = date; "Server time recorded");
        self.server_time = Some(date.to_string());
    }

    /// Drop everything, including the server address.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// The `x-emby-authorization` header value.
///
/// `UserId` is appended only when both a token and a user id are known.
pub fn authorization_header(config: &ClientConfig, auth: &AuthState) -> String {
    let app = &config.app;
    let mut value = format!(
        r#"MediaBrowser Client="{}", Device="{}", DeviceId="{}", Version="{}""#,
        app.name, app.device_name, app.device_id, app.version
    );
    if let (Some(_), Some(user_id)) = (auth.token(), auth.user_id()) {
        value.push_str(&format!(r#", UserId="{user_id}""#));
    }
    value
}

/// Fill in default and authentication headers.
///
/// Defaults are added only when the caller supplied no headers at all. The
/// authorization header is added unless one is already present, and the
/// token header only alongside a complete `UserId` and when the caller did
/// not supply one.
pub fn apply_headers(headers: &mut Vec<(String, String)>, config: &ClientConfig, auth: &AuthState) {
    if headers.is_empty() {
        headers.extend([
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Accept-Charset".to_string(), "UTF-8,*".to_string()),
            ("Accept-Encoding".to_string(), "gzip".to_string()),
            ("User-Agent".to_string(), config.user_agent()),
        ]);
    }

    if find_header(headers, AUTHORIZATION_HEADER).is_some() {
        return;
    }
    headers.push((AUTHORIZATION_HEADER.to_string(), authorization_header(config, auth)));
    if find_header(headers, TOKEN_HEADER).is_some() {
        return;
    }
    if let (Some(token), Some(_)) = (auth.token(), auth.user_id()) {
        headers.push((TOKEN_HEADER.to_string(), token.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppInfo;

    fn config() -> ClientConfig {
        ClientConfig::new(AppInfo::new("X", "9.9", "D", "1"))
    }

    fn logged_in() -> AuthState {
        let mut auth = AuthState::new();
        auth.set_server("http://media.local:8096/");
        auth.set_credentials(Some("srv".to_string()), "u1".to_string(), "tok".to_string());
        auth
    }

    #[test]
    fn header_without_credentials() {
        let header = authorization_header(&config(), &AuthState::new());
        assert_eq!(
            header,
            r#"MediaBrowser Client="X", Device="D", DeviceId="1", Version="9.9""#
        );
    }

    #[test]
    fn header_with_credentials_appends_user_id() {
        let header = authorization_header(&config(), &logged_in());
        assert_eq!(
            header,
            r#"MediaBrowser Client="X", Device="D", DeviceId="1", Version="9.9", UserId="u1""#
        );
    }

    #[test]
    fn user_id_alone_is_not_enough() {
        let mut auth = logged_in();
        auth.revoke_token();
        let header = authorization_header(&config(), &auth);
        assert!(!header.contains("UserId"));
    }

    #[test]
    fn apply_headers_adds_defaults_and_token() {
        let mut headers = Vec::new();
        apply_headers(&mut headers, &config(), &logged_in());

        assert_eq!(find_header(&headers, "content-type"), Some("application/json"));
        assert_eq!(find_header(&headers, "user-agent"), Some("X/9.9"));
        assert_eq!(find_header(&headers, TOKEN_HEADER), Some("tok"));
        assert!(find_header(&headers, AUTHORIZATION_HEADER).unwrap().ends_with(r#"UserId="u1""#));
    }

    #[test]
    fn apply_headers_respects_caller_headers() {
        let mut headers = vec![
            ("Accept".to_string(), "text/plain".to_string()),
            ("X-Emby-Authorization".to_string(), "custom".to_string()),
        ];
        apply_headers(&mut headers, &config(), &logged_in());

        assert_eq!(headers.len(), 2);
        assert_eq!(find_header(&headers, AUTHORIZATION_HEADER), Some("custom"));
        assert!(find_header(&headers, TOKEN_HEADER).is_none());
    }

    #[test]
    fn caller_token_is_not_duplicated() {
        let mut headers = vec![(TOKEN_HEADER.to_string(), "other".to_string())];
        apply_headers(&mut headers, &config(), &logged_in());

        let tokens: Vec<&str> = headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(TOKEN_HEADER))
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(tokens, vec!["other"]);
        assert!(find_header(&headers, AUTHORIZATION_HEADER).is_some());
    }

    #[test]
    fn revoke_keeps_user_and_server() {
        let mut auth = logged_in();
        auth.revoke_token();
        assert!(auth.token().is_none());
        assert_eq!(auth.user_id(), Some("u1"));
        assert_eq!(auth.server(), Some("http://media.local:8096"));
        assert!(!auth.is_authenticated());
    }

    #[test]
    fn server_time_parses_http_date() {
        let mut auth = AuthState::new();
        assert!(auth.server_time_utc().is_none());
        auth.record_server_time("Tue, 02 Jan 2024 03:04:05 GMT");
        let parsed = auth.server_time_utc().unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-01-02T03:04:05+00:00");
    }
}
