//! HTTP request and response types shared by the catalogue and the transport.
//!
//! # Design
//! `HttpRequest` is the request descriptor: plain data describing one call
//! against the media server, with placeholders such as `{UserId}` still in
//! place. Catalogue functions build it; `Transport::request` consumes it by
//! value, so a descriptor cannot be changed once dispatched.
//!
//! `PreparedRequest` is the resolved form handed to a `Session`: absolute URL
//! with query string, final headers and serialized body. `HttpResponse`
//! keeps the body as a reader so streaming downloads never buffer the whole
//! payload.

use std::fmt;
use std::io::Read;
use std::time::Duration;

use serde_json::{Map, Value};
use url::Url;

use crate::placeholder::Placeholder;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Head,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Head => "HEAD",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a request goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A path relative to the server address, e.g. `Users/{UserId}/Views`.
    Handler(String),
    /// A complete URL; the server address is not prepended.
    Url(String),
}

/// A request descriptor.
///
/// Built by the `catalogue` functions (or by hand for endpoints the catalogue
/// does not cover) and executed by `Transport::request`. `None` fields fall
/// back to the values in `ClientConfig`.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub target: Target,
    pub params: Map<String, Value>,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
    pub timeout: Option<Duration>,
    pub verify_tls: Option<bool>,
    /// Total number of dispatch attempts allowed for this call.
    pub retry: Option<u32>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, handler: impl Into<String>) -> Self {
        Self {
            method,
            target: Target::Handler(handler.into()),
            params: Map::new(),
            body: None,
            headers: Vec::new(),
            timeout: None,
            verify_tls: None,
            retry: None,
        }
    }

    pub fn get(handler: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, handler)
    }

    pub fn post(handler: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, handler)
    }

    pub fn delete(handler: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, handler)
    }

    pub fn head(handler: impl Into<String>) -> Self {
        Self::new(HttpMethod::Head, handler)
    }

    /// Replace the handler with an absolute URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.target = Target::Url(url.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Merge the entries of a JSON object into the query parameters.
    /// Non-object values are ignored.
    pub fn with_params(mut self, params: Value) -> Self {
        if let Value::Object(map) = params {
            self.params.extend(map);
        }
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = Some(verify);
        self
    }

    pub fn with_retry(mut self, attempts: u32) -> Self {
        self.retry = Some(attempts);
        self
    }
}

/// A request with every placeholder resolved, ready for a `Session`.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
    pub verify_tls: bool,
    pub attempts: u32,
    /// Placeholders that had no value and were sent verbatim.
    pub unresolved: Vec<Placeholder>,
}

impl PreparedRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// An HTTP response with a streaming body.
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Box<dyn Read>,
    /// Where the response actually came from after redirects, when the
    /// session knows it.
    pub final_url: Option<Url>,
}

impl HttpResponse {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: impl Read + 'static) -> Self {
        Self {
            status,
            headers,
            body: Box::new(body),
            final_url: None,
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("final_url", &self.final_url.as_ref().map(Url::as_str))
            .finish_non_exhaustive()
    }
}

pub(crate) fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_collects_params_and_body() {
        let req = HttpRequest::post("SyncPlay/Seek")
            .with_param("UserId", "{UserId}")
            .with_params(json!({"Limit": 5, "ParentId": null}))
            .with_body(json!({"PositionTicks": 10}));

        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.target, Target::Handler("SyncPlay/Seek".to_string()));
        assert_eq!(req.params["UserId"], "{UserId}");
        assert_eq!(req.params["Limit"], 5);
        assert!(req.params["ParentId"].is_null());
        assert_eq!(req.body, Some(json!({"PositionTicks": 10})));
        assert!(req.retry.is_none());
    }

    #[test]
    fn with_params_ignores_non_objects() {
        let req = HttpRequest::get("Users").with_params(json!([1, 2]));
        assert!(req.params.is_empty());
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let response = HttpResponse::new(
            200,
            vec![("Date".to_string(), "Mon, 01 Jan 2024 00:00:00 GMT".to_string())],
            std::io::empty(),
        );
        assert_eq!(response.header("date"), Some("Mon, 01 Jan 2024 00:00:00 GMT"));
        assert!(response.header("x-missing").is_none());
        assert!(response.is_success());
    }
}
