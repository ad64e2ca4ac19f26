//! Sessions: the connection resource the transport dispatches through.
//!
//! # Design
//! `Connector` opens sessions and `Session` executes one prepared request.
//! The transport only sees these traits, so tests can script responses and
//! count how often a session was opened. `UreqConnector` is the production
//! implementation; its session wraps a pooled `ureq::Agent`.

use std::io;

use ureq::tls::TlsConfig;
use ureq::{Agent, RequestBuilder, ResponseExt, Timeout};
use url::Url;

use crate::config::ClientConfig;
use crate::error::DispatchError;
use crate::http::{HttpMethod, HttpResponse, PreparedRequest};

pub trait Connector {
    type Session: Session;

    fn connect(&self, config: &ClientConfig) -> Result<Self::Session, DispatchError>;
}

pub trait Session {
    /// Execute `request`. Any HTTP status is a response; only failures to
    /// obtain one are errors.
    fn send(&mut self, request: &PreparedRequest) -> Result<HttpResponse, DispatchError>;
}

/// Opens `ureq` sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct UreqConnector;

impl Connector for UreqConnector {
    type Session = UreqSession;

    fn connect(&self, config: &ClientConfig) -> Result<UreqSession, DispatchError> {
        Ok(UreqSession::new(config.http.verify_tls))
    }
}

/// Connection pool backed by `ureq`.
///
/// TLS verification is an agent-level setting, so a request that overrides
/// the configured policy gets a second agent, built on first use.
#[derive(Debug)]
pub struct UreqSession {
    verified: Option<Agent>,
    unverified: Option<Agent>,
}

impl UreqSession {
    fn new(verify_tls: bool) -> Self {
        let mut session = Self {
            verified: None,
            unverified: None,
        };
        session.agent(verify_tls);
        session
    }

    fn agent(&mut self, verify_tls: bool) -> &Agent {
        let slot = if verify_tls {
            &mut self.verified
        } else {
            &mut self.unverified
        };
        slot.get_or_insert_with(|| build_agent(verify_tls))
    }
}

fn build_agent(verify_tls: bool) -> Agent {
    Agent::config_builder()
        .http_status_as_error(false)
        .tls_config(TlsConfig::builder().disable_verification(!verify_tls).build())
        .build()
        .new_agent()
}

/// The request timeout bounds each phase up to the response head. The body
/// has no deadline, so a slow but live download runs to completion.
fn configure<B>(builder: RequestBuilder<B>, request: &PreparedRequest) -> RequestBuilder<B> {
    let timeout = Some(request.timeout);
    let mut builder = builder
        .config()
        .timeout_resolve(timeout)
        .timeout_connect(timeout)
        .timeout_send_request(timeout)
        .timeout_send_body(timeout)
        .timeout_recv_response(timeout)
        .build();
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

impl Session for UreqSession {
    fn send(&mut self, request: &PreparedRequest) -> Result<HttpResponse, DispatchError> {
        let agent = self.agent(request.verify_tls);
        let url = request.url.as_str();

        let result = match request.method {
            HttpMethod::Get => configure(agent.get(url), request).call(),
            HttpMethod::Head => configure(agent.head(url), request).call(),
            HttpMethod::Delete => configure(agent.delete(url), request).call(),
            HttpMethod::Post => {
                let builder = configure(agent.post(url), request);
                match &request.body {
                    Some(body) => builder.send(body.as_slice()),
                    None => builder.send_empty(),
                }
            }
        };
        let response = result.map_err(classify)?;

        let final_url = Url::parse(&response.get_uri().to_string()).ok();
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
                (name.as_str().to_string(), value)
            })
            .collect();
        let body = response.into_body().into_reader();

        let mut response = HttpResponse::new(status, headers, body);
        response.final_url = final_url;
        Ok(response)
    }
}

fn classify(error: ureq::Error) -> DispatchError {
    let message = error.to_string();
    match &error {
        ureq::Error::Timeout(Timeout::Resolve | Timeout::Connect) => DispatchError::Connect(message),
        ureq::Error::Timeout(_) => DispatchError::Timeout(message),
        ureq::Error::HostNotFound | ureq::Error::ConnectionFailed => DispatchError::Connect(message),
        ureq::Error::Io(io_error) => match io_error.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => DispatchError::Timeout(message),
            _ => DispatchError::Connect(message),
        },
        ureq::Error::BadUri(_) => DispatchError::InvalidUrl(message),
        _ => DispatchError::Other(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_map_to_transient_kinds() {
        let refused = classify(ureq::Error::Io(io::Error::from(io::ErrorKind::ConnectionRefused)));
        assert!(matches!(refused, DispatchError::Connect(_)));

        let timed_out = classify(ureq::Error::Io(io::Error::from(io::ErrorKind::TimedOut)));
        assert!(matches!(timed_out, DispatchError::Timeout(_)));
    }

    #[test]
    fn connect_phase_timeouts_are_connection_failures() {
        for phase in [Timeout::Resolve, Timeout::Connect] {
            assert!(matches!(classify(ureq::Error::Timeout(phase)), DispatchError::Connect(_)));
        }
        for phase in [Timeout::RecvResponse, Timeout::SendRequest, Timeout::Global] {
            assert!(matches!(classify(ureq::Error::Timeout(phase)), DispatchError::Timeout(_)));
        }
    }

    #[test]
    fn unknown_host_is_a_connection_failure() {
        assert!(matches!(classify(ureq::Error::HostNotFound), DispatchError::Connect(_)));
        assert!(matches!(
            classify(ureq::Error::BadUri("nope".to_string())),
            DispatchError::InvalidUrl(_)
        ));
    }

    #[test]
    fn override_builds_second_agent_lazily() {
        let mut session = UreqConnector.connect(&ClientConfig::default()).unwrap();
        assert!(session.verified.is_some());
        assert!(session.unverified.is_none());
        session.agent(false);
        assert!(session.unverified.is_some());
    }
}
