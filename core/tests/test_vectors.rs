//! Verify catalogue descriptors and response classification against the JSON
//! vectors stored in `test-vectors/`.
//!
//! Request vectors are prepared against a fixed auth state and compared by
//! path, decoded query pairs and parsed body, so parameter order does not
//! matter. Response vectors replay a scripted sequence of dispatch outcomes
//! through the transport.

mod support;

use std::collections::BTreeMap;

use jellyfin_core::transport::prepare;
use jellyfin_core::{catalogue, ApiError, AuthState, DispatchError, HttpMethod, HttpRequest};
use serde_json::Value;

use support::{logged_in_client, ScriptedConnector};

fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "HEAD" => HttpMethod::Head,
        "DELETE" => HttpMethod::Delete,
        other => panic!("unknown method: {other}"),
    }
}

fn str_arg(args: &[Value], i: usize) -> &str {
    args[i].as_str().unwrap()
}

fn opt_str_arg(args: &[Value], i: usize) -> Option<&str> {
    args[i].as_str()
}

fn u32_arg(args: &[Value], i: usize) -> u32 {
    args[i].as_u64().unwrap() as u32
}

/// Build the catalogue request named by a vector.
fn build(endpoint: &str, args: &[Value]) -> HttpRequest {
    match endpoint {
        "try_server" => catalogue::try_server(),
        "get_views" => catalogue::get_views(),
        "get_season" => catalogue::get_season(str_arg(args, 0), str_arg(args, 1)),
        "get_next" => catalogue::get_next(args[0].as_u64().map(|n| n as u32), u32_arg(args, 1)),
        "search_media_items" => {
            catalogue::search_media_items(opt_str_arg(args, 0), opt_str_arg(args, 1), u32_arg(args, 2))
        }
        "get_user_settings" => catalogue::get_user_settings(str_arg(args, 0)),
        "favorite" => catalogue::favorite(str_arg(args, 0), args[1].as_bool().unwrap()),
        "close_transcode" => catalogue::close_transcode(str_arg(args, 0)),
        "get_audio_stream" => catalogue::get_audio_stream(
            str_arg(args, 0),
            str_arg(args, 1),
            str_arg(args, 2),
            args[3].as_u64().unwrap(),
            opt_str_arg(args, 4),
        ),
        "join_sync_play" => catalogue::join_sync_play(str_arg(args, 0)),
        "seek_sync_play" => catalogue::seek_sync_play(args[0].as_i64().unwrap()),
        "close_live_stream" => catalogue::close_live_stream(str_arg(args, 0)),
        "authenticate_by_name" => catalogue::authenticate_by_name(str_arg(args, 0), str_arg(args, 1)),
        other => panic!("no builder for endpoint {other}"),
    }
}

fn vector_auth() -> AuthState {
    let mut auth = AuthState::new();
    auth.set_server("http://media.local:8096");
    auth.set_credentials(Some("srv-1".to_string()), "u1".to_string(), "tok".to_string());
    auth
}

#[test]
fn request_test_vectors() {
    let raw = include_str!("../../test-vectors/requests.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let mut config = support::test_config();
    config.app.device_id = "dev-1".to_string();
    let auth = vector_auth();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let args = case["args"].as_array().unwrap();
        let expected = &case["expected_request"];

        let prepared = prepare(&config, &auth, build(case["endpoint"].as_str().unwrap(), args)).unwrap();

        assert_eq!(prepared.method, parse_method(expected["method"].as_str().unwrap()), "{name}: method");
        assert_eq!(prepared.url.host_str(), Some("media.local"), "{name}: host");
        assert_eq!(prepared.url.path(), expected["path"].as_str().unwrap(), "{name}: path");

        let query: BTreeMap<String, String> = prepared.url.query_pairs().into_owned().collect();
        let expected_query: BTreeMap<String, String> = expected["query"]
            .as_object()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.as_str().unwrap().to_string()))
            .collect();
        assert_eq!(query, expected_query, "{name}: query");

        let body: Value = match prepared.body.as_deref() {
            Some(bytes) => serde_json::from_slice(bytes).unwrap(),
            None => Value::Null,
        };
        assert_eq!(body, expected["body"], "{name}: body");
    }
}

fn script(connector: &ScriptedConnector, steps: &[Value]) {
    for step in steps {
        if let Some(error) = step["error"].as_str() {
            connector.fail(match error {
                "connect" => DispatchError::Connect("connection refused".to_string()),
                "timeout" => DispatchError::Timeout("read timed out".to_string()),
                "invalid_url" => DispatchError::InvalidUrl("bad uri".to_string()),
                "other" => DispatchError::Other("tls handshake".to_string()),
                other => panic!("unknown scripted error: {other}"),
            });
            continue;
        }
        let headers = step["headers"]
            .as_array()
            .map(|headers| {
                headers
                    .iter()
                    .map(|h| (h[0].as_str().unwrap().to_string(), h[1].as_str().unwrap().to_string()))
                    .collect()
            })
            .unwrap_or_default();
        let body = step["body"].as_str().unwrap().as_bytes().to_vec();
        connector.respond_raw(step["status"].as_u64().unwrap() as u16, headers, body);
    }
}

fn kind_name(error: &ApiError) -> &'static str {
    match error {
        ApiError::ServerUnreachable { .. } => "ServerUnreachable",
        ApiError::ReadTimeout { .. } => "ReadTimeout",
        ApiError::Unauthorized => "Unauthorized",
        ApiError::AccessRestricted { .. } => "AccessRestricted",
        ApiError::MissingSchema { .. } => "MissingSchema",
        ApiError::Http { .. } => "Http",
        ApiError::Dispatch(_) => "Dispatch",
        ApiError::Stream(_) => "Stream",
        ApiError::Json(_) => "Json",
        ApiError::UnexpectedResponse(_) => "UnexpectedResponse",
        ApiError::Config(_) => "Config",
    }
}

#[test]
fn response_test_vectors() {
    let raw = include_str!("../../test-vectors/responses.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let expected = &case["expected"];

        let connector = ScriptedConnector::new();
        script(&connector, case["script"].as_array().unwrap());
        let mut client = logged_in_client(&connector);

        let attempts = case["attempts"].as_u64().unwrap() as u32;
        let result = client.execute(catalogue::get_views().with_retry(attempts));

        match expected["result"].as_str().unwrap() {
            "json" => assert_eq!(result.unwrap(), Some(expected["json"].clone()), "{name}: json"),
            "none" => assert_eq!(result.unwrap(), None, "{name}: none"),
            "error" => {
                let err = result.unwrap_err();
                assert_eq!(kind_name(&err), expected["kind"].as_str().unwrap(), "{name}: kind");
                match &err {
                    ApiError::Http { status, body } => {
                        assert_eq!(u64::from(*status), expected["status"].as_u64().unwrap(), "{name}: status");
                        assert_eq!(body, expected["body"].as_str().unwrap(), "{name}: body");
                    }
                    ApiError::AccessRestricted { code } => {
                        assert_eq!(code, expected["code"].as_str().unwrap(), "{name}: code");
                    }
                    _ => {}
                }
            }
            other => panic!("unknown expected result: {other}"),
        }

        assert_eq!(
            connector.sent().len() as u64,
            expected["dispatched"].as_u64().unwrap(),
            "{name}: dispatched"
        );
        assert_eq!(connector.remaining(), 0, "{name}: script fully consumed");
        assert_eq!(
            client.auth().token().is_some(),
            expected["token_kept"].as_bool().unwrap(),
            "{name}: token"
        );
    }
}
