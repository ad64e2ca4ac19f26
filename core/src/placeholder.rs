//! Placeholder tokens in URLs, query parameters and JSON bodies.
//!
//! Catalogue functions write `{server}`, `{UserId}` and `{DeviceId}` where the
//! value is only known at call time. A token whose value is not set is left
//! in place; `unresolved` and `unresolved_in_value` report which ones, and
//! the transport logs them and records them on the `PreparedRequest`.

use std::borrow::Cow;

use serde_json::Value;

use crate::auth::AuthState;
use crate::config::ClientConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Server,
    UserId,
    DeviceId,
}

impl Placeholder {
    pub const ALL: [Placeholder; 3] = [Placeholder::Server, Placeholder::UserId, Placeholder::DeviceId];

    pub fn token(&self) -> &'static str {
        match self {
            Placeholder::Server => "{server}",
            Placeholder::UserId => "{UserId}",
            Placeholder::DeviceId => "{DeviceId}",
        }
    }
}

/// Values substituted for the placeholder tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderValues<'a> {
    pub server: Option<&'a str>,
    pub user_id: Option<&'a str>,
    pub device_id: Option<&'a str>,
}

impl<'a> PlaceholderValues<'a> {
    pub fn from_state(config: &'a ClientConfig, auth: &'a AuthState) -> Self {
        Self {
            server: auth.server(),
            user_id: auth.user_id(),
            device_id: Some(config.app.device_id.as_str()).filter(|id| !id.is_empty()),
        }
    }

    fn value(&self, placeholder: Placeholder) -> Option<&'a str> {
        let value = match placeholder {
            Placeholder::Server => self.server,
            Placeholder::UserId => self.user_id,
            Placeholder::DeviceId => self.device_id,
        };
        value.filter(|v| !v.is_empty())
    }

    /// Replace every occurrence of every known token.
    pub fn resolve<'s>(&self, input: &'s str) -> Cow<'s, str> {
        let mut output = Cow::Borrowed(input);
        for placeholder in Placeholder::ALL {
            if !output.contains(placeholder.token()) {
                continue;
            }
            if let Some(value) = self.value(placeholder) {
                output = Cow::Owned(output.replace(placeholder.token(), value));
            }
        }
        output
    }

    /// Resolve strings inside a JSON value, recursing into objects and arrays.
    pub fn resolve_value(&self, value: &mut Value) {
        match value {
            Value::String(s) => {
                if let Cow::Owned(resolved) = self.resolve(s) {
                    *s = resolved;
                }
            }
            Value::Object(map) => map.values_mut().for_each(|v| self.resolve_value(v)),
            Value::Array(items) => items.iter_mut().for_each(|v| self.resolve_value(v)),
            _ => {}
        }
    }

    /// Tokens present in `input` that would be left unresolved.
    pub fn unresolved(&self, input: &str) -> Vec<Placeholder> {
        Placeholder::ALL
            .into_iter()
            .filter(|p| input.contains(p.token()) && self.value(*p).is_none())
            .collect()
    }

    /// Like `unresolved`, over every string inside a JSON value. Each token
    /// is reported once.
    pub fn unresolved_in_value(&self, value: &Value) -> Vec<Placeholder> {
        let mut found = Vec::new();
        self.collect_unresolved(value, &mut found);
        found
    }

    fn collect_unresolved(&self, value: &Value, found: &mut Vec<Placeholder>) {
        match value {
            Value::String(s) => {
                for placeholder in self.unresolved(s) {
                    if !found.contains(&placeholder) {
                        found.push(placeholder);
                    }
                }
            }
            Value::Object(map) => map.values().for_each(|v| self.collect_unresolved(v, found)),
            Value::Array(items) => items.iter().for_each(|v| self.collect_unresolved(v, found)),
            _ => {}
        }
    }
}
