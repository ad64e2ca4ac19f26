//! Blocking client for the Jellyfin media-server REST API.
//!
//! # Overview
//! The `catalogue` module maps each server operation to an `HttpRequest`
//! descriptor. The `Transport` resolves placeholders such as `{UserId}`,
//! injects the `MediaBrowser` authorization header, dispatches the request
//! with a bounded retry budget, and turns the response into JSON or a typed
//! `ApiError`. `JellyfinClient` ties both together with the configuration
//! and the authentication state.
//!
//! # Design
//! - `ClientConfig` is read-only during a call; `AuthState` holds the values
//!   that change (server, token, user id) and is only mutated at login,
//!   token revocation and server-time recording.
//! - Connection handling sits behind the `Connector` / `Session` traits;
//!   `UreqConnector` is the default.
//! - Logging goes through the `log` facade with structured key-values.
//!
//! ```rust,no_run
//! use jellyfin_core::{catalogue, AppInfo, ClientConfig, JellyfinClient};
//!
//! # fn example() -> Result<(), jellyfin_core::ApiError> {
//! let config = ClientConfig::new(AppInfo::new("Shelf", "1.0.0", "Laptop", "laptop-01"));
//! let mut client = JellyfinClient::new(config);
//! client.login("http://localhost:8096", "alice", "secret")?;
//! let views = client.execute(catalogue::get_views())?;
//! println!("{views:?}");
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod catalogue;
pub mod client;
pub mod config;
pub mod connector;
pub mod error;
pub mod events;
pub mod http;
pub mod placeholder;
pub mod retry;
pub mod transport;
pub mod types;

pub use auth::AuthState;
pub use client::JellyfinClient;
pub use config::{AppInfo, ClientConfig, HttpSettings};
pub use connector::{Connector, Session, UreqConnector, UreqSession};
pub use error::{ApiError, DispatchError, ErrorKind};
pub use events::{ClientEvent, EventCallback, EventKind};
pub use http::{HttpMethod, HttpRequest, HttpResponse, PreparedRequest, Target};
pub use transport::Transport;
pub use types::{AuthenticationResult, PublicSystemInfo, UtcTimeSample};
