//! SSH-facing git gateway
//!
//! Turns an authorized git-over-SSH invocation into a direct RPC call to
//! the repository backend, or relays it over HTTP to the primary node when
//! the local node cannot serve the write.

use std::collections::HashMap;

use gitgate_gitaly::ConnectionRegistry;
use gitgate_net::Client;
use uuid::Uuid;

pub mod commandargs;
pub mod commands;
pub mod config;
pub mod customaction;
pub mod githttp;

pub use config::Config;

/// Shared per-invocation state handed to every command handler.
pub struct Gateway {
    pub config: Config,
    pub registry: ConnectionRegistry,
    /// Rides along on every outbound HTTP request as X-Request-Id.
    pub correlation_id: String,
}

impl Gateway {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            registry: ConnectionRegistry::new(),
            correlation_id: Uuid::new_v4().to_string(),
        }
    }

    /// Internal API client with the fixed header set.
    pub fn internal_client(&self) -> gitgate_net::Result<Client> {
        Client::new(
            &self.config.gitlab_url,
            &self.config.internal_api_headers(&self.correlation_id),
        )
    }

    /// Header set for requests going straight to the primary: whatever the
    /// payload asked for, plus the correlation id.
    pub fn relay_headers(&self, request_headers: &HashMap<String, String>) -> HashMap<String, String> {
        let mut headers = request_headers.clone();
        headers.insert("X-Request-Id".to_string(), self.correlation_id.clone());
        headers
    }
}
