//! Access verification client
//!
//! Asks the internal API whether an identity may run a git command against a
//! repository. The response doubles as the routing decision: it names the
//! backend to call directly, or carries a custom payload routing the
//! client's traffic through the primary node instead.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::Client;
use crate::error::{Error, Result};
use crate::sshenv::Env;

const ALLOWED_PATH: &str = "/api/v4/internal/allowed";

/// Placeholder the API expects when no ref changes are known yet.
const ANY_CHANGES: &str = "_any";

/// Routing decision returned by the internal API. Created once per
/// invocation and read-only afterwards.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessDecision {
    #[serde(default, rename = "status")]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    /// Logical repository id, e.g. "project-26".
    #[serde(default, rename = "gl_repository")]
    pub repo: String,
    #[serde(default, rename = "gl_id")]
    pub user_id: String,
    #[serde(default, rename = "gl_key_type")]
    pub key_type: String,
    #[serde(default, rename = "gl_key_id")]
    pub key_id: Option<i64>,
    #[serde(default, rename = "gl_username")]
    pub username: String,
    #[serde(default)]
    pub git_config_options: Vec<String>,
    #[serde(default)]
    pub gitaly: Gitaly,
    #[serde(default)]
    pub payload: Option<CustomPayload>,
    /// Identity the gateway was invoked for (e.g. "key-123"); filled in by
    /// the verifier client, not by the wire.
    #[serde(skip)]
    pub who: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Gitaly {
    #[serde(default)]
    pub repository: Repository,
    /// Scheme-qualified backend address, e.g. "tcp://host:port" or
    /// "unix:/path/to/socket".
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub token: String,
    /// Feature flags forwarded to the backend per request.
    #[serde(default)]
    pub features: HashMap<String, String>,
    #[serde(default)]
    pub use_sidechannel: bool,
}

/// Backend repository reference; passed through to RPCs, never interpreted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Repository {
    #[serde(default)]
    pub storage_name: String,
    #[serde(default)]
    pub relative_path: String,
    #[serde(default)]
    pub git_object_directory: String,
    #[serde(default)]
    pub git_alternate_object_directories: Vec<String>,
    #[serde(default)]
    pub gl_repository: String,
    #[serde(default)]
    pub gl_project_path: String,
}

/// Payload selecting the relay-to-primary path.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomPayload {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub data: CustomPayloadData,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CustomPayloadData {
    /// Ordered info and pack endpoints for the two-phase relay.
    #[serde(default)]
    pub api_endpoints: Vec<String>,
    #[serde(default, rename = "gl_username")]
    pub username: String,
    /// Repository URL on the primary node.
    #[serde(default)]
    pub primary_repo: String,
    #[serde(default, rename = "gl_id", skip_serializing_if = "String::is_empty")]
    pub user_id: String,
    /// Relay over raw git smart HTTP instead of the JSON exchange.
    #[serde(default)]
    pub geo_proxy_direct_to_primary: bool,
    /// Extra headers the primary expects (e.g. authorization).
    #[serde(default)]
    pub request_headers: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
struct Request<'a> {
    action: &'a str,
    project: &'a str,
    changes: &'a str,
    protocol: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(skip_serializing_if = "str::is_empty")]
    check_ip: &'a str,
}

pub struct Verifier {
    client: Client,
}

impl Verifier {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Verify `who` (a "key-<id>" or "username-<name>" identity) may run
    /// `action` against `repo`. An unsuccessful decision is an error
    /// carrying the server's message.
    pub async fn verify(
        &self,
        who: &str,
        action: &str,
        repo: &str,
        env: &Env,
    ) -> Result<AccessDecision> {
        let key_id = who.strip_prefix("key-");
        let username = who.strip_prefix("username-");

        let request = Request {
            action,
            project: repo,
            changes: ANY_CHANGES,
            protocol: "ssh",
            key_id,
            username,
            check_ip: &env.remote_addr,
        };

        let mut decision: AccessDecision = self.client.post_json(ALLOWED_PATH, &request).await?;
        decision.who = who.to_string();

        debug!(success = decision.success, repo = %decision.repo, "access verification");

        if !decision.success {
            let message = if decision.message.is_empty() {
                "Access denied".to_string()
            } else {
                decision.message
            };
            return Err(Error::Api(message));
        }

        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_routing_decision() {
        let body = r#"{
            "status": true,
            "gl_repository": "project-26",
            "gl_id": "user-6",
            "gl_key_type": "key",
            "gl_key_id": 1,
            "gl_username": "jane.doe",
            "gitaly": {
                "repository": {
                    "storage_name": "default",
                    "relative_path": "@hashed/5f/9c/5f9c4a.git",
                    "gl_repository": "project-26",
                    "gl_project_path": "group/private"
                },
                "address": "tcp://localhost:9999",
                "token": "token",
                "features": {"gitaly-feature-cache_invalidator": "true"},
                "use_sidechannel": true
            }
        }"#;

        let decision: AccessDecision = serde_json::from_str(body).unwrap();
        assert!(decision.success);
        assert_eq!(decision.user_id, "user-6");
        assert_eq!(decision.key_id, Some(1));
        assert_eq!(decision.gitaly.address, "tcp://localhost:9999");
        assert_eq!(decision.gitaly.repository.storage_name, "default");
        assert!(decision.gitaly.use_sidechannel);
        assert!(decision.payload.is_none());
    }

    #[test]
    fn decodes_a_custom_payload() {
        let body = r#"{
            "status": true,
            "payload": {
                "action": "geo_proxy_to_primary",
                "data": {
                    "api_endpoints": ["/geo/proxy/info_refs_receive_pack", "/geo/proxy/receive_pack"],
                    "gl_username": "custom",
                    "primary_repo": "https://repo/path"
                }
            }
        }"#;

        let decision: AccessDecision = serde_json::from_str(body).unwrap();
        let payload = decision.payload.unwrap();
        assert_eq!(payload.action, "geo_proxy_to_primary");
        assert_eq!(payload.data.api_endpoints.len(), 2);
        assert!(!payload.data.geo_proxy_direct_to_primary);
    }
}
