//! Backend command dispatch
//!
//! Wires an access decision to a backend channel: builds the outgoing
//! metadata, hands the caller a cancellable call context and translates
//! backend failures into operator-facing errors.

use std::future::Future;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokio_util::sync::{CancellationToken, DropGuard};
use tonic::metadata::{AsciiMetadataKey, AsciiMetadataValue, MetadataMap};
use tonic::transport::Channel;
use tracing::info;

use gitgate_net::sshenv::Env;
use gitgate_net::verifier::{AccessDecision, Repository};

use crate::error::{translate_status, Error, Result};
use crate::registry::{ConnectionKey, ConnectionRegistry};

/// Feature flags without this prefix never reach the backend.
const FEATURE_FLAG_PREFIX: &str = "gitaly-feature-";

/// Everything a handler needs besides the channel: per-request metadata,
/// RPC credentials and a cancellation token the dispatcher revokes when the
/// call returns.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Audit and feature-gating metadata attached to the outgoing request.
    pub metadata: MetadataMap,
    /// Bearer credentials derived from the decision's token; attached per
    /// request, outside the audit metadata.
    pub authorization: Option<AsciiMetadataValue>,
    pub cancel: CancellationToken,
}

/// One backend invocation built from an access decision.
pub struct GitalyCommand<'a> {
    decision: &'a AccessDecision,
}

impl<'a> GitalyCommand<'a> {
    pub fn new(decision: &'a AccessDecision) -> Self {
        Self { decision }
    }

    /// Run `handler` against the decision's backend. The handler's exit code
    /// and error propagate unchanged, except an unavailable backend which is
    /// rewritten to a fixed message. The call context is cancelled on every
    /// return path.
    pub async fn run<F, Fut>(
        &self,
        registry: &ConnectionRegistry,
        env: &Env,
        repo: Option<&Repository>,
        handler: F,
    ) -> Result<i32>
    where
        F: FnOnce(CallContext, Channel) -> Fut,
        Fut: Future<Output = std::result::Result<i32, tonic::Status>>,
    {
        let gitaly = &self.decision.gitaly;
        if gitaly.address.is_empty() {
            return Err(Error::MissingAddress);
        }

        let key = ConnectionKey {
            address: gitaly.address.clone(),
            token: gitaly.token.clone(),
            use_sidechannel: gitaly.use_sidechannel,
        };
        let channel = registry.get_or_create(&key)?;

        // The guard cancels the context when this frame unwinds, whether the
        // handler succeeded, failed or never ran to completion.
        let (ctx, _guard) = self.prepare_context(repo, env);

        match handler(ctx, channel).await {
            Ok(exit_code) => Ok(exit_code),
            Err(status) => Err(translate_status(status)),
        }
    }

    /// Build the call context for this invocation. Metadata carries only
    /// identity keys with known values, `git_protocol` when negotiated over
    /// an ssh connection, and feature flags with the reserved prefix.
    pub fn prepare_context(&self, repo: Option<&Repository>, env: &Env) -> (CallContext, DropGuard) {
        let mut metadata = MetadataMap::new();

        if let Some(key_id) = self.decision.key_id {
            append(&mut metadata, "key_id", &key_id.to_string());
        }
        append(&mut metadata, "key_type", &self.decision.key_type);
        append(&mut metadata, "user_id", &self.decision.user_id);
        append(&mut metadata, "username", &self.decision.username);
        append(&mut metadata, "remote_ip", &env.remote_addr);
        if env.is_ssh_connection && !env.git_protocol.is_empty() {
            append(&mut metadata, "git_protocol", &env.git_protocol);
        }

        for (name, value) in &self.decision.gitaly.features {
            if !name.starts_with(FEATURE_FLAG_PREFIX) {
                continue;
            }
            append(&mut metadata, name, value);
        }

        if let Some(repo) = repo {
            info!(
                gl_repository = %repo.gl_repository,
                gl_project_path = %repo.gl_project_path,
                relative_path = %repo.relative_path,
                "executing git command"
            );
        }

        let cancel = CancellationToken::new();
        let guard = cancel.clone().drop_guard();

        let ctx = CallContext {
            metadata,
            authorization: bearer(&self.decision.gitaly.token),
            cancel,
        };
        (ctx, guard)
    }
}

/// Append a metadata entry, skipping empty values and anything not
/// representable on the wire.
fn append(metadata: &mut MetadataMap, name: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    let (Ok(name), Ok(value)) = (
        AsciiMetadataKey::from_bytes(name.as_bytes()),
        AsciiMetadataValue::try_from(value),
    ) else {
        return;
    };
    metadata.append(name, value);
}

/// Per-RPC bearer credentials, base64 over the shared token.
fn bearer(token: &str) -> Option<AsciiMetadataValue> {
    if token.is_empty() {
        return None;
    }
    AsciiMetadataValue::try_from(format!("Bearer {}", BASE64.encode(token))).ok()
}
