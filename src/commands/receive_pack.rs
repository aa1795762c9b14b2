//! git-receive-pack: push into the local backend or relay to the primary

use anyhow::Result;
use tokio::io::{stderr, stdin, stdout};

use gitgate_gitaly::proto::{Repository, SshReceivePackRequest};
use gitgate_gitaly::{ssh, GitalyCommand};
use gitgate_net::sshenv::Env;
use gitgate_net::verifier::AccessDecision;

use crate::customaction::CustomAction;
use crate::githttp::PushRelay;
use crate::Gateway;

pub async fn run(gateway: &Gateway, decision: &AccessDecision, env: &Env) -> Result<i32> {
    if let Some(payload) = &decision.payload {
        if payload.data.geo_proxy_direct_to_primary {
            let relay = PushRelay::new(
                &payload.data.primary_repo,
                &gateway.relay_headers(&payload.data.request_headers),
                stdin(),
                stdout(),
            )?;
            relay.execute().await?;
            return Ok(0);
        }

        let action = CustomAction::new(gateway.internal_client()?, stdin(), stdout(), false);
        action.execute(decision).await?;
        return Ok(0);
    }

    let repo = &decision.gitaly.repository;
    let first = SshReceivePackRequest {
        repository: Some(Repository::from(repo)),
        gl_id: decision.user_id.clone(),
        gl_repository: decision.repo.clone(),
        gl_username: decision.username.clone(),
        git_config_options: decision.git_config_options.clone(),
        git_protocol: env.git_protocol.clone(),
        ..Default::default()
    };

    let command = GitalyCommand::new(decision);
    let exit_code = command
        .run(&gateway.registry, env, Some(repo), |ctx, channel| {
            ssh::receive_pack(ctx, channel, first, stdin(), stdout(), stderr())
        })
        .await?;
    Ok(exit_code)
}
