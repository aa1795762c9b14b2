//! git-upload-pack: fetch from the local backend or relay to the primary

use anyhow::Result;
use tokio::io::{stderr, stdin, stdout};

use gitgate_gitaly::proto::{Repository, SshUploadPackRequest};
use gitgate_gitaly::{ssh, GitalyCommand};
use gitgate_net::sshenv::Env;
use gitgate_net::verifier::AccessDecision;

use crate::customaction::CustomAction;
use crate::Gateway;

pub async fn run(gateway: &Gateway, decision: &AccessDecision, env: &Env) -> Result<i32> {
    if decision.payload.is_some() {
        let action = CustomAction::new(gateway.internal_client()?, stdin(), stdout(), false);
        action.execute(decision).await?;
        return Ok(0);
    }

    let repo = &decision.gitaly.repository;
    let first = SshUploadPackRequest {
        repository: Some(Repository::from(repo)),
        git_config_options: decision.git_config_options.clone(),
        git_protocol: env.git_protocol.clone(),
        ..Default::default()
    };

    let command = GitalyCommand::new(decision);
    let exit_code = command
        .run(&gateway.registry, env, Some(repo), |ctx, channel| {
            ssh::upload_pack(ctx, channel, first, stdin(), stdout(), stderr())
        })
        .await?;
    Ok(exit_code)
}
