//! git-upload-archive: archive straight from the local backend

use anyhow::Result;
use tokio::io::{stderr, stdin, stdout};

use gitgate_gitaly::proto::{Repository, SshUploadArchiveRequest};
use gitgate_gitaly::{ssh, GitalyCommand};
use gitgate_net::sshenv::Env;
use gitgate_net::verifier::AccessDecision;

use crate::Gateway;

pub async fn run(gateway: &Gateway, decision: &AccessDecision, env: &Env) -> Result<i32> {
    let repo = &decision.gitaly.repository;
    let first = SshUploadArchiveRequest {
        repository: Some(Repository::from(repo)),
        ..Default::default()
    };

    let command = GitalyCommand::new(decision);
    let exit_code = command
        .run(&gateway.registry, env, Some(repo), |ctx, channel| {
            ssh::upload_archive(ctx, channel, first, stdin(), stdout(), stderr())
        })
        .await?;
    Ok(exit_code)
}
