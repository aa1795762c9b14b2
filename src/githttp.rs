//! Raw git smart HTTP relay to the primary
//!
//! Forwards a push straight to the primary's repository URL: ref
//! advertisement down to the client, the client's pack stream up, both
//! piped chunk by chunk so payload size never matters.

use std::collections::HashMap;

use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::Body;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tracing::debug;

use gitgate_net::GitClient;

pub struct PushRelay<R, W> {
    client: GitClient,
    input: R,
    output: W,
}

impl<R, W> PushRelay<R, W>
where
    R: AsyncRead + Send + 'static,
    W: AsyncWrite + Unpin,
{
    /// `primary_repo` is the repository URL on the primary; `headers` the
    /// fixed set it expects (authorization, correlation id).
    pub fn new(
        primary_repo: &str,
        headers: &HashMap<String, String>,
        input: R,
        output: W,
    ) -> Result<Self> {
        Ok(Self {
            client: GitClient::new(primary_repo, headers)?,
            input,
            output,
        })
    }

    /// Advertise refs from the primary, then stream the client's pack to
    /// it. A failed advertisement aborts before anything is uploaded.
    pub async fn execute(mut self) -> Result<()> {
        debug!(url = self.client_url(), "relaying push to primary");

        let advertisement = self
            .client
            .info_refs("git-receive-pack")
            .await
            .context("requesting refs from primary")?;
        copy_body(advertisement, &mut self.output).await?;

        let Self {
            client,
            input,
            mut output,
        } = self;

        let body = Body::wrap_stream(ReaderStream::new(input));
        let response = client
            .receive_pack(body)
            .await
            .context("forwarding pack to primary")?;
        copy_body(response, &mut output).await?;
        output.flush().await?;

        Ok(())
    }

    fn client_url(&self) -> &str {
        self.client.base_url()
    }
}

/// Stream a response body to `out` without materializing it.
async fn copy_body<W: AsyncWrite + Unpin>(response: reqwest::Response, out: &mut W) -> Result<()> {
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("reading primary response")?;
        out.write_all(&chunk).await?;
    }
    Ok(())
}
