//! Relay of a git invocation through the internal API
//!
//! When the verifier routes an invocation to the primary instead of the
//! local backend, the exchange happens as two ordered JSON calls: an "info"
//! call whose result goes straight to the client, then a "pack" call
//! carrying everything the client wrote. A failure in the first phase stops
//! the exchange before the second.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use gitgate_net::verifier::{AccessDecision, CustomPayloadData};
use gitgate_net::Client;

/// Binary fields ride the JSON wire base64-encoded.
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Serialize)]
struct ExchangeRequest {
    data: CustomPayloadData,
    #[serde(with = "base64_bytes")]
    output: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    #[serde(default, with = "base64_bytes")]
    result: Vec<u8>,
}

/// Two-phase relay over the payload's API endpoints.
pub struct CustomAction<R, W> {
    client: Client,
    input: R,
    output: W,
    /// True when the caller already drained the client's stream and `input`
    /// replays the captured bytes.
    eof_sent: bool,
}

impl<R, W> CustomAction<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(client: Client, input: R, output: W, eof_sent: bool) -> Self {
        Self {
            client,
            input,
            output,
            eof_sent,
        }
    }

    /// Run both phases of the exchange. The client's input is read exactly
    /// once, between the info call and the pack call.
    pub async fn execute(mut self, decision: &AccessDecision) -> Result<()> {
        let payload = decision
            .payload
            .as_ref()
            .context("custom action without a payload")?;
        let endpoints = &payload.data.api_endpoints;
        if endpoints.len() != 2 {
            bail!(
                "custom action expects an info and a pack endpoint, got {}",
                endpoints.len()
            );
        }

        let mut data = payload.data.clone();
        data.user_id = decision.who.clone();

        debug!(action = %payload.action, eof_sent = self.eof_sent, "relaying through custom action");

        // Phase one: announce the exchange. Nothing has been read from the
        // client at this point, so output is empty either way.
        let info = self.call(&endpoints[0], &data, Vec::new()).await?;
        self.output.write_all(&info.result).await?;

        // Phase two: everything the client wrote.
        let client_input = self.read_input().await?;
        let pack = self.call(&endpoints[1], &data, client_input).await?;
        self.output.write_all(&pack.result).await?;
        self.output.flush().await?;

        Ok(())
    }

    async fn call(
        &self,
        endpoint: &str,
        data: &CustomPayloadData,
        output: Vec<u8>,
    ) -> Result<ExchangeResponse> {
        let request = ExchangeRequest {
            data: data.clone(),
            output,
        };
        let response = self
            .client
            .post_json(endpoint, &request)
            .await
            .with_context(|| format!("custom action call to {endpoint}"))?;
        Ok(response)
    }

    async fn read_input(&mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.input
            .read_to_end(&mut buf)
            .await
            .context("reading client input")?;
        Ok(buf)
    }
}
