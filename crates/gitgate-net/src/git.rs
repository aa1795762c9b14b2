//! Minimal git smart HTTP client
//!
//! Speaks the client side of the git smart HTTP protocol: ref advertisement
//! via `GET /info/refs` and the two pack services via POST. Bodies stream in
//! both directions; pkt-line payloads are opaque bytes here.

use std::collections::HashMap;

use reqwest::{Body, Response};

use crate::client::Client;
use crate::error::{Error, Result};

/// Pack transfer services offered by a git smart HTTP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    ReceivePack,
    UploadPack,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::ReceivePack => "git-receive-pack",
            Service::UploadPack => "git-upload-pack",
        }
    }

    pub fn request_content_type(&self) -> &'static str {
        match self {
            Service::ReceivePack => "application/x-git-receive-pack-request",
            Service::UploadPack => "application/x-git-upload-pack-request",
        }
    }

    pub fn result_content_type(&self) -> &'static str {
        match self {
            Service::ReceivePack => "application/x-git-receive-pack-result",
            Service::UploadPack => "application/x-git-upload-pack-result",
        }
    }
}

/// Client for one remote repository's smart HTTP endpoints.
///
/// The header set given at construction (authorization, correlation id, any
/// extra static headers) rides along on every request.
pub struct GitClient {
    client: Client,
}

impl GitClient {
    pub fn new(base_url: &str, headers: &HashMap<String, String>) -> Result<Self> {
        Ok(Self {
            client: Client::new(base_url, headers)?,
        })
    }

    pub fn base_url(&self) -> &str {
        self.client.base_url()
    }

    /// `GET /info/refs?service=<service>`. The body is returned unread.
    pub async fn info_refs(&self, service: &str) -> Result<Response> {
        let response = self
            .client
            .get(&format!("/info/refs?service={service}"))
            .await?;
        check(response)
    }

    /// `POST /git-receive-pack`, streaming `body` as the request body.
    pub async fn receive_pack(&self, body: impl Into<Body>) -> Result<Response> {
        self.post_service(Service::ReceivePack, body.into()).await
    }

    /// `POST /git-upload-pack`, streaming `body` as the request body.
    pub async fn upload_pack(&self, body: impl Into<Body>) -> Result<Response> {
        self.post_service(Service::UploadPack, body.into()).await
    }

    async fn post_service(&self, service: Service, body: Body) -> Result<Response> {
        let response = self
            .client
            .post_stream(
                &format!("/{}", service.as_str()),
                service.request_content_type(),
                service.result_content_type(),
                body,
            )
            .await?;
        check(response)
    }
}

/// No retries and no rewriting: an HTTP-level failure surfaces as-is, with
/// the status preserved for the caller.
fn check(response: Response) -> Result<Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(Error::Status(response.status().as_u16()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_names_and_content_types() {
        assert_eq!(Service::ReceivePack.as_str(), "git-receive-pack");
        assert_eq!(
            Service::ReceivePack.request_content_type(),
            "application/x-git-receive-pack-request"
        );
        assert_eq!(
            Service::UploadPack.result_content_type(),
            "application/x-git-upload-pack-result"
        );
    }
}
