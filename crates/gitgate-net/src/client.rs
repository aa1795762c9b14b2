//! Minimal JSON-over-HTTP client for the internal API
//!
//! Carries a base URL and a fixed header set (shared secret, correlation id)
//! applied to every request. Higher layers add their own content
//! negotiation on top.

use std::collections::HashMap;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};

#[derive(Debug)]
pub struct Client {
    base_url: String,
    headers: HeaderMap,
    http: reqwest::Client,
}

#[derive(serde::Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: String,
}

impl Client {
    /// `base_url` must be http(s); `headers` is attached to every request.
    pub fn new(base_url: &str, headers: &HashMap<String, String>) -> Result<Self> {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::InvalidBaseUrl(base_url.to_string()));
        }

        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| Error::InvalidHeader(name.clone()))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|_| Error::InvalidHeader(name.clone()))?;
            header_map.insert(header_name, header_value);
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            headers: header_map,
            http: reqwest::Client::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET a path (with query). The response is returned unread.
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        debug!(path, "GET");
        let response = self
            .http
            .get(self.url(path))
            .headers(self.headers.clone())
            .send()
            .await?;
        Ok(response)
    }

    /// POST a JSON body and decode a JSON response. A non-success status is
    /// mapped to the server's error message when the body carries one.
    pub async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        debug!(path, "POST");
        let response = self
            .http
            .post(self.url(path))
            .headers(self.headers.clone())
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(match serde_json::from_slice::<ErrorResponse>(&bytes) {
                Ok(err) if !err.message.is_empty() => Error::Api(err.message),
                _ => Error::Status(status.as_u16()),
            });
        }

        Ok(serde_json::from_slice(&bytes)?)
    }

    /// POST a streaming body with explicit content negotiation headers. The
    /// response is returned unread so the caller can stream it onward.
    pub async fn post_stream(
        &self,
        path: &str,
        content_type: &str,
        accept: &str,
        body: reqwest::Body,
    ) -> Result<reqwest::Response> {
        debug!(path, content_type, "POST (stream)");
        let response = self
            .http
            .post(self.url(path))
            .headers(self.headers.clone())
            .header(CONTENT_TYPE, content_type)
            .header(ACCEPT, accept)
            .body(body)
            .send()
            .await?;
        Ok(response)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_base_url() {
        let err = Client::new("unix:/var/run/api.sock", &HashMap::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidBaseUrl(_)));
    }

    #[test]
    fn trailing_slash_is_normalized() {
        let client = Client::new("http://localhost:8080/", &HashMap::new()).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(client.url("/info/refs"), "http://localhost:8080/info/refs");
    }

    #[test]
    fn rejects_unrepresentable_headers() {
        let mut headers = HashMap::new();
        headers.insert("X-Bad\nName".to_string(), "value".to_string());
        let err = Client::new("http://localhost:8080", &headers).unwrap_err();
        assert!(matches!(err, Error::InvalidHeader(_)));
    }
}
