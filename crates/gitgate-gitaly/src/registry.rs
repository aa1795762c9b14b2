//! Process-wide cache of backend channels
//!
//! One channel per (address, token, sidechannel) triple for the life of the
//! process. Channels are created lazily: the transport dials on first RPC,
//! so creation never blocks inside the registry lock and a dial happens at
//! most once per key.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Mutex;

use hyper_util::rt::TokioIo;
use tokio::net::UnixStream;
use tonic::transport::{Channel, Endpoint, Uri};
use tower::service_fn;
use tracing::debug;

use crate::error::{Error, Result};

/// Everything that makes two backend connections non-interchangeable.
/// Client identity deliberately plays no part.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    pub address: String,
    pub token: String,
    pub use_sidechannel: bool,
}

/// Registry of backend channels. Entries live until process exit; there is
/// no eviction.
#[derive(Default)]
pub struct ConnectionRegistry {
    channels: Mutex<HashMap<ConnectionKey, Channel>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cached channel for `key`, creating it on first request.
    /// Concurrent callers with the same key all resolve to the same channel;
    /// a failed creation is reported and leaves the key unoccupied.
    pub fn get_or_create(&self, key: &ConnectionKey) -> Result<Channel> {
        let mut channels = self
            .channels
            .lock()
            .expect("connection registry lock poisoned");

        match channels.entry(key.clone()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(slot) => {
                debug!(address = %key.address, "opening gitaly channel");
                let channel = open_channel(&key.address)?;
                Ok(slot.insert(channel).clone())
            }
        }
    }

    /// Number of cached channels.
    pub fn len(&self) -> usize {
        self.channels
            .lock()
            .expect("connection registry lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Turn a scheme-qualified gitaly address into a lazy channel. `tcp://` and
/// `unix:` addresses are supported.
fn open_channel(address: &str) -> Result<Channel> {
    if let Some(hostport) = address.strip_prefix("tcp://") {
        let endpoint = Endpoint::try_from(format!("http://{hostport}"))
            .map_err(|_| Error::InvalidAddress(address.to_string()))?;
        return Ok(endpoint.connect_lazy());
    }

    if let Some(raw) = address.strip_prefix("unix:") {
        let path = raw.trim_start_matches("//").to_string();
        if path.is_empty() {
            return Err(Error::InvalidAddress(address.to_string()));
        }
        // The endpoint URI is required by the builder but never resolved;
        // all traffic goes over the socket.
        let endpoint = Endpoint::try_from("http://gitaly.socket")
            .map_err(|_| Error::InvalidAddress(address.to_string()))?;
        let channel = endpoint.connect_with_connector_lazy(service_fn(move |_: Uri| {
            let path = path.clone();
            async move {
                Ok::<_, std::io::Error>(TokioIo::new(UnixStream::connect(path).await?))
            }
        }));
        return Ok(channel);
    }

    Err(Error::InvalidAddress(address.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn key(address: &str, token: &str) -> ConnectionKey {
        ConnectionKey {
            address: address.to_string(),
            token: token.to_string(),
            use_sidechannel: false,
        }
    }

    #[tokio::test]
    async fn caches_one_channel_per_key() {
        let registry = ConnectionRegistry::new();

        registry.get_or_create(&key("tcp://localhost:9999", "token")).unwrap();
        registry.get_or_create(&key("tcp://localhost:9999", "token")).unwrap();
        assert_eq!(registry.len(), 1);

        registry.get_or_create(&key("tcp://localhost:9999", "other-token")).unwrap();
        assert_eq!(registry.len(), 2);

        registry.get_or_create(&key("tcp://localhost:8888", "token")).unwrap();
        assert_eq!(registry.len(), 3);
    }

    #[tokio::test]
    async fn sidechannel_flag_partitions_the_cache() {
        let registry = ConnectionRegistry::new();

        let plain = key("tcp://localhost:9999", "token");
        let sidechannel = ConnectionKey {
            use_sidechannel: true,
            ..plain.clone()
        };

        registry.get_or_create(&plain).unwrap();
        registry.get_or_create(&sidechannel).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn concurrent_requests_resolve_to_one_channel() {
        let registry = Arc::new(ConnectionRegistry::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.get_or_create(&key("tcp://localhost:9999", "token")).unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn unix_addresses_are_accepted() {
        let registry = ConnectionRegistry::new();

        registry.get_or_create(&key("unix:/var/run/gitaly.socket", "token")).unwrap();
        registry.get_or_create(&key("unix:///var/run/gitaly.socket", "token")).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn unknown_schemes_are_rejected_and_not_cached() {
        let registry = ConnectionRegistry::new();

        for address in ["dns://localhost:9999", "localhost:9999", "unix:"] {
            let err = registry.get_or_create(&key(address, "token")).unwrap_err();
            assert!(matches!(err, Error::InvalidAddress(_)), "{address}");
        }
        assert!(registry.is_empty());
    }
}
