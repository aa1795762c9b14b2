//! Backend RPC dispatch for gitgate
//!
//! A process-scoped registry of backend channels, a dispatcher that builds
//! per-request metadata and translates backend failures, and the SSH
//! service exchange the git commands run over it.

pub mod dispatcher;
pub mod error;
pub mod proto;
pub mod registry;
pub mod ssh;

pub use dispatcher::{CallContext, GitalyCommand};
pub use error::{Error, Result};
pub use registry::{ConnectionKey, ConnectionRegistry};
