//! HTTP plumbing for the gitgate gateway
//!
//! Talks to the GitLab-side internal API (access verification, custom action
//! relay) and to a primary node's git smart HTTP endpoints.

pub mod client;
pub mod error;
pub mod git;
pub mod sshenv;
pub mod verifier;

pub use client::Client;
pub use error::{Error, Result};
pub use git::GitClient;
