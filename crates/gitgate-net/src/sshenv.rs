//! SSH connection environment
//!
//! Captures what openssh sets for a forced command: the original client
//! command, the connection tuple and the negotiated git protocol version.

use std::env;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Env {
    /// Value of GIT_PROTOCOL, e.g. "version=2". Empty when not negotiated.
    pub git_protocol: String,
    pub is_ssh_connection: bool,
    /// Client address, first field of SSH_CONNECTION.
    pub remote_addr: String,
    pub original_command: String,
}

impl Env {
    /// Capture from the process environment.
    pub fn capture() -> Self {
        let ssh_connection = env::var("SSH_CONNECTION").unwrap_or_default();
        Self {
            git_protocol: env::var("GIT_PROTOCOL").unwrap_or_default(),
            is_ssh_connection: !ssh_connection.is_empty(),
            remote_addr: remote_addr(&ssh_connection),
            original_command: env::var("SSH_ORIGINAL_COMMAND").unwrap_or_default(),
        }
    }
}

/// SSH_CONNECTION is "<client ip> <client port> <server ip> <server port>".
fn remote_addr(ssh_connection: &str) -> String {
    ssh_connection
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string()
}
