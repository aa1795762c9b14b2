//! Parsing of the forced command openssh hands us
//!
//! SSH_ORIGINAL_COMMAND looks like `git-receive-pack 'group/project.git'`;
//! only the three git transport commands are allowed through.

use anyhow::{bail, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    ReceivePack,
    UploadPack,
    UploadArchive,
}

impl CommandType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandType::ReceivePack => "git-receive-pack",
            CommandType::UploadPack => "git-upload-pack",
            CommandType::UploadArchive => "git-upload-archive",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "git-receive-pack" => Some(CommandType::ReceivePack),
            "git-upload-pack" => Some(CommandType::UploadPack),
            "git-upload-archive" => Some(CommandType::UploadArchive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandArgs {
    pub command: CommandType,
    pub repo: String,
}

/// Parse SSH_ORIGINAL_COMMAND into a command and repository path.
pub fn parse(original_command: &str) -> Result<CommandArgs> {
    let trimmed = original_command.trim();
    if trimmed.is_empty() {
        bail!("No command provided");
    }

    let (name, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest),
        None => (trimmed, ""),
    };

    let Some(command) = CommandType::from_str(name) else {
        bail!("Disallowed command");
    };

    let repo = strip_quotes(rest.trim());
    if repo.is_empty() {
        bail!("Repository path missing");
    }

    Ok(CommandArgs {
        command,
        repo: repo.to_string(),
    })
}

/// git quotes the repository path; both quote styles show up in the wild.
fn strip_quotes(s: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = s
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    s
}
