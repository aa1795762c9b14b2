//! Backend wire types
//!
//! Hand-maintained prost definitions for the slice of the backend's SSH
//! service this gateway speaks. Field numbers follow the backend's
//! published schema and must not be reassigned.

use gitgate_net::verifier;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Repository {
    #[prost(string, tag = "2")]
    pub storage_name: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub relative_path: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub git_object_directory: ::prost::alloc::string::String,
    #[prost(string, repeated, tag = "5")]
    pub git_alternate_object_directories: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(string, tag = "6")]
    pub gl_repository: ::prost::alloc::string::String,
    #[prost(string, tag = "8")]
    pub gl_project_path: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExitStatus {
    #[prost(int32, tag = "1")]
    pub value: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SshUploadPackRequest {
    /// Only present in the first message of the stream.
    #[prost(message, optional, tag = "1")]
    pub repository: ::core::option::Option<Repository>,
    /// Raw data to be copied to the backend's stdin; empty in the first
    /// message.
    #[prost(bytes = "vec", tag = "2")]
    pub stdin: ::prost::alloc::vec::Vec<u8>,
    #[prost(string, repeated, tag = "4")]
    pub git_config_options: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(string, tag = "5")]
    pub git_protocol: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SshUploadPackResponse {
    #[prost(bytes = "vec", tag = "1")]
    pub stdout: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub stderr: ::prost::alloc::vec::Vec<u8>,
    /// Only set in the last message of the stream.
    #[prost(message, optional, tag = "3")]
    pub exit_status: ::core::option::Option<ExitStatus>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SshReceivePackRequest {
    #[prost(message, optional, tag = "1")]
    pub repository: ::core::option::Option<Repository>,
    #[prost(bytes = "vec", tag = "2")]
    pub stdin: ::prost::alloc::vec::Vec<u8>,
    #[prost(string, tag = "3")]
    pub gl_id: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub gl_repository: ::prost::alloc::string::String,
    #[prost(string, tag = "5")]
    pub gl_username: ::prost::alloc::string::String,
    #[prost(string, repeated, tag = "6")]
    pub git_config_options: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(string, tag = "7")]
    pub git_protocol: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SshReceivePackResponse {
    #[prost(bytes = "vec", tag = "1")]
    pub stdout: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub stderr: ::prost::alloc::vec::Vec<u8>,
    #[prost(message, optional, tag = "3")]
    pub exit_status: ::core::option::Option<ExitStatus>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SshUploadArchiveRequest {
    #[prost(message, optional, tag = "1")]
    pub repository: ::core::option::Option<Repository>,
    #[prost(bytes = "vec", tag = "2")]
    pub stdin: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SshUploadArchiveResponse {
    #[prost(bytes = "vec", tag = "1")]
    pub stdout: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub stderr: ::prost::alloc::vec::Vec<u8>,
    #[prost(message, optional, tag = "3")]
    pub exit_status: ::core::option::Option<ExitStatus>,
}

impl From<&verifier::Repository> for Repository {
    fn from(repo: &verifier::Repository) -> Self {
        Self {
            storage_name: repo.storage_name.clone(),
            relative_path: repo.relative_path.clone(),
            git_object_directory: repo.git_object_directory.clone(),
            git_alternate_object_directories: repo.git_alternate_object_directories.clone(),
            gl_repository: repo.gl_repository.clone(),
            gl_project_path: repo.gl_project_path.clone(),
        }
    }
}
