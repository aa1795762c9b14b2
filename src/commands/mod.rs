//! Command handlers for the three git transport services

pub mod receive_pack;
pub mod upload_archive;
pub mod upload_pack;
