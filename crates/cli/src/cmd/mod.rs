//! CLI command implementations

pub mod config;
pub mod create;
pub mod init;
pub mod log;
pub mod moderators;
pub mod notifications;
pub mod remove;
pub mod request;
pub mod show;
pub mod verify;
