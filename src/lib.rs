pub mod acquire;
pub mod archive;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod http;
pub mod install;
pub mod launcher;
pub mod package_manager;
pub mod placement;
pub mod platform;
pub mod runtime;
pub mod verify;
