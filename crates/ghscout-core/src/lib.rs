//! Core utilities shared by the ghscout crates: the error type, platform
//! paths, keychain-backed credential storage and CLI error hints.

pub mod core;

pub use core::credentials::CredentialStore;
pub use core::error::{ScoutError, ScoutResult};
pub use core::error_help::{format_error_with_help, ErrorHelp};
