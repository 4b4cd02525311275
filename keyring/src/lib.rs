//! ceph-keyring - lifecycle management for Ceph admin and bootstrap keyrings
//!
//! Resolves where each role's keyring lives, generates keyrings through
//! `ceph-authtool`, persists caller-supplied keyrings and removes them,
//! never replacing a keyring that already exists.

pub mod command;
pub mod config;
pub mod error;
pub mod format;
pub mod layout;
pub mod manager;
pub mod roles;
pub mod version;

pub use command::{CommandOutput, CommandRunner, LocalCommandRunner};
pub use config::Config;
pub use error::{KeyringError, Result};
pub use layout::PathLayout;
pub use manager::{KeyringManager, KeyringRecord, KeyringStatus, RemoveOutcome, WriteOutcome};
pub use roles::{lookup, Role, RoleDefinition};
pub use version::ClusterVersion;
