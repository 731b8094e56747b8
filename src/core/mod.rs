//! Core building blocks shared by every scan phase
//!
//! - **config**: scan.toml parsing and validation
//! - **context**: config and catalog, loaded once per run
//! - **error**: error types with contextual help messages
//! - **lookup**: three-way answers from external sources (found, absent, failed)
//! - **retry**: bounded retries for network-facing operations
//! - **vcs**: git operations (SystemGit)

pub mod config;
pub mod context;
pub mod error;
pub mod lookup;
pub mod retry;
pub mod vcs;
