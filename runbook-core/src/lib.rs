//! # Runbook Core Library
//!
//! Team management for CyberPatriot practice: accounts with role-based
//! approval, teams and join requests, shared checklists, READMEs and
//! optionally encrypted notes, all recorded in an append-only audit log.
//!
//! ## Module Organization
//!
//! - `auth`: Password hashing and the approval policy
//! - `crypto`: Passphrase-based note encryption
//! - `db`: Connection pool, migrations and transactions
//! - `error`: Domain error type
//! - `models`: Database models and queries
//! - `services`: Operations that combine policy, writes and audit

pub mod auth;
pub mod crypto;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use error::{Error, Result};

/// Current version of the Runbook core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
