//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `Session`: who is logged in, persisted to the data directory
//! - `CredentialStore`: the bearer token, kept in the OS keychain
//!
//! The session file never contains the token itself.

pub mod credentials;
pub mod session;

pub use credentials::CredentialStore;
pub use session::{Session, SessionData};
