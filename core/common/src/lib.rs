//! Common utilities and types shared across vaultserve modules.
//!
//! This module provides the error taxonomy used by every crate in the
//! workspace and the secret string wrapper used to carry credentials.

pub mod error;
pub mod types;

pub use error::{CredentialField, Error, Result};
pub use types::SecretString;
