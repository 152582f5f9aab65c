//! Typed vault items decoded from the local vault server.
//!
//! The server answers item listings with a JSON envelope whose entries are
//! heterogeneous: each entry carries an integer `type` that selects one of a
//! closed set of record shapes. This module resolves that discriminator
//! through a fixed lookup table and decodes each entry into a [`VaultItem`].

pub mod item;
pub mod query;

pub use item::{
    CardRecord, IdentityRecord, ItemKind, LoginRecord, SecureNoteRecord, VaultItem, VaultRecord,
};
pub use query::{decode, QueryResult};
