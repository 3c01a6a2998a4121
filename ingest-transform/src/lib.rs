//! Artifact-to-document transformers: header/body rendering, chunking,
//! content hashing, and permission derivation.

mod asana_task;
mod chunking;
mod content_hash;
mod permission_token;

pub use asana_task::*;
pub use chunking::*;
pub use content_hash::*;
pub use permission_token::*;
