//! Core abstractions for snip: the snippet data model and the store contract.
//! This crate is intentionally small to keep dependency surface minimal.

pub mod snippet;
pub mod store;

pub use snippet::{next_id, Snippet, SnippetPatch};
pub use store::{SnippetStore, StoreError};
