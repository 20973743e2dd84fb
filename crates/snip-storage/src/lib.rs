//! Concrete storage for snip: encryption at rest over a flat JSON file.
//! AES-GCM tokens on the `code` field, keys from a `KeyProvider`
//! (raw key file in production; memory in tests).

pub mod encrypted_store;
pub mod field_cipher;
pub mod key_provider;

pub use encrypted_store::EncryptedSnippetStore;
pub use field_cipher::{CipherError, FieldCipher};
pub use key_provider::{FileKeyProvider, InMemoryKeyProvider, KeyError, KeyMaterial, KeyProvider};
