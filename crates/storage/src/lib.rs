//! Content-addressed pinning for property documents and manifests.
//!
//! [`StorageClient`] is the contract the registrar depends on; the Pinata
//! client talks to the hosted pinning API and the memory client backs local
//! runs and tests.

pub mod cid;
pub mod client;
pub mod memory;
pub mod pinata;

pub use cid::content_id_for;
pub use client::{Result, StorageClient, StorageError};
pub use memory::MemoryStorageClient;
pub use pinata::{PinataClient, PinataCredentials, DEFAULT_PINATA_API_URL};
