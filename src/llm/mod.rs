//! Clients for the remote embedding and chat providers.

pub mod chat;
pub mod embeddings;
pub mod error;

pub use error::{ErrorKind, ProviderError};
