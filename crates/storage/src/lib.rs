//! Storage abstraction and implementations for bookwork.
//!
//! This crate provides the persistence gateway trait with an in-memory and a
//! JSON-file implementation.

#![warn(missing_docs)]

pub mod trait_;
pub mod json_storage;
pub mod memory;

pub use trait_::{Storage, StorageError, Result};
pub use json_storage::JsonStorage;
pub use memory::MemoryStorage;
