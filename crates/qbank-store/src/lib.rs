//! qbank-store
//!
//! Question store backends implementing `QuestionSource`: a JSON-file store
//! for the desktop data directory and an in-memory store.

pub mod error;
pub mod json;
pub mod memory;

pub use json::JsonStore;
pub use memory::MemoryStore;
