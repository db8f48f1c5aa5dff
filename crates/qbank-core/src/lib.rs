//! qbank-core
//!
//! Pure domain types for the question bank export pipeline: question and
//! list records, export configuration, render outcomes and the data store
//! contract. No filesystem or process access lives here.

pub mod error;
pub mod models;
pub mod naming;
pub mod source;
pub mod store_keys;
