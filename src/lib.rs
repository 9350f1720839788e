//! chronoset - temporal snapshot versioning
//!
//! Every change to an entity appends a new immutable snapshot and retires
//! the previous one; nothing is ever overwritten or removed. Parents pin
//! child revisions by version handle, so historical views never drift.

pub mod cli;
pub mod config;
pub mod model;
pub mod observability;
pub mod pinning;
pub mod protocol;
pub mod query;
pub mod service;
pub mod store;
