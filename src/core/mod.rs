//! Core abstractions for glas-offline.
//!
//! Request-scoped tenant context threaded through every queue operation.

mod context;

pub use context::{OrgContext, Role};
