//! guestbook/crates/gb-core/src/lib.rs
//!
//! The central domain logic and interface definitions for the guestbook:
//! submission, rate limiting, operator notification and moderation.

pub mod error;
pub mod models;
pub mod moderation;
pub mod notify;
pub mod rate_limit;
pub mod sanitize;
pub mod submission;
pub mod traits;
pub mod visits;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use traits::*;
