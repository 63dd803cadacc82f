#![forbid(unsafe_code)]

//! Live query runtime.
//!
//! Hosts the kernel: an in-memory table store with a change feed, live
//! subscriptions, a binary write log with replay, and drift detection.
//!
//! Query semantics live in `query_kernel`; this crate only feeds it.

pub mod config;
pub mod error;
pub mod store;
pub mod query;
pub mod proto_types;
pub mod proto_bridge;
pub mod write_log;
pub mod replay;
pub mod drift;
pub mod fixture;

pub use config::RuntimeConfig;
pub use error::RuntimeError;
pub use query::{define_query, run_query, run_query_now, LiveQuery};
pub use store::{Hydration, TableStore, TableWrite};

pub use query_kernel::{has, has_value, not, not_value, ChangeType, Entity, EntityChange, Fragment};
