#![forbid(unsafe_code)]

//! Live query kernel.
//!
//! Pure, deterministic core: fragments compile to a plan, the snapshot
//! evaluator defines the matching set, and the incremental engine keeps
//! that set current from row-change batches.
//!
//! No storage lives here. Stores plug in through [`view::StoreView`].

/// Version tag bound into canonical hashes. Changing the canonical form
/// requires a new version.
pub const HASH_VERSION: u32 = 1;

pub mod value;
pub mod schema;
pub mod subject;
pub mod fragment;
pub mod error;
pub mod plan;
pub mod view;
pub mod evaluate;
pub mod change;
pub mod diff;
pub mod engine;
pub mod entity;
pub mod hashing;

pub use diff::{ChangeType, EntityChange, SubjectChange};
pub use entity::{encode_subject, Entity};
pub use error::{CompileError, EngineError};
pub use fragment::{has, has_value, not, not_value, Fragment};
pub use plan::{compile, compile_with, CompileOptions, CompiledQuery};
