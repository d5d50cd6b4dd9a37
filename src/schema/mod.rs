//! Schema model and loader.
//!
//! `model` holds the validated in-memory representation; `loader` is the
//! only way to construct it.

pub mod loader;
pub mod model;

pub use loader::{load_file, load_str, validate, RawMember, RawNode};
pub use model::{MemberDef, NodeDef, NodeIdx, Schema, ValueKind};
