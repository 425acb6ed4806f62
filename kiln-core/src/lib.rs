//! Core value types for the kiln build pipeline.
//!
//! This crate provides the small value types shared by the
//! pipeline engine and its hosts.

mod context_type;
mod duration;
mod name;
mod phase;

pub use context_type::ContextType;
pub use duration::{as_millis, format_millis, serialize_duration_ms, serialize_option_duration_ms};
pub use name::{InvalidName, QualifiedName};
pub use phase::{ParsePhaseError, Phase};
