//! Core operations.
//!
//! This module contains the business logic for kiln commands,
//! separated from CLI argument parsing and output rendering.

pub mod build;
pub mod check;
pub mod plan;

pub use build::build;
pub use check::check;
pub use plan::plan;
