//! Plugin declarations.

use std::fmt;

use crate::Pass;

/// An independently authored contributor of passes.
///
/// Plugins know nothing about each other beyond the names their passes use in
/// ordering constraints. Declaration order of passes is the tie-break used
/// when constraints leave their relative order open.
///
/// # Example
///
/// ```ignore
/// let plugin = Plugin::new("demo.rename", "Prefix object names")
///     .pass(Pass::new("demo.rename.apply", Phase::Transforming, apply_prefix))
///     .pass(Pass::new("demo.rename.verify", Phase::Optimizing, verify));
/// ```
pub struct Plugin<T> {
    name: String,
    description: String,
    passes: Vec<Pass<T>>,
}

impl<T> Plugin<T> {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            passes: Vec::new(),
        }
    }

    /// Add a pass to this plugin.
    pub fn pass(mut self, pass: Pass<T>) -> Self {
        self.passes.push(pass);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn passes(&self) -> &[Pass<T>] {
        &self.passes
    }
}

impl<T> fmt::Debug for Plugin<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("passes", &self.passes)
            .finish()
    }
}
