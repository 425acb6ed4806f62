//! Extension contexts shared by the demo passes.

use std::collections::HashMap;

use eyre::{Result, bail};
use kiln_pipeline::ExtensionContext;
use tracing::debug;

use super::Scene;

/// Collects renames and rewrites parent references when deactivated.
///
/// Passes rename objects directly and record the change here, so parent
/// links are fixed up once per run of renaming passes.
#[derive(Debug, Default)]
pub struct RenameTracker {
    renames: Vec<(String, String)>,
}

impl RenameTracker {
    pub fn record(&mut self, from: &str, to: &str) {
        self.renames.push((from.to_string(), to.to_string()));
    }

    pub fn pending(&self) -> usize {
        self.renames.len()
    }

    /// Follow a chain of renames to the final name.
    fn resolve<'a>(&'a self, mut name: &'a str) -> &'a str {
        for (from, to) in &self.renames {
            if from == name {
                name = to.as_str();
            }
        }
        name
    }
}

impl ExtensionContext<Scene> for RenameTracker {
    fn deactivate(&mut self, scene: &mut Scene) -> Result<()> {
        let mut rewritten = 0;
        for object in &mut scene.objects {
            if let Some(parent) = object.parent.as_deref() {
                let resolved = self.resolve(parent);
                if resolved != parent {
                    let resolved = resolved.to_string();
                    object.parent = Some(resolved);
                    rewritten += 1;
                }
            }
        }
        debug!(renames = self.renames.len(), rewritten, "rewrote parent references");
        Ok(())
    }
}

/// Name → position lookup, built on activation.
#[derive(Debug, Default)]
pub struct NameIndex {
    by_name: HashMap<String, usize>,
}

impl NameIndex {
    pub fn position(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }
}

impl ExtensionContext<Scene> for NameIndex {
    fn activate(&mut self, scene: &mut Scene) -> Result<()> {
        self.by_name.clear();
        for (position, object) in scene.objects.iter().enumerate() {
            if self.by_name.insert(object.name.clone(), position).is_some() {
                bail!("object name '{}' is used more than once", object.name);
            }
        }
        Ok(())
    }
}
