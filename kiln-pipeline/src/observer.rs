//! Optional attribution of incidental mutations to the running pass.
//!
//! Scheduling and the ledger never depend on an observer being installed.

use std::{cell::RefCell, fmt, rc::Rc};

use kiln_core::QualifiedName;
use serde::Serialize;
use tracing::info;

/// A mutation reported by a pass body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Activity {
    pub pass: QualifiedName,
    pub plugin: QualifiedName,
    pub description: String,
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} by {}", self.description, self.pass)
    }
}

/// Receives pass boundaries and reported activities during a build.
pub trait ActivityObserver {
    /// A pass is about to run and is now the innermost pass.
    #[allow(unused_variables)]
    fn pass_started(&self, pass: &QualifiedName, plugin: &QualifiedName) {}

    /// The innermost pass finished, successfully or not.
    #[allow(unused_variables)]
    fn pass_finished(&self, pass: &QualifiedName, plugin: &QualifiedName) {}

    fn activity(&self, activity: &Activity);
}

impl<O: ActivityObserver + ?Sized> ActivityObserver for Rc<O> {
    fn pass_started(&self, pass: &QualifiedName, plugin: &QualifiedName) {
        (**self).pass_started(pass, plugin)
    }

    fn pass_finished(&self, pass: &QualifiedName, plugin: &QualifiedName) {
        (**self).pass_finished(pass, plugin)
    }

    fn activity(&self, activity: &Activity) {
        (**self).activity(activity)
    }
}

/// Logs every activity through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingActivityObserver;

impl ActivityObserver for TracingActivityObserver {
    fn activity(&self, activity: &Activity) {
        info!(pass = %activity.pass, plugin = %activity.plugin, "{}", activity);
    }
}

/// Collects activities in memory and tracks the innermost pass.
#[derive(Debug, Default)]
pub struct ActivityLog {
    entries: RefCell<Vec<Activity>>,
    current: RefCell<Option<QualifiedName>>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Activity> {
        self.entries.borrow().clone()
    }

    /// The pass currently running, if any.
    pub fn current_pass(&self) -> Option<QualifiedName> {
        self.current.borrow().clone()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

impl ActivityObserver for ActivityLog {
    fn pass_started(&self, pass: &QualifiedName, _plugin: &QualifiedName) {
        *self.current.borrow_mut() = Some(pass.clone());
    }

    fn pass_finished(&self, _pass: &QualifiedName, _plugin: &QualifiedName) {
        *self.current.borrow_mut() = None;
    }

    fn activity(&self, activity: &Activity) {
        self.entries.borrow_mut().push(activity.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_display() {
        let activity = Activity {
            pass: QualifiedName::new("demo.rename.apply").unwrap(),
            plugin: QualifiedName::new("demo.rename").unwrap(),
            description: "renamed 'cube' to 'lod0.cube'".to_string(),
        };
        assert_eq!(
            activity.to_string(),
            "renamed 'cube' to 'lod0.cube' by demo.rename.apply"
        );
    }

    #[test]
    fn test_log_tracks_innermost_pass() {
        let log = ActivityLog::new();
        let pass = QualifiedName::new("p.x").unwrap();
        let plugin = QualifiedName::new("p").unwrap();

        log.pass_started(&pass, &plugin);
        assert_eq!(log.current_pass(), Some(pass.clone()));
        log.pass_finished(&pass, &plugin);
        assert_eq!(log.current_pass(), None);
    }
}
