//! Built-in demo build: a small scene graph cleaned up by three plugins.

mod contexts;
mod plugins;
mod scene;

pub use contexts::{NameIndex, RenameTracker};
pub use plugins::{DemoOptions, pass_names, pipeline};
pub use scene::{ObjectKind, Scene, SceneObject};
