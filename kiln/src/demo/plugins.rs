//! The demo plugins.
//!
//! Resolved order of the transforming phase interleaves two plugins:
//! `demo.merge.drop-empty-meshes` runs before every `demo.rename` pass, and
//! `demo.merge.batch-groups` sits between the two rename passes so all three
//! share one rename tracker activation.

use eyre::{Result, bail, eyre};
use kiln_core::Phase;
use kiln_pipeline::{ContextPolicy, Pass, PassContext, Pipeline, Plugin, TracingActivityObserver};
use tracing::debug;

use super::{NameIndex, ObjectKind, RenameTracker, Scene};

/// Knobs the `build` command exposes.
#[derive(Debug, Clone, Default)]
pub struct DemoOptions {
    pub policy: ContextPolicy,
    /// Replace this pass's body with one that fails.
    pub fail: Option<String>,
}

/// The demo pipeline.
pub fn pipeline(options: &DemoOptions) -> Pipeline<Scene> {
    Pipeline::new()
        .context_policy(options.policy)
        .plugin(validate_plugin(options))
        .plugin(rename_plugin(options))
        .plugin(merge_plugin(options))
        .activity_observer(TracingActivityObserver)
}

/// Qualified names of every demo pass, in declaration order.
pub fn pass_names() -> Vec<String> {
    pipeline(&DemoOptions::default())
        .registered_plugins()
        .iter()
        .flat_map(|plugin| plugin.passes().iter().map(|pass| pass.name().to_string()))
        .collect()
}

fn pass(
    options: &DemoOptions,
    name: &str,
    phase: Phase,
    body: impl Fn(&mut PassContext<'_, Scene>) -> Result<()> + 'static,
) -> Pass<Scene> {
    if options.fail.as_deref() == Some(name) {
        Pass::new(name, phase, |_| bail!("injected failure"))
    } else {
        Pass::new(name, phase, body)
    }
}

fn validate_plugin(options: &DemoOptions) -> Plugin<Scene> {
    Plugin::new("demo.validate", "Normalize names and check parent links")
        .pass(
            pass(options, "demo.validate.trim-names", Phase::Resolving, trim_names)
                .with_description("Strip surrounding whitespace from names")
                .internal(),
        )
        .pass(
            pass(options, "demo.validate.parents", Phase::Resolving, check_parents)
                .with_description("Every parent reference names an object")
                .after_pass("demo.validate.trim-names")
                .requires::<NameIndex>(),
        )
        .pass(
            pass(options, "demo.validate.final-parents", Phase::Optimizing, check_parents)
                .with_description("Parent references survived the cleanup")
                .after_plugin("demo.merge")
                .requires::<NameIndex>(),
        )
}

fn rename_plugin(options: &DemoOptions) -> Plugin<Scene> {
    Plugin::new("demo.rename", "Namespace and normalize object names")
        .pass(
            pass(options, "demo.rename.prefix-meshes", Phase::Transforming, prefix_meshes)
                .with_description("Prefix meshes with their level of detail")
                .requires::<RenameTracker>()
                .requires::<NameIndex>(),
        )
        .pass(
            pass(options, "demo.rename.lowercase", Phase::Transforming, lowercase)
                .with_description("Lowercase every object name")
                .requires::<RenameTracker>(),
        )
}

fn merge_plugin(options: &DemoOptions) -> Plugin<Scene> {
    Plugin::new("demo.merge", "Batch meshes and drop empty nodes")
        .pass(
            pass(
                options,
                "demo.merge.drop-empty-meshes",
                Phase::Transforming,
                drop_empty_meshes,
            )
            .with_description("Remove meshes without geometry")
            .before_plugin("demo.rename"),
        )
        .pass(
            pass(options, "demo.merge.batch-groups", Phase::Transforming, batch_groups)
                .with_description("Mark groups holding only meshes as batches")
                .after_pass("demo.rename.prefix-meshes")
                .before_pass("demo.rename.lowercase")
                .requires::<RenameTracker>()
                .compatible_with::<NameIndex>(),
        )
        .pass(
            pass(
                options,
                "demo.merge.drop-empty-groups",
                Phase::Optimizing,
                drop_empty_groups,
            )
            .with_description("Remove groups left without children"),
        )
}

fn trim_names(cx: &mut PassContext<'_, Scene>) -> Result<()> {
    let mut trimmed = Vec::new();
    for object in &mut cx.target_mut().objects {
        let name = object.name.trim();
        if name != object.name {
            let name = name.to_string();
            trimmed.push(std::mem::replace(&mut object.name, name));
        }
        if let Some(parent) = &mut object.parent {
            *parent = parent.trim().to_string();
        }
    }
    for name in trimmed {
        cx.record_activity(format!("trimmed '{}'", name));
    }
    Ok(())
}

fn check_parents(cx: &mut PassContext<'_, Scene>) -> Result<()> {
    let index = cx
        .extension::<NameIndex>()
        .ok_or_else(|| eyre!("name index is not active"))?;
    for object in &cx.target().objects {
        if let Some(parent) = &object.parent {
            if !index.contains(parent) {
                bail!("'{}' refers to missing parent '{}'", object.name, parent);
            }
        }
    }
    debug!(objects = index.len(), "parent references verified");
    Ok(())
}

fn prefix_meshes(cx: &mut PassContext<'_, Scene>) -> Result<()> {
    let index = cx
        .extension::<NameIndex>()
        .ok_or_else(|| eyre!("name index is not active"))?;
    let renames: Vec<(usize, String, String)> = cx
        .target()
        .objects
        .iter()
        .filter(|object| object.kind == ObjectKind::Mesh && !object.name.starts_with("lod0."))
        .map(|object| (object.name.clone(), format!("lod0.{}", object.name)))
        .filter(|(_, renamed)| !index.contains(renamed))
        .filter_map(|(name, renamed)| Some((index.position(&name)?, name, renamed)))
        .collect();

    let (scene, tracker) = cx
        .split::<RenameTracker>()
        .ok_or_else(|| eyre!("rename tracker is not active"))?;
    for (position, name, renamed) in &renames {
        scene.objects[*position].name = renamed.clone();
        tracker.record(name, renamed);
    }
    debug!(pending = tracker.pending(), "meshes prefixed");

    for (_, name, renamed) in renames {
        cx.record_activity(format!("renamed '{}' to '{}'", name, renamed));
    }
    Ok(())
}

fn lowercase(cx: &mut PassContext<'_, Scene>) -> Result<()> {
    let (scene, tracker) = cx
        .split::<RenameTracker>()
        .ok_or_else(|| eyre!("rename tracker is not active"))?;
    for object in &mut scene.objects {
        let lowered = object.name.to_lowercase();
        if lowered != object.name {
            tracker.record(&object.name, &lowered);
            object.name = lowered;
        }
    }
    Ok(())
}

fn batch_groups(cx: &mut PassContext<'_, Scene>) -> Result<()> {
    let scene = cx.target();
    let batches: Vec<String> = scene
        .objects
        .iter()
        .filter(|object| object.kind == ObjectKind::Group)
        .filter(|group| {
            let mut children = scene.children(&group.name).peekable();
            children.peek().is_some() && children.all(|child| child.kind == ObjectKind::Mesh)
        })
        .map(|group| group.name.clone())
        .collect();

    let (scene, tracker) = cx
        .split::<RenameTracker>()
        .ok_or_else(|| eyre!("rename tracker is not active"))?;
    for object in &mut scene.objects {
        if batches.contains(&object.name) {
            let batched = format!("{}_batch", object.name);
            tracker.record(&object.name, &batched);
            object.name = batched;
        }
    }
    Ok(())
}

fn drop_empty_meshes(cx: &mut PassContext<'_, Scene>) -> Result<()> {
    let scene = cx.target_mut();
    let before = scene.objects.len();
    scene
        .objects
        .retain(|object| object.kind != ObjectKind::Mesh || object.vertices > 0);
    let dropped = before - scene.objects.len();
    if dropped > 0 {
        cx.record_activity(format!("dropped {} empty mesh(es)", dropped));
    }
    Ok(())
}

fn drop_empty_groups(cx: &mut PassContext<'_, Scene>) -> Result<()> {
    let scene = cx.target_mut();
    let empty: Vec<String> = scene
        .objects
        .iter()
        .filter(|object| object.kind == ObjectKind::Group && object.parent.is_some())
        .filter(|group| scene.children(&group.name).next().is_none())
        .map(|group| group.name.clone())
        .collect();
    scene.objects.retain(|object| !empty.contains(&object.name));
    for name in empty {
        cx.record_activity(format!("dropped empty group '{}'", name));
    }
    Ok(())
}
