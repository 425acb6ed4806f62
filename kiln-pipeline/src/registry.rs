//! Reference-counted registry of active extension contexts.

use std::time::{Duration, Instant};

use indexmap::IndexMap;
use kiln_core::{ContextType, as_millis};
use tracing::{debug, warn};

use crate::{
    ContextError,
    context::{ContextRequirement, ErasedContext, ExtensionContext},
    guard,
};

/// Proof that a context was acquired; hand it back to [`ContextRegistry::release`].
#[derive(Debug, PartialEq, Eq)]
#[must_use = "an acquired context stays active until its handle is released"]
pub struct ContextHandle {
    context_type: ContextType,
}

impl ContextHandle {
    pub fn context_type(&self) -> ContextType {
        self.context_type
    }
}

/// Result of [`ContextRegistry::require`].
#[derive(Debug)]
pub struct Acquired {
    pub handle: ContextHandle,
    /// Time spent activating, or `None` if the context was already active.
    pub activation: Option<Duration>,
}

struct ActiveContext<T> {
    instance: Box<dyn ErasedContext<T>>,
    refs: usize,
}

/// Tracks which extension contexts are active and how many holders each has.
///
/// The first `require` of a type constructs and activates it; later ones only
/// bump its reference count. The last `release` deactivates and drops it.
/// Iteration order is activation order.
pub struct ContextRegistry<T> {
    active: IndexMap<ContextType, ActiveContext<T>>,
    catch_panics: bool,
}

impl<T> ContextRegistry<T> {
    pub fn new() -> Self {
        Self {
            active: IndexMap::new(),
            catch_panics: true,
        }
    }

    /// Whether panics in activate/deactivate hooks are turned into errors.
    pub fn catch_panics(mut self, catch_panics: bool) -> Self {
        self.catch_panics = catch_panics;
        self
    }

    /// Acquire a context, activating it if it is not active yet.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Activation`] if the activate hook fails; the
    /// context is then left inactive.
    pub fn require(
        &mut self,
        requirement: &ContextRequirement<T>,
        target: &mut T,
    ) -> Result<Acquired, ContextError> {
        let context_type = requirement.context_type();

        if let Some(entry) = self.active.get_mut(&context_type) {
            entry.refs += 1;
            return Ok(Acquired {
                handle: ContextHandle { context_type },
                activation: None,
            });
        }

        let mut instance = requirement.instantiate();
        let started = Instant::now();
        guard::invoke(self.catch_panics, || instance.activate(target)).map_err(|source| {
            ContextError::Activation {
                context: context_type,
                source: source.into(),
            }
        })?;
        let elapsed = started.elapsed();
        debug!(context = %context_type, elapsed_ms = as_millis(elapsed), "activated extension context");

        self.active
            .insert(context_type, ActiveContext { instance, refs: 1 });

        Ok(Acquired {
            handle: ContextHandle { context_type },
            activation: Some(elapsed),
        })
    }

    /// Release a handle, deactivating the context when no holders remain.
    ///
    /// Returns the deactivation time when this release deactivated it.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Deactivation`] if the deactivate hook fails.
    /// The context is removed from the registry either way.
    pub fn release(
        &mut self,
        handle: ContextHandle,
        target: &mut T,
    ) -> Result<Option<Duration>, ContextError> {
        let context_type = handle.context_type;

        match self.active.get_mut(&context_type) {
            None => return Err(ContextError::NotActive { context: context_type }),
            Some(entry) if entry.refs > 1 => {
                entry.refs -= 1;
                return Ok(None);
            }
            Some(_) => {}
        }

        match self.active.shift_remove(&context_type) {
            Some(entry) => self.deactivate(context_type, entry, target).map(Some),
            None => Err(ContextError::NotActive { context: context_type }),
        }
    }

    /// Deactivate every active context in reverse activation order,
    /// regardless of outstanding handles.
    pub fn release_all(&mut self, target: &mut T) -> Vec<(ContextType, Result<Duration, ContextError>)> {
        let mut results = Vec::with_capacity(self.active.len());
        while let Some((context_type, entry)) = self.active.pop() {
            results.push((context_type, self.deactivate(context_type, entry, target)));
        }
        results
    }

    fn deactivate(
        &self,
        context_type: ContextType,
        mut entry: ActiveContext<T>,
        target: &mut T,
    ) -> Result<Duration, ContextError> {
        let started = Instant::now();
        guard::invoke(self.catch_panics, || entry.instance.deactivate(target)).map_err(
            |source| ContextError::Deactivation {
                context: context_type,
                source: source.into(),
            },
        )?;
        let elapsed = started.elapsed();
        debug!(context = %context_type, elapsed_ms = as_millis(elapsed), "deactivated extension context");
        Ok(elapsed)
    }

    pub fn is_active(&self, context_type: ContextType) -> bool {
        self.active.contains_key(&context_type)
    }

    /// Number of outstanding handles for a context (zero when inactive).
    pub fn ref_count(&self, context_type: ContextType) -> usize {
        self.active.get(&context_type).map_or(0, |entry| entry.refs)
    }

    /// Active context types in activation order.
    pub fn active(&self) -> impl Iterator<Item = ContextType> + '_ {
        self.active.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Borrow an active context by type.
    pub fn get<C: 'static>(&self) -> Option<&C> {
        self.active
            .get(&ContextType::of::<C>())
            .and_then(|entry| entry.instance.as_any().downcast_ref::<C>())
    }

    /// Mutably borrow an active context by type.
    pub fn get_mut<C: 'static>(&mut self) -> Option<&mut C> {
        self.active
            .get_mut(&ContextType::of::<C>())
            .and_then(|entry| entry.instance.as_any_mut().downcast_mut::<C>())
    }
}

impl<T: 'static> ContextRegistry<T> {
    /// Acquire a `Default`-constructed context by type.
    pub fn activate<C>(&mut self, target: &mut T) -> Result<ContextHandle, ContextError>
    where
        C: ExtensionContext<T> + Default,
    {
        self.require(&ContextRequirement::of::<C>(), target)
            .map(|acquired| acquired.handle)
    }
}

impl<T> Default for ContextRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for ContextRegistry<T> {
    fn drop(&mut self) {
        if !self.active.is_empty() {
            let names: Vec<&str> = self.active.keys().map(ContextType::name).collect();
            warn!(contexts = ?names, "extension contexts dropped without deactivation");
        }
    }
}
