//! Extension contexts: shared, activatable state used by passes.

use std::{any::Any, fmt, rc::Rc};

use eyre::Result;
use kiln_core::ContextType;

/// A stateful object that passes can require to be active while they run.
///
/// Activation may be expensive (building indexes, snapshotting state), so the
/// engine keeps a context active across consecutive passes that need it.
/// Deactivation is where a context writes its accumulated state back into the
/// build target.
///
/// # Example
///
/// ```ignore
/// #[derive(Default)]
/// struct NameIndex {
///     by_name: HashMap<String, usize>,
/// }
///
/// impl ExtensionContext<Scene> for NameIndex {
///     fn activate(&mut self, scene: &mut Scene) -> Result<()> {
///         self.by_name = scene.objects.iter().enumerate()
///             .map(|(i, o)| (o.name.clone(), i))
///             .collect();
///         Ok(())
///     }
/// }
/// ```
pub trait ExtensionContext<T>: 'static {
    /// Called when the context becomes active.
    ///
    /// # Errors
    ///
    /// An error is fatal for the pass that required the context.
    #[allow(unused_variables)]
    fn activate(&mut self, target: &mut T) -> Result<()> {
        Ok(())
    }

    /// Called when the last holder releases the context.
    #[allow(unused_variables)]
    fn deactivate(&mut self, target: &mut T) -> Result<()> {
        Ok(())
    }
}

/// Object-safe view of an extension context used by the registry.
pub(crate) trait ErasedContext<T> {
    fn activate(&mut self, target: &mut T) -> Result<()>;
    fn deactivate(&mut self, target: &mut T) -> Result<()>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T, C: ExtensionContext<T>> ErasedContext<T> for C {
    fn activate(&mut self, target: &mut T) -> Result<()> {
        ExtensionContext::activate(self, target)
    }

    fn deactivate(&mut self, target: &mut T) -> Result<()> {
        ExtensionContext::deactivate(self, target)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

type Factory<T> = Rc<dyn Fn() -> Box<dyn ErasedContext<T>>>;

/// A context type a pass needs, together with the means to construct it.
pub struct ContextRequirement<T> {
    context_type: ContextType,
    factory: Factory<T>,
}

impl<T: 'static> ContextRequirement<T> {
    /// Require a context constructed with `Default`.
    pub fn of<C>() -> Self
    where
        C: ExtensionContext<T> + Default,
    {
        Self::with_factory(C::default)
    }

    /// Require a context constructed by `factory` on activation.
    pub fn with_factory<C>(factory: impl Fn() -> C + 'static) -> Self
    where
        C: ExtensionContext<T>,
    {
        Self {
            context_type: ContextType::of::<C>(),
            factory: Rc::new(move || Box::new(factory()) as Box<dyn ErasedContext<T>>),
        }
    }
}

impl<T> ContextRequirement<T> {
    pub fn context_type(&self) -> ContextType {
        self.context_type
    }

    pub(crate) fn instantiate(&self) -> Box<dyn ErasedContext<T>> {
        (self.factory)()
    }
}

impl<T> Clone for ContextRequirement<T> {
    fn clone(&self) -> Self {
        Self {
            context_type: self.context_type,
            factory: Rc::clone(&self.factory),
        }
    }
}

impl<T> fmt::Debug for ContextRequirement<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContextRequirement")
            .field(&self.context_type)
            .finish()
    }
}
