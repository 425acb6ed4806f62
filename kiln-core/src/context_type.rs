use std::{any::TypeId, cmp::Ordering, fmt, hash::Hash};

use serde::{Serialize, Serializer};

/// Identity of an extension context type.
///
/// Two `ContextType`s are equal exactly when they were created from the same
/// Rust type. Ordering is by type name so that listings are stable.
#[derive(Debug, Clone, Copy)]
pub struct ContextType {
    id: TypeId,
    type_name: &'static str,
}

impl ContextType {
    pub fn of<C: 'static>() -> Self {
        Self {
            id: TypeId::of::<C>(),
            type_name: std::any::type_name::<C>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// The fully qualified Rust type name.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The type name without its module path or generic arguments.
    pub fn name(&self) -> &'static str {
        let base = self.type_name.split('<').next().unwrap_or(self.type_name);
        base.rsplit("::").next().unwrap_or(base)
    }

    pub fn is<C: 'static>(&self) -> bool {
        self.id == TypeId::of::<C>()
    }
}

impl PartialEq for ContextType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ContextType {}

impl Hash for ContextType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for ContextType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ContextType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.type_name
            .cmp(other.type_name)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for ContextType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.name())
    }
}
