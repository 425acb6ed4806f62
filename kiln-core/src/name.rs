use std::{borrow::Borrow, fmt, str::FromStr};

use serde::{Serialize, Serializer};

/// A globally unique, dotted identifier for a plugin or pass
/// (e.g. `kiln.scene.strip-editor-only`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QualifiedName(String);

/// Error returned for a malformed qualified name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidName {
    pub name: String,
    pub reason: &'static str,
}

impl fmt::Display for InvalidName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid qualified name '{}': {}", self.name, self.reason)
    }
}

impl std::error::Error for InvalidName {}

impl QualifiedName {
    /// Create a qualified name, validating its shape.
    ///
    /// Names are non-empty, contain no whitespace, and neither start nor end
    /// with a dot or contain empty segments.
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidName> {
        let name = name.into();
        let reason = if name.is_empty() {
            Some("name is empty")
        } else if name.chars().any(char::is_whitespace) {
            Some("name contains whitespace")
        } else if name.split('.').any(str::is_empty) {
            Some("name has an empty segment")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(InvalidName { name, reason }),
            None => Ok(Self(name)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last dotted segment, used as a short display label.
    pub fn short_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl FromStr for QualifiedName {
    type Err = InvalidName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for QualifiedName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for QualifiedName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for QualifiedName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for QualifiedName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Serialize for QualifiedName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(QualifiedName::new("a").is_ok());
        assert!(QualifiedName::new("kiln.scene.strip-editor-only").is_ok());
    }

    #[test]
    fn test_invalid_names() {
        assert_eq!(QualifiedName::new("").unwrap_err().reason, "name is empty");
        assert_eq!(
            QualifiedName::new("has space").unwrap_err().reason,
            "name contains whitespace"
        );
        assert!(QualifiedName::new(".leading").is_err());
        assert!(QualifiedName::new("trailing.").is_err());
        assert!(QualifiedName::new("double..dot").is_err());
    }

    #[test]
    fn test_short_name() {
        let name = QualifiedName::new("kiln.scene.merge").unwrap();
        assert_eq!(name.short_name(), "merge");
        assert_eq!(QualifiedName::new("solo").unwrap().short_name(), "solo");
    }

    #[test]
    fn test_compares_with_str() {
        let name: QualifiedName = "a.b".parse().unwrap();
        assert_eq!(name, "a.b");
        assert_eq!(name.as_str(), "a.b");
    }
}
