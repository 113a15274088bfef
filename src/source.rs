//! Source References
//!
//! Points back at the document location that declared an object, a rule, or
//! an ontology descriptor. Used in every diagnostic.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A location inside a repository of source documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    /// Resource identifier within the repository.
    pub location: String,
    /// Repository category (`git`, `intranet`, ...).
    pub repository: String,
    /// Version of the resource, when the repository tracks one.
    #[serde(default)]
    pub version: Option<String>,
    /// Anchor inside the resource.
    #[serde(default)]
    pub anchor: Option<String>,
}

impl SourceRef {
    pub fn new(location: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            repository: repository.into(),
            version: None,
            anchor: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_anchor(mut self, anchor: impl Into<String>) -> Self {
        self.anchor = Some(anchor.into());
        self
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.location)?;
        if let Some(v) = &self.version {
            write!(f, "@{}", v)?;
        }
        if let Some(a) = &self.anchor {
            write!(f, "#{}", a)?;
        }
        Ok(())
    }
}

/// Joins two source lists into a new list.
pub fn join_sources(first: &[SourceRef], second: &[SourceRef]) -> Vec<SourceRef> {
    let mut ret = Vec::with_capacity(first.len() + second.len());
    ret.extend_from_slice(first);
    ret.extend_from_slice(second);
    ret
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_version_and_anchor() {
        let src = SourceRef::new("docs/a.md", "git").with_version("abc123").with_anchor("L10");
        assert_eq!(src.to_string(), "git:docs/a.md@abc123#L10");
    }

    #[test]
    fn test_join_sources_keeps_order() {
        let a = vec![SourceRef::new("a", "git")];
        let b = vec![SourceRef::new("b", "git"), SourceRef::new("c", "git")];
        let joined = join_sources(&a, &b);
        let locs: Vec<_> = joined.iter().map(|s| s.location.as_str()).collect();
        assert_eq!(locs, vec!["a", "b", "c"]);
    }
}
