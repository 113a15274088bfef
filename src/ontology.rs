//! Ontology Descriptors
//!
//! The allowed attribute keys, their value types and their bounds. Every
//! other component looks descriptors up by key here.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::problem::ProblemReporter;
use crate::source::SourceRef;

/// A per-value constraint on free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextConstraint {
    Pattern {
        pattern: String,
        #[serde(default)]
        sources: Vec<SourceRef>,
    },
    /// Named formats are declared by ontologies but not checked.
    Format {
        format: String,
        #[serde(default)]
        sources: Vec<SourceRef>,
    },
}

fn default_min() -> f64 {
    f64::MIN
}

fn default_max() -> f64 {
    f64::MAX
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DescriptorKind {
    /// Text restricted to a fixed set. Always case-sensitive.
    Enum {
        #[serde(rename = "enum")]
        allowed: Vec<String>,
    },
    Free {
        #[serde(default)]
        case_sensitive: bool,
        #[serde(default)]
        max_length: Option<usize>,
        #[serde(default)]
        constraints: Vec<TextConstraint>,
    },
    #[serde(rename = "number")]
    Numeric {
        #[serde(default = "default_min")]
        minimum: f64,
        #[serde(default = "default_max")]
        maximum: f64,
    },
}

impl DescriptorKind {
    pub fn name(&self) -> &'static str {
        match self {
            DescriptorKind::Enum { .. } => "enum",
            DescriptorKind::Free { .. } => "free",
            DescriptorKind::Numeric { .. } => "numeric",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    pub key: String,
    #[serde(flatten)]
    pub kind: DescriptorKind,
    #[serde(default)]
    pub distinct: bool,
    #[serde(default)]
    pub max_count: Option<usize>,
    #[serde(default)]
    pub sources: Vec<SourceRef>,
}

impl Descriptor {
    pub fn new(key: impl Into<String>, kind: DescriptorKind) -> Self {
        Self {
            key: key.into(),
            kind,
            distinct: false,
            max_count: None,
            sources: Vec::new(),
        }
    }

    pub fn numeric(key: impl Into<String>, minimum: f64, maximum: f64) -> Self {
        Self::new(key, DescriptorKind::Numeric { minimum, maximum })
    }

    /// Case-sensitive free text without limits.
    pub fn free(key: impl Into<String>) -> Self {
        Self::new(
            key,
            DescriptorKind::Free {
                case_sensitive: true,
                max_length: None,
                constraints: Vec::new(),
            },
        )
    }

    pub fn enumeration<S: Into<String>>(key: impl Into<String>, allowed: impl IntoIterator<Item = S>) -> Self {
        Self::new(
            key,
            DescriptorKind::Enum {
                allowed: allowed.into_iter().map(Into::into).collect(),
            },
        )
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Makes free text case-insensitive. No effect on other kinds.
    pub fn case_insensitive(mut self) -> Self {
        if let DescriptorKind::Free { case_sensitive, .. } = &mut self.kind {
            *case_sensitive = false;
        }
        self
    }

    pub fn with_max_count(mut self, max: usize) -> Self {
        self.max_count = Some(max);
        self
    }

    pub fn with_max_length(mut self, max: usize) -> Self {
        if let DescriptorKind::Free { max_length, .. } = &mut self.kind {
            *max_length = Some(max);
        }
        self
    }

    pub fn with_constraint(mut self, constraint: TextConstraint) -> Self {
        if let DescriptorKind::Free { constraints, .. } = &mut self.kind {
            constraints.push(constraint);
        }
        self
    }

    pub fn with_sources(mut self, sources: Vec<SourceRef>) -> Self {
        self.sources = sources;
        self
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.kind, DescriptorKind::Numeric { .. })
    }

    pub fn is_text(&self) -> bool {
        !self.is_numeric()
    }

    /// Enum and numeric values compare exactly.
    pub fn case_sensitive(&self) -> bool {
        match &self.kind {
            DescriptorKind::Free { case_sensitive, .. } => *case_sensitive,
            _ => true,
        }
    }

    /// Normalizes a text value the way this descriptor stores it.
    pub fn fold(&self, value: &str) -> String {
        if self.case_sensitive() {
            value.to_string()
        } else {
            value.to_lowercase()
        }
    }
}

/// Deserialized form of an ontology file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OntologyDocument {
    #[serde(default)]
    pub descriptors: Vec<Descriptor>,
}

/// All descriptors, indexed by key.
#[derive(Debug, Clone, Default)]
pub struct Ontology {
    descriptors: HashMap<String, Descriptor>,
}

impl Ontology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the index, keeping the first definition of a duplicated key.
    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = Descriptor>,
        problems: &mut impl ProblemReporter,
    ) -> Self {
        let mut ret = Self::new();
        for d in descriptors {
            if ret.descriptors.contains_key(&d.key) {
                problems.add_warning(
                    d.sources.clone(),
                    format!("{}: duplicate key ({})", d.kind.name(), d.key),
                );
                continue;
            }
            ret.descriptors.insert(d.key.clone(), d);
        }
        ret
    }

    pub fn from_document(doc: OntologyDocument, problems: &mut impl ProblemReporter) -> Self {
        Self::from_descriptors(doc.descriptors, problems)
    }

    pub fn with_descriptor(mut self, descriptor: Descriptor) -> Self {
        self.insert(descriptor);
        self
    }

    /// Inserts or replaces a descriptor.
    pub fn insert(&mut self, descriptor: Descriptor) -> Option<Descriptor> {
        self.descriptors.insert(descriptor.key.clone(), descriptor)
    }

    pub fn get(&self, key: &str) -> Option<&Descriptor> {
        self.descriptors.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.descriptors.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.descriptors.values()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
