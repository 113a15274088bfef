//! Document Objects
//!
//! The already-parsed objects handed to the engine. A descriptor's values are
//! written as a mixed list of strings and numbers.

use serde::{Deserialize, Serialize};

use crate::model::Values;
use crate::source::SourceRef;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DescriptorValue {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentDescriptor {
    pub key: String,
    #[serde(default)]
    pub values: Vec<DescriptorValue>,
}

impl DocumentDescriptor {
    pub fn text<S: Into<String>>(key: impl Into<String>, values: impl IntoIterator<Item = S>) -> Self {
        Self {
            key: key.into(),
            values: values.into_iter().map(|v| DescriptorValue::Text(v.into())).collect(),
        }
    }

    pub fn numbers(key: impl Into<String>, values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            key: key.into(),
            values: values.into_iter().map(DescriptorValue::Number).collect(),
        }
    }

    /// Splits the mixed list into text and numbers, keeping order in each.
    pub fn split(&self) -> Values {
        let mut ret = Values::new();
        for v in &self.values {
            match v {
                DescriptorValue::Number(n) => ret.numbers.push(*n),
                DescriptorValue::Text(t) => ret.text.push(t.clone()),
            }
        }
        ret
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentObject {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub sources: Vec<SourceRef>,
    #[serde(default)]
    pub descriptors: Vec<DocumentDescriptor>,
}

impl DocumentObject {
    pub fn new(sources: Vec<SourceRef>) -> Self {
        Self {
            id: None,
            sources,
            descriptors: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_descriptor(mut self, descriptor: DocumentDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Label used in diagnostics.
    pub fn label(&self) -> String {
        match (&self.id, self.sources.first()) {
            (Some(id), _) => id.clone(),
            (None, Some(src)) => src.to_string(),
            (None, None) => "<anonymous>".to_string(),
        }
    }
}
