//! Descriptor Value Storage
//!
//! One closed enum covers the six storage variants a key can have. The
//! variant is picked from the ontology descriptor and decides how inserted
//! values are normalized and whether duplicates are kept.

use serde::{Deserialize, Serialize};

use crate::ontology::Descriptor;

/// A plain bag of literal values, as written in documents and rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Values {
    #[serde(default)]
    pub text: Vec<String>,
    #[serde(default)]
    pub numbers: Vec<f64>,
}

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        Self {
            text: values.into_iter().map(Into::into).collect(),
            numbers: Vec::new(),
        }
    }

    pub fn numbers(values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            text: Vec::new(),
            numbers: values.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.text.len() + self.numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.numbers.is_empty()
    }
}

fn fold(value: &str) -> String {
    value.to_lowercase()
}

/// Mutable values for one key.
///
/// Numeric variants ignore text input and text variants ignore numeric input.
/// Folded variants keep their values lower-cased. Distinct variants keep the
/// first insertion of each value, in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub enum DescriptorValues {
    Numbers(Vec<f64>),
    DistinctNumbers(Vec<f64>),
    Text(Vec<String>),
    FoldedText(Vec<String>),
    DistinctText(Vec<String>),
    DistinctFoldedText(Vec<String>),
}

impl DescriptorValues {
    /// Empty storage matching the descriptor's type and flags.
    pub fn for_descriptor(descriptor: &Descriptor) -> Self {
        Self::empty(
            descriptor.is_numeric(),
            descriptor.distinct,
            descriptor.case_sensitive(),
        )
    }

    pub fn empty(numeric: bool, distinct: bool, case_sensitive: bool) -> Self {
        match (numeric, distinct, case_sensitive) {
            (true, false, _) => DescriptorValues::Numbers(Vec::new()),
            (true, true, _) => DescriptorValues::DistinctNumbers(Vec::new()),
            (false, false, true) => DescriptorValues::Text(Vec::new()),
            (false, false, false) => DescriptorValues::FoldedText(Vec::new()),
            (false, true, true) => DescriptorValues::DistinctText(Vec::new()),
            (false, true, false) => DescriptorValues::DistinctFoldedText(Vec::new()),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DescriptorValues::Numbers(_) | DescriptorValues::DistinctNumbers(_)
        )
    }

    pub fn is_distinct(&self) -> bool {
        matches!(
            self,
            DescriptorValues::DistinctNumbers(_)
                | DescriptorValues::DistinctText(_)
                | DescriptorValues::DistinctFoldedText(_)
        )
    }

    pub fn is_folded(&self) -> bool {
        matches!(
            self,
            DescriptorValues::FoldedText(_) | DescriptorValues::DistinctFoldedText(_)
        )
    }

    /// Normalizes a text value the way this store keeps it.
    pub fn normalize(&self, value: &str) -> String {
        if self.is_folded() {
            fold(value)
        } else {
            value.to_string()
        }
    }

    pub fn add_numbers(&mut self, values: &[f64]) {
        match self {
            DescriptorValues::Numbers(list) => list.extend_from_slice(values),
            DescriptorValues::DistinctNumbers(list) => {
                for v in values {
                    if !list.contains(v) {
                        list.push(*v);
                    }
                }
            }
            _ => {}
        }
    }

    pub fn add_text(&mut self, values: &[String]) {
        match self {
            DescriptorValues::Text(list) => list.extend_from_slice(values),
            DescriptorValues::FoldedText(list) => list.extend(values.iter().map(|v| fold(v))),
            DescriptorValues::DistinctText(list) => {
                for v in values {
                    if !list.contains(v) {
                        list.push(v.clone());
                    }
                }
            }
            DescriptorValues::DistinctFoldedText(list) => {
                for v in values {
                    let v = fold(v);
                    if !list.contains(&v) {
                        list.push(v);
                    }
                }
            }
            _ => {}
        }
    }

    /// Adds the part of `values` matching this store's type.
    pub fn add_values(&mut self, values: &Values) {
        if self.is_numeric() {
            self.add_numbers(&values.numbers);
        } else {
            self.add_text(&values.text);
        }
    }

    /// Adds only the values not already present.
    pub fn add_missing(&mut self, values: &Values) {
        if self.is_numeric() {
            let missing: Vec<f64> = values
                .numbers
                .iter()
                .copied()
                .filter(|v| !self.has_number(*v))
                .collect();
            self.add_numbers(&missing);
        } else {
            let mut missing: Vec<String> = Vec::new();
            for v in &values.text {
                let n = self.normalize(v);
                if !self.has_text(&n) && !missing.contains(&n) {
                    missing.push(n);
                }
            }
            self.add_text(&missing);
        }
    }

    /// Re-inserts every value of `other` through this store's own rules.
    pub fn add_from(&mut self, other: &DescriptorValues) {
        if self.is_numeric() {
            self.add_numbers(other.numbers());
        } else {
            self.add_text(other.texts());
        }
    }

    /// Removes the first occurrence of each value.
    pub fn remove_once(&mut self, values: &Values) {
        if self.is_numeric() {
            if let Some(list) = self.numbers_mut() {
                for v in &values.numbers {
                    if let Some(pos) = list.iter().position(|x| x == v) {
                        list.remove(pos);
                    }
                }
            }
            return;
        }
        let targets: Vec<String> = values.text.iter().map(|v| self.normalize(v)).collect();
        if let Some(list) = self.texts_mut() {
            for v in &targets {
                if let Some(pos) = list.iter().position(|x| x == v) {
                    list.remove(pos);
                }
            }
        }
    }

    /// Removes every occurrence of each value.
    pub fn remove_all(&mut self, values: &Values) {
        if self.is_numeric() {
            if let Some(list) = self.numbers_mut() {
                list.retain(|x| !values.numbers.contains(x));
            }
            return;
        }
        let targets: Vec<String> = values.text.iter().map(|v| self.normalize(v)).collect();
        if let Some(list) = self.texts_mut() {
            list.retain(|x| !targets.contains(x));
        }
    }

    pub fn clear(&mut self) {
        match self {
            DescriptorValues::Numbers(list) | DescriptorValues::DistinctNumbers(list) => list.clear(),
            DescriptorValues::Text(list)
            | DescriptorValues::FoldedText(list)
            | DescriptorValues::DistinctText(list)
            | DescriptorValues::DistinctFoldedText(list) => list.clear(),
        }
    }

    /// Numeric values; empty for text stores.
    pub fn numbers(&self) -> &[f64] {
        match self {
            DescriptorValues::Numbers(list) | DescriptorValues::DistinctNumbers(list) => list,
            _ => &[],
        }
    }

    /// Text values; empty for numeric stores.
    pub fn texts(&self) -> &[String] {
        match self {
            DescriptorValues::Text(list)
            | DescriptorValues::FoldedText(list)
            | DescriptorValues::DistinctText(list)
            | DescriptorValues::DistinctFoldedText(list) => list,
            _ => &[],
        }
    }

    fn numbers_mut(&mut self) -> Option<&mut Vec<f64>> {
        match self {
            DescriptorValues::Numbers(list) | DescriptorValues::DistinctNumbers(list) => Some(list),
            _ => None,
        }
    }

    fn texts_mut(&mut self) -> Option<&mut Vec<String>> {
        match self {
            DescriptorValues::Text(list)
            | DescriptorValues::FoldedText(list)
            | DescriptorValues::DistinctText(list)
            | DescriptorValues::DistinctFoldedText(list) => Some(list),
            _ => None,
        }
    }

    pub fn list(&self) -> Values {
        Values {
            text: self.texts().to_vec(),
            numbers: self.numbers().to_vec(),
        }
    }

    pub fn count(&self) -> usize {
        self.numbers().len() + self.texts().len()
    }

    pub fn has_number(&self, value: f64) -> bool {
        self.numbers().contains(&value)
    }

    /// Membership test, folding the needle for case-insensitive stores.
    pub fn has_text(&self, value: &str) -> bool {
        let needle = self.normalize(value);
        self.texts().iter().any(|v| *v == needle)
    }

    pub fn seal(self) -> SealedValues {
        SealedValues { inner: self }
    }
}

/// Read-only values attached to a sealed object.
#[derive(Debug, Clone, PartialEq)]
pub struct SealedValues {
    inner: DescriptorValues,
}

impl SealedValues {
    pub fn numbers(&self) -> &[f64] {
        self.inner.numbers()
    }

    pub fn texts(&self) -> &[String] {
        self.inner.texts()
    }

    pub fn list(&self) -> Values {
        self.inner.list()
    }

    pub fn count(&self) -> usize {
        self.inner.count()
    }

    pub fn has_number(&self, value: f64) -> bool {
        self.inner.has_number(value)
    }

    pub fn has_text(&self, value: &str) -> bool {
        self.inner.has_text(value)
    }

    pub fn is_numeric(&self) -> bool {
        self.inner.is_numeric()
    }

    pub fn is_distinct(&self) -> bool {
        self.inner.is_distinct()
    }

    pub fn is_folded(&self) -> bool {
        self.inner.is_folded()
    }

    pub fn normalize(&self, value: &str) -> String {
        self.inner.normalize(value)
    }

    /// Mutable copy of the stored values.
    pub fn to_builder(&self) -> DescriptorValues {
        self.inner.clone()
    }

    pub fn as_values(&self) -> &DescriptorValues {
        &self.inner
    }
}
