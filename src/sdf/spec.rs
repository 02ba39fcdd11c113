use std::collections::BTreeMap;

use super::{ListOp, Reference, Value};

/// Prim specifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Specifier {
    Def,
    #[default]
    Over,
    Class,
}

impl Specifier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Specifier::Def => "def",
            Specifier::Over => "over",
            Specifier::Class => "class",
        }
    }

    /// `def` and `class` define a prim; `over` only adds opinions.
    pub fn is_defining(&self) -> bool {
        !matches!(self, Specifier::Over)
    }
}

/// Opinions authored for one attribute in one layer.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSpec {
    pub type_name: String,
    pub custom: bool,
    pub default: Option<Value>,
    /// Samples sorted by time, at most one per time.
    pub time_samples: Vec<(f64, Value)>,
}

impl AttributeSpec {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            custom: false,
            default: None,
            time_samples: Vec::new(),
        }
    }

    /// Insert or replace the sample at `time`, keeping samples ordered.
    pub fn set_time_sample(&mut self, time: f64, value: Value) {
        match self.time_samples.binary_search_by(|(t, _)| t.total_cmp(&time)) {
            Ok(idx) => self.time_samples[idx].1 = value,
            Err(idx) => self.time_samples.insert(idx, (time, value)),
        }
    }

    pub fn has_value(&self) -> bool {
        self.default.is_some() || !self.time_samples.is_empty()
    }
}

/// Opinions authored for one prim in one layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrimSpec {
    pub specifier: Specifier,
    pub type_name: Option<String>,
    pub references: ListOp<Reference>,
    pub attributes: BTreeMap<String, AttributeSpec>,
    /// Child prim names in authored order.
    pub children: Vec<String>,
}

impl PrimSpec {
    pub fn new(specifier: Specifier) -> Self {
        Self {
            specifier,
            ..Self::default()
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes.get(name)
    }
}

/// Returns true for valid, optionally namespaced, property names (`xformOp:translate`).
pub fn is_valid_property_name(name: &str) -> bool {
    !name.is_empty() && name.split(':').all(super::path::is_valid_identifier)
}
