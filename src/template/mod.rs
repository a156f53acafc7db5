//! The normalized resource template record.
//!
//! A `Template` is the in-memory form of a `template` node from the live
//! configuration: the agent triple plus its instance attributes, meta
//! attributes, and operations. `translate` moves it in and out of the
//! document, `merge` reconciles pending changes against a live node.

pub mod merge;
pub mod translate;

pub use merge::{merge_nvpairs, merge_operations, merge_template};
pub use translate::{from_document, to_document};

use crate::error::RecordErrors;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attributes of one operation instance (`interval`, `timeout`, ...).
pub type OpAttributes = BTreeMap<String, String>;

/// Operation name → every instance of that operation, in document order.
pub type Operations = BTreeMap<String, Vec<OpAttributes>>;

/// Name → value pairs for instance or meta attributes.
pub type NvPairs = BTreeMap<String, String>;

pub const DEFAULT_CLASS: &str = "ocf";

/// Which kind of configuration object an id refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Template,
    Primitive,
}

impl RecordKind {
    /// Element name in the configuration document.
    pub fn element_name(&self) -> &'static str {
        match self {
            RecordKind::Template => "template",
            RecordKind::Primitive => "primitive",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub provider: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub ops: Operations,
    #[serde(default)]
    pub params: NvPairs,
    #[serde(default)]
    pub meta: NvPairs,
}

impl Template {
    /// A fresh record for `id` with the default agent class.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            class: DEFAULT_CLASS.to_string(),
            ..Self::default()
        }
    }

    pub fn kind_of_record(&self) -> RecordKind {
        RecordKind::Template
    }

    pub fn is_template(&self) -> bool {
        true
    }

    pub fn is_resource(&self) -> bool {
        false
    }

    /// Field-level validation. An empty result means the record is valid.
    pub fn validate(&self) -> RecordErrors {
        let mut errors = RecordErrors::new();
        if self.id.is_empty() {
            errors.add("id", "Resource ID is required");
        } else if !is_valid_id(&self.id) {
            errors.add("id", "Invalid Resource ID");
        }
        errors
    }

    /// `class:provider:type` with empty parts dropped.
    pub fn agent(&self) -> String {
        [&self.class, &self.provider, &self.kind]
            .into_iter()
            .filter(|part| !part.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(":")
    }
}

/// Ids are non-empty and limited to `[A-Za-z0-9_-]`.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
}
