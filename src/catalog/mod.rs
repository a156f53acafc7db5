//! Resource-agent discovery.
//!
//! `TypeCatalog` enumerates the agent classes, providers, and types installed
//! on the host; `MetadataResolver` describes one agent's parameters and
//! actions alongside the builtin meta-attributes every resource accepts. Both
//! shell out through a `ToolRunner`, cache results for the configured TTL, and
//! degrade to empty or baseline answers when the tools misbehave. Degradations
//! are reported in `Resolved::degraded` instead of being raised.

pub mod builtin;
pub mod index;
pub mod metadata;

pub use builtin::{MetaAttribute, MetaType, builtin_meta_attributes};
pub use index::{AgentCatalog, CATALOG_CACHE_KEY, ClassLine, TypeCatalog, parse_class_line};
pub use metadata::{MetadataDescriptor, MetadataResolver, ParameterDescriptor, parse_metadata};

use crate::error::TemplateError;

/// A lookup result plus whatever went wrong while producing it.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolved<T> {
    pub value: T,
    pub degraded: Vec<TemplateError>,
}

impl<T> Resolved<T> {
    pub fn clean(value: T) -> Self {
        Self {
            value,
            degraded: Vec::new(),
        }
    }

    pub fn degraded(value: T, reasons: Vec<TemplateError>) -> Self {
        Self {
            value,
            degraded: reasons,
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }

    pub fn into_value(self) -> T {
        self.value
    }
}
