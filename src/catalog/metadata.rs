//! Per-agent parameter and action descriptors.
//!
//! `crm_resource --show-metadata` prints the agent's resource-agent XML. The
//! resolver turns that into a `MetadataDescriptor` and always attaches the
//! builtin meta-attribute catalog. Any failure along the way (tool missing,
//! timeout, non-zero exit, empty or malformed XML) yields the baseline
//! descriptor instead, with the reason recorded in `Resolved::degraded`.

use crate::cache::TtlCache;
use crate::catalog::Resolved;
use crate::catalog::builtin::{MetaAttribute, builtin_meta_attributes};
use crate::connectors::{CrmCommands, ToolRunner, agent_address};
use crate::document::Element;
use crate::error::TemplateError;
use crate::template::{OpAttributes, Operations};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// Interval given to `monitor` actions that do not declare one.
pub const DEFAULT_MONITOR_INTERVAL: &str = "20";

const ACTION_SKIPPED_ATTRS: [&str; 2] = ["name", "depth"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    pub shortdesc: String,
    pub longdesc: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub default: Option<String>,
    pub required: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDescriptor {
    pub shortdesc: String,
    pub longdesc: String,
    pub parameters: BTreeMap<String, ParameterDescriptor>,
    pub ops: Operations,
    pub meta: BTreeMap<String, MetaAttribute>,
}

impl MetadataDescriptor {
    /// Empty descriptions, parameters, and ops plus the builtin meta catalog.
    pub fn baseline() -> Self {
        Self {
            shortdesc: String::new(),
            longdesc: String::new(),
            parameters: BTreeMap::new(),
            ops: Operations::new(),
            meta: builtin_meta_attributes(),
        }
    }
}

/// Parses resource-agent metadata XML on top of the baseline descriptor.
pub fn parse_metadata(xml: &str) -> Result<MetadataDescriptor, TemplateError> {
    let root = Element::parse(xml)?
        .ok_or_else(|| TemplateError::Parse("metadata output holds no document".to_string()))?;

    let mut descriptor = MetadataDescriptor::baseline();
    descriptor.shortdesc = root.child_text("shortdesc").trim().to_string();
    descriptor.longdesc = root.child_text("longdesc").trim().to_string();

    for param in root.descendants_named("parameter") {
        let Some(name) = param.attr("name") else {
            continue;
        };
        let content = param.child("content");
        descriptor.parameters.insert(
            name.to_string(),
            ParameterDescriptor {
                name: name.to_string(),
                shortdesc: param.child_text("shortdesc").trim().to_string(),
                longdesc: param.child_text("longdesc").trim().to_string(),
                kind: content.and_then(|c| c.attr("type")).map(str::to_string),
                default: content.and_then(|c| c.attr("default")).map(str::to_string),
                required: param
                    .attr("required")
                    .and_then(|v| v.trim().parse::<i64>().ok())
                    == Some(1),
            },
        );
    }

    for action in root.descendants_named("action") {
        let Some(name) = action.attr("name") else {
            continue;
        };
        let mut attrs: OpAttributes = action
            .attributes()
            .filter(|(key, _)| !ACTION_SKIPPED_ATTRS.contains(key))
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        if name == "monitor" && !attrs.contains_key("interval") {
            attrs.insert("interval".to_string(), DEFAULT_MONITOR_INTERVAL.to_string());
        }
        descriptor.ops.entry(name.to_string()).or_default().push(attrs);
    }

    Ok(descriptor)
}

type AgentKey = (String, String, String);

pub struct MetadataResolver {
    runner: Arc<dyn ToolRunner>,
    commands: CrmCommands,
    cache: TtlCache<AgentKey, MetadataDescriptor>,
}

impl MetadataResolver {
    pub fn new(runner: Arc<dyn ToolRunner>, commands: CrmCommands) -> Self {
        let ttl = commands.config().cache_ttl;
        Self {
            runner,
            commands,
            cache: TtlCache::new(ttl),
        }
    }

    /// Descriptor for `class[:provider]:kind`. An empty class or kind returns
    /// the baseline without consulting any tool.
    pub fn metadata(&self, class: &str, provider: &str, kind: &str) -> Resolved<MetadataDescriptor> {
        if class.is_empty() || kind.is_empty() {
            return Resolved::clean(MetadataDescriptor::baseline());
        }
        let key = (class.to_string(), provider.to_string(), kind.to_string());
        match self
            .cache
            .get_or_try_insert_with(key, || self.fetch(class, provider, kind))
        {
            Ok(descriptor) => Resolved::clean(descriptor),
            Err(err) => {
                warn!(
                    agent = %agent_address(class, provider, kind),
                    error = %err,
                    "agent metadata unavailable; using builtin meta attributes only"
                );
                Resolved::degraded(MetadataDescriptor::baseline(), vec![err])
            }
        }
    }

    pub fn invalidate_all(&self) {
        self.cache.clear();
    }

    fn fetch(&self, class: &str, provider: &str, kind: &str) -> Result<MetadataDescriptor, TemplateError> {
        let spec = self.commands.show_metadata(class, provider, kind);
        let stdout = self.runner.run(&spec)?.into_stdout("crm_resource")?;
        parse_metadata(&stdout)
    }
}
