//! Class → provider → type index of installed resource agents.
//!
//! Built from `crm ra classes` plus one `crm ra list` per class and per
//! provider. The whole index lives under a single cache key; a failed class
//! enumeration is reported and not cached, while a failed per-provider type
//! listing leaves that provider empty and is cached with the index, so every
//! hit keeps reporting it until the entry expires.

use crate::cache::TtlCache;
use crate::catalog::Resolved;
use crate::connectors::{CrmCommands, ToolRunner};
use crate::error::TemplateError;
use crate::natural::{NaturalKey, natural_sort};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub const CATALOG_CACHE_KEY: &str = "crm_ra_classes";

/// Class name → provider name (`""` for none) → naturally sorted type names.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentCatalog {
    classes: BTreeMap<NaturalKey, BTreeMap<NaturalKey, Vec<String>>>,
}

impl AgentCatalog {
    pub fn insert(&mut self, class: &str, provider: &str, types: Vec<String>) {
        self.classes
            .entry(NaturalKey::from(class))
            .or_default()
            .insert(NaturalKey::from(provider), types);
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(NaturalKey::as_str)
    }

    pub fn providers(&self, class: &str) -> Vec<&str> {
        self.classes
            .get(&NaturalKey::from(class))
            .map(|providers| providers.keys().map(NaturalKey::as_str).collect())
            .unwrap_or_default()
    }

    pub fn types(&self, class: &str, provider: &str) -> Option<&[String]> {
        self.classes
            .get(&NaturalKey::from(class))?
            .get(&NaturalKey::from(provider))
            .map(Vec::as_slice)
    }

    pub fn contains_class(&self, class: &str) -> bool {
        self.classes.contains_key(&NaturalKey::from(class))
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// One line of `crm ra classes` output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassLine {
    pub class: String,
    /// Providers with hidden (`.`-prefixed) names removed, naturally sorted.
    pub providers: Vec<String>,
}

/// Parses `class` or `class / provider provider ...`. Blank lines and hidden
/// classes yield `None`.
pub fn parse_class_line(line: &str) -> Option<ClassLine> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('.') {
        return None;
    }
    let (class, providers) = match line.split_once('/') {
        Some((class, rest)) => (class.trim(), rest),
        None => (line, ""),
    };
    if class.is_empty() || class.starts_with('.') {
        return None;
    }
    let mut providers: Vec<String> = providers
        .split_whitespace()
        .filter(|p| !p.starts_with('.'))
        .map(str::to_string)
        .collect();
    natural_sort(&mut providers);
    Some(ClassLine {
        class: class.to_string(),
        providers,
    })
}

pub struct TypeCatalog {
    runner: Arc<dyn ToolRunner>,
    commands: CrmCommands,
    cache: TtlCache<&'static str, Resolved<AgentCatalog>>,
}

impl TypeCatalog {
    pub fn new(runner: Arc<dyn ToolRunner>, commands: CrmCommands) -> Self {
        let ttl = commands.config().cache_ttl;
        Self {
            runner,
            commands,
            cache: TtlCache::new(ttl),
        }
    }

    /// The full agent index, from cache when fresh.
    pub fn discover(&self) -> Resolved<AgentCatalog> {
        self.cache
            .get_or_try_insert_with(CATALOG_CACHE_KEY, || self.populate())
            .unwrap_or_else(|err| {
                warn!(error = %err, "agent class enumeration failed; returning empty catalog");
                Resolved::degraded(AgentCatalog::default(), vec![err])
            })
    }

    /// Naturally sorted agent types, optionally filtered by class and provider.
    pub fn types(
        &self,
        class: Option<&str>,
        provider: Option<&str>,
    ) -> Result<Vec<String>, TemplateError> {
        let spec = self.commands.list_types(class, provider);
        let stdout = self.runner.run(&spec)?.into_stdout("crm")?;
        let mut types: Vec<String> = stdout.split_whitespace().map(str::to_string).collect();
        natural_sort(&mut types);
        Ok(types)
    }

    /// Drops the cached index so the next `discover` re-runs the tools.
    pub fn invalidate(&self) {
        self.cache.invalidate(&CATALOG_CACHE_KEY);
    }

    fn populate(&self) -> Result<Resolved<AgentCatalog>, TemplateError> {
        let listing = self
            .runner
            .run(&self.commands.list_classes())?
            .into_stdout("crm")?;
        let heartbeat_enabled = self.commands.config().heartbeat_enabled();

        let mut catalog = AgentCatalog::default();
        let mut degraded = Vec::new();
        for entry in listing.lines().filter_map(parse_class_line) {
            if entry.class == "heartbeat" && !heartbeat_enabled {
                debug!("skipping heartbeat class; legacy resource directory is absent");
                continue;
            }
            let types = self.types_or_empty(&entry.class, None, &mut degraded);
            catalog.insert(&entry.class, "", types);
            for provider in &entry.providers {
                let types = self.types_or_empty(&entry.class, Some(provider), &mut degraded);
                catalog.insert(&entry.class, provider, types);
            }
        }
        Ok(Resolved::degraded(catalog, degraded))
    }

    fn types_or_empty(
        &self,
        class: &str,
        provider: Option<&str>,
        degraded: &mut Vec<TemplateError>,
    ) -> Vec<String> {
        self.types(Some(class), provider).unwrap_or_else(|err| {
            warn!(class, provider = provider.unwrap_or(""), error = %err, "listing agent types failed");
            degraded.push(err);
            Vec::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_class_has_no_providers() {
        assert_eq!(
            parse_class_line("lsb"),
            Some(ClassLine {
                class: "lsb".to_string(),
                providers: vec![],
            })
        );
    }

    #[test]
    fn provider_list_is_filtered_and_sorted() {
        let line = parse_class_line("ocf / .isolation pacemaker heartbeat linbit10 linbit9").unwrap();
        assert_eq!(line.class, "ocf");
        assert_eq!(
            line.providers,
            vec!["heartbeat", "linbit9", "linbit10", "pacemaker"]
        );
    }

    #[test]
    fn hidden_and_blank_lines_are_skipped() {
        assert_eq!(parse_class_line(""), None);
        assert_eq!(parse_class_line("   "), None);
        assert_eq!(parse_class_line(".hidden"), None);
        assert_eq!(parse_class_line(" / orphan"), None);
    }

    #[test]
    fn catalog_lookups() {
        let mut catalog = AgentCatalog::default();
        catalog.insert("ocf", "pacemaker", vec!["Dummy".to_string()]);
        catalog.insert("ocf", "", vec![]);
        catalog.insert("lsb", "", vec!["cron".to_string()]);
        assert_eq!(catalog.classes().collect::<Vec<_>>(), vec!["lsb", "ocf"]);
        assert_eq!(catalog.providers("ocf"), vec!["", "pacemaker"]);
        assert_eq!(
            catalog.types("ocf", "pacemaker"),
            Some(&["Dummy".to_string()][..])
        );
        assert_eq!(catalog.types("stonith", ""), None);
        let json = serde_json::to_value(&catalog).unwrap();
        assert_eq!(json["lsb"][""][0], "cron");
    }
}
