//! Resource template engine for a cluster configuration console.
//!
//! Translates `template` nodes of the live cluster configuration into a
//! normalized `Template`, discovers what resource agents exist and what they
//! accept, merges edits back into the live node, and renders the `crm`
//! script form of a template.

pub mod cache;
pub mod catalog;
pub mod commit;
pub mod config;
pub mod connectors;
pub mod document;
pub mod error;
pub mod natural;
pub mod render;
pub mod schema_loader;
pub mod store;
pub mod template;

pub use catalog::{
    AgentCatalog, MetaAttribute, MetaType, MetadataDescriptor, MetadataResolver,
    ParameterDescriptor, Resolved, TypeCatalog, builtin_meta_attributes,
};
pub use commit::commit;
pub use config::ToolConfig;
pub use connectors::{CommandSpec, CrmCommands, ProcessRunner, ToolOutput, ToolRunner};
pub use document::Element;
pub use error::{RecordErrors, TemplateError};
pub use natural::{NaturalKey, natural_cmp, natural_sort};
pub use render::{render, shell_escape};
pub use store::{CibadminStore, LiveStore, MemoryStore};
pub use template::{RecordKind, Template, from_document, to_document};

use std::sync::Arc;

/// Discovery services and the live store, wired to one runner.
///
/// Construct once per process and share; the catalog and metadata caches
/// live inside these instances.
pub struct Services {
    pub catalog: TypeCatalog,
    pub metadata: MetadataResolver,
    pub store: CibadminStore,
}

impl Services {
    pub fn new(config: ToolConfig) -> Self {
        let runner: Arc<dyn ToolRunner> = Arc::new(ProcessRunner::new(config.tool_timeout));
        Self::with_runner(config, runner)
    }

    pub fn with_runner(config: ToolConfig, runner: Arc<dyn ToolRunner>) -> Self {
        let commands = CrmCommands::new(config);
        Self {
            catalog: TypeCatalog::new(Arc::clone(&runner), commands.clone()),
            metadata: MetadataResolver::new(Arc::clone(&runner), commands.clone()),
            store: CibadminStore::new(runner, commands),
        }
    }

    /// Reads one template from the live store.
    pub fn load_template(&self, id: &str) -> Result<Template, TemplateError> {
        let node = self.store.fetch(id, RecordKind::Template)?;
        Ok(from_document(&node))
    }
}
