//! The live configuration store.
//!
//! The core only needs three things from the cluster configuration: an
//! existence probe scoped to an object kind, a fetch of one object node, and
//! an atomic whole-object replace. `CibadminStore` provides them through
//! `cibadmin`; `MemoryStore` keeps a configuration document in process.

use crate::connectors::{CrmCommands, ToolOutput, ToolRunner};
use crate::document::Element;
use crate::error::TemplateError;
use crate::template::{RecordKind, is_valid_id};
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use tempfile::NamedTempFile;
use tracing::debug;

pub trait LiveStore {
    fn exists(&self, id: &str, kind: RecordKind) -> Result<bool, TemplateError>;

    fn fetch(&self, id: &str, kind: RecordKind) -> Result<Element, TemplateError>;

    /// Replaces the stored object whose kind and id match `node`.
    fn replace(&self, node: &Element) -> Result<(), TemplateError>;
}

pub fn does_not_exist(id: &str) -> TemplateError {
    TemplateError::NotFound(format!("The ID \"{id}\" does not exist"))
}

fn is_object(element: &Element, kind: &str, id: &str) -> bool {
    element.name() == kind && element.attr("id") == Some(id)
}

const CIBADMIN: &str = "cibadmin";
const NOT_FOUND_CODES: [i32; 2] = [105, 6];
const PERMISSION_CODES: [i32; 3] = [13, 54, 4];

pub struct CibadminStore {
    runner: Arc<dyn ToolRunner>,
    commands: CrmCommands,
}

impl CibadminStore {
    pub fn new(runner: Arc<dyn ToolRunner>, commands: CrmCommands) -> Self {
        Self { runner, commands }
    }

    /// Looks `id` up through an xpath query, so only well-formed ids reach
    /// `cibadmin`.
    fn query(&self, id: &str, kind: RecordKind) -> Result<Option<Element>, TemplateError> {
        if !is_valid_id(id) {
            return Err(TemplateError::Validation {
                field: "id".to_string(),
                message: "Invalid Resource ID".to_string(),
            });
        }
        let spec = self.commands.query_object(kind.element_name(), id);
        let output = self.runner.run(&spec)?;
        match output.status {
            Some(0) => {
                let Some(root) = Element::parse(&output.stdout)? else {
                    return Ok(None);
                };
                Ok(root
                    .find(&|e| is_object(e, kind.element_name(), id))
                    .cloned())
            }
            Some(code) if NOT_FOUND_CODES.contains(&code) => Ok(None),
            _ => Err(classify_failure(id, &output)),
        }
    }
}

impl LiveStore for CibadminStore {
    fn exists(&self, id: &str, kind: RecordKind) -> Result<bool, TemplateError> {
        Ok(self.query(id, kind)?.is_some())
    }

    fn fetch(&self, id: &str, kind: RecordKind) -> Result<Element, TemplateError> {
        self.query(id, kind)?.ok_or_else(|| does_not_exist(id))
    }

    fn replace(&self, node: &Element) -> Result<(), TemplateError> {
        let id = node.attr("id").unwrap_or_default();
        let xml = node.to_xml()?;
        let mut file = NamedTempFile::new()
            .map_err(|err| TemplateError::Runtime(format!("creating replace file: {err}")))?;
        file.write_all(xml.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|err| TemplateError::Runtime(format!("writing replace file: {err}")))?;

        debug!(id, kind = node.name(), "replacing configuration object");
        let output = self.runner.run(&self.commands.replace_object(file.path()))?;
        if output.succeeded() {
            return Ok(());
        }
        Err(classify_failure(id, &output))
    }
}

fn classify_failure(id: &str, output: &ToolOutput) -> TemplateError {
    let stderr = output.stderr.trim();
    match output.status {
        Some(code) if NOT_FOUND_CODES.contains(&code) => does_not_exist(id),
        Some(code) if PERMISSION_CODES.contains(&code) => TemplateError::Security(if stderr.is_empty() {
            format!("{CIBADMIN} refused access to \"{id}\"")
        } else {
            stderr.to_string()
        }),
        Some(code) => TemplateError::Runtime(format!("{CIBADMIN} exited with {code}: {stderr}")),
        None => TemplateError::Runtime(format!("{CIBADMIN} was killed by a signal: {stderr}")),
    }
}

/// An in-process configuration document.
pub struct MemoryStore {
    document: Mutex<Element>,
    replace_error: Mutex<Option<TemplateError>>,
}

impl MemoryStore {
    pub fn new(document: Element) -> Self {
        Self {
            document: Mutex::new(document),
            replace_error: Mutex::new(None),
        }
    }

    pub fn from_xml(xml: &str) -> Result<Self, TemplateError> {
        Ok(Self::new(Element::parse_required(xml)?))
    }

    /// Makes the next `replace` fail with `err` and leave the document as is.
    pub fn fail_next_replace(&self, err: TemplateError) {
        *self
            .replace_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(err);
    }

    pub fn snapshot(&self) -> Element {
        self.document
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LiveStore for MemoryStore {
    fn exists(&self, id: &str, kind: RecordKind) -> Result<bool, TemplateError> {
        let document = self.document.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(document
            .find(&|e| is_object(e, kind.element_name(), id))
            .is_some())
    }

    fn fetch(&self, id: &str, kind: RecordKind) -> Result<Element, TemplateError> {
        let document = self.document.lock().unwrap_or_else(PoisonError::into_inner);
        document
            .find(&|e| is_object(e, kind.element_name(), id))
            .cloned()
            .ok_or_else(|| does_not_exist(id))
    }

    fn replace(&self, node: &Element) -> Result<(), TemplateError> {
        if let Some(err) = self
            .replace_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            return Err(err);
        }
        let id = node.attr("id").unwrap_or_default();
        let mut document = self.document.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = document
            .find_mut(&|e| is_object(e, node.name(), id))
            .ok_or_else(|| does_not_exist(id))?;
        *slot = node.clone();
        Ok(())
    }
}
