//! Error kinds shared by the discovery, translation, and commit paths.
//!
//! `TemplateError` is what library calls return. `RecordErrors` is the
//! field/base error collection a record carries back to its caller after a
//! failed validation or commit; it never panics and never crosses the commit
//! boundary as anything other than a value.

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    #[error("{0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    Security(String),

    #[error("{tool} failed: {reason}")]
    ExternalTool { tool: String, reason: String },

    #[error("{tool} did not finish within {seconds}s")]
    Timeout { tool: String, seconds: u64 },

    #[error("malformed document: {0}")]
    Parse(String),

    #[error("{0}")]
    Runtime(String),
}

impl TemplateError {
    pub fn external(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        TemplateError::ExternalTool {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// True for failures of an external tool, including timeouts.
    pub fn is_external_tool(&self) -> bool {
        matches!(
            self,
            TemplateError::ExternalTool { .. } | TemplateError::Timeout { .. }
        )
    }
}

/// Base-level and per-field messages collected while validating or
/// committing a record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordErrors {
    pub base: Vec<String>,
    pub fields: BTreeMap<String, Vec<String>>,
}

impl RecordErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_base(&mut self, message: impl Into<String>) {
        self.base.push(message.into());
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty() && self.fields.is_empty()
    }

    pub fn on(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every message, base first, fields in name order.
    pub fn full_messages(&self) -> Vec<String> {
        let mut out = self.base.clone();
        for (field, messages) in &self.fields {
            out.extend(messages.iter().map(|m| format!("{field}: {m}")));
        }
        out
    }
}

impl fmt::Display for RecordErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_messages().join("; "))
    }
}

impl std::error::Error for RecordErrors {}

impl From<TemplateError> for RecordErrors {
    fn from(err: TemplateError) -> Self {
        let mut errors = RecordErrors::new();
        match err {
            TemplateError::Validation { field, message } => errors.add(&field, message),
            other => errors.add_base(other.to_string()),
        }
        errors
    }
}
