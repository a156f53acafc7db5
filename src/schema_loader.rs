//! JSON Schema gate for template documents supplied from outside.
//!
//! The bundled schema (`schema/template.schema.json`) is compiled on demand;
//! callers may also point at a replacement schema on disk. Input that fails
//! validation is rejected with every violation listed, before serde ever sees
//! it.

use crate::template::Template;
use anyhow::{Context, Result, anyhow, bail};
use jsonschema::JSONSchema;
use serde_json::Value;
use std::fs::File;
use std::path::Path;

const BUNDLED_TEMPLATE_SCHEMA: &str = include_str!("../schema/template.schema.json");

pub fn compile_template_schema(path: Option<&Path>) -> Result<JSONSchema> {
    let schema: Value = match path {
        Some(path) => serde_json::from_reader(
            File::open(path).with_context(|| format!("opening schema {}", path.display()))?,
        )
        .with_context(|| format!("parsing schema {}", path.display()))?,
        None => serde_json::from_str(BUNDLED_TEMPLATE_SCHEMA)
            .context("parsing bundled template schema")?,
    };
    JSONSchema::compile(&schema).map_err(|err| anyhow!("compiling template schema: {err}"))
}

/// Validates `input` against `schema` and deserializes it.
pub fn template_from_json(schema: &JSONSchema, input: &Value) -> Result<Template> {
    if let Err(errors) = schema.validate(input) {
        let details = errors
            .map(|err| format!("{}: {err}", err.instance_path))
            .collect::<Vec<_>>()
            .join("\n");
        bail!("template failed schema validation:\n{details}");
    }
    serde_json::from_value(input.clone()).context("decoding template")
}
