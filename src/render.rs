//! `crm` configuration-script rendering.
//!
//! A template becomes one `rsc_template` line. Every value is quoted with
//! `shell_escape`, so splitting the line into POSIX shell words gives back
//! the original values byte for byte. The id and the agent triple are
//! emitted verbatim, so they must already be shell-safe.

use crate::error::RecordErrors;
use crate::template::{NvPairs, Template};

pub fn render(template: &Template) -> Result<String, RecordErrors> {
    let mut errors = template.validate();
    for (field, value) in [
        ("class", &template.class),
        ("provider", &template.provider),
        ("type", &template.kind),
    ] {
        if !value.chars().all(is_shell_safe) {
            errors.add(field, "Invalid agent name");
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    let mut tokens: Vec<String> = Vec::new();
    tokens.push(format!("rsc_template {}", template.id));
    tokens.push(template.agent());

    if !template.params.is_empty() {
        tokens.push("params".to_string());
        push_pairs(&mut tokens, &template.params);
    }

    for (name, instances) in &template.ops {
        for attrs in instances {
            tokens.push(format!("op {name}"));
            push_pairs(&mut tokens, attrs);
        }
    }

    if !template.meta.is_empty() {
        tokens.push("meta".to_string());
        push_pairs(&mut tokens, &template.meta);
    }

    tokens.retain(|token| !token.is_empty());
    Ok(tokens.join(" "))
}

fn push_pairs(tokens: &mut Vec<String>, pairs: &NvPairs) {
    tokens.extend(
        pairs
            .iter()
            .map(|(key, value)| format!("{key}={}", shell_escape(value))),
    );
}

/// Quotes `value` as a single POSIX shell word.
///
/// Safe characters pass through, every other character is backslash-escaped,
/// newlines are wrapped in single quotes, and the empty string becomes `''`.
pub fn shell_escape(value: &str) -> String {
    if value.is_empty() {
        return "''".to_string();
    }
    let mut out = String::with_capacity(value.len() * 2);
    for c in value.chars() {
        match c {
            '\n' => out.push_str("'\n'"),
            c if is_shell_safe(c) => out.push(c),
            c => {
                out.push('\\');
                out.push(c);
            }
        }
    }
    out
}

fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ',' | ':' | '+' | '/' | '@')
}
