//! Moves templates between the configuration document and `Template`.

use crate::document::Element;
use crate::template::{NvPairs, OpAttributes, Operations, Template};
use std::collections::BTreeSet;

pub const INSTANCE_ATTRIBUTES: &str = "instance_attributes";
pub const META_ATTRIBUTES: &str = "meta_attributes";
pub const OPERATIONS: &str = "operations";

/// Monitor depth, stored as a nested instance attribute of the `op`.
pub const OCF_CHECK_LEVEL: &str = "OCF_CHECK_LEVEL";

const OP_SKIPPED_ATTRS: [&str; 2] = ["name", "id"];

/// Reads a `template` node. Absent attributes and sections become empty
/// strings and empty maps.
pub fn from_document(node: &Element) -> Template {
    Template {
        id: node.attr("id").unwrap_or_default().to_string(),
        class: node.attr("class").unwrap_or_default().to_string(),
        provider: node.attr("provider").unwrap_or_default().to_string(),
        kind: node.attr("type").unwrap_or_default().to_string(),
        params: read_nvpairs(node.child(INSTANCE_ATTRIBUTES)),
        meta: read_nvpairs(node.child(META_ATTRIBUTES)),
        ops: read_operations(node.child(OPERATIONS)),
    }
}

fn read_nvpairs(section: Option<&Element>) -> NvPairs {
    let Some(section) = section else {
        return NvPairs::new();
    };
    section
        .children_named("nvpair")
        .filter_map(|nv| {
            let name = nv.attr("name")?;
            Some((name.to_string(), nv.attr("value").unwrap_or_default().to_string()))
        })
        .collect()
}

fn read_operations(section: Option<&Element>) -> Operations {
    let mut ops = Operations::new();
    let Some(section) = section else {
        return ops;
    };
    for op in section.children_named("op") {
        let Some(name) = op.attr("name") else {
            continue;
        };
        let mut attrs: OpAttributes = op
            .attributes()
            .filter(|(key, _)| !OP_SKIPPED_ATTRS.contains(key))
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        if name == "monitor" {
            if let Some(level) = op_check_level(op) {
                attrs.insert(OCF_CHECK_LEVEL.to_string(), level.to_string());
            }
        }
        ops.entry(name.to_string()).or_default().push(attrs);
    }
    ops
}

fn op_check_level(op: &Element) -> Option<&str> {
    op.child(INSTANCE_ATTRIBUTES)?
        .children_named("nvpair")
        .find(|nv| nv.attr("name") == Some(OCF_CHECK_LEVEL))?
        .attr("value")
}

/// Builds a fresh `template` node carrying everything in `template`.
pub fn to_document(template: &Template) -> Element {
    let mut node = Element::new("template")
        .with_attr("id", template.id.as_str())
        .with_attr("class", template.class.as_str());
    if !template.provider.is_empty() {
        node.set_attr("provider", template.provider.as_str());
    }
    node.set_attr("type", template.kind.as_str());

    if !template.params.is_empty() {
        let mut section = section_element(&template.id, INSTANCE_ATTRIBUTES);
        for (name, value) in &template.params {
            let id = nvpair_id(&section, name);
            section.push_child(nvpair(&id, name, value));
        }
        node.push_child(section);
    }
    if !template.meta.is_empty() {
        let mut section = section_element(&template.id, META_ATTRIBUTES);
        for (name, value) in &template.meta {
            let id = nvpair_id(&section, name);
            section.push_child(nvpair(&id, name, value));
        }
        node.push_child(section);
    }
    if !template.ops.is_empty() {
        let mut section = Element::new(OPERATIONS);
        let mut taken = BTreeSet::new();
        for (name, instances) in &template.ops {
            for attrs in instances {
                section.push_child(op_element(&template.id, name, attrs, &mut taken));
            }
        }
        node.push_child(section);
    }
    node
}

pub(crate) fn section_element(owner_id: &str, section: &str) -> Element {
    Element::new(section).with_attr("id", format!("{owner_id}-{section}"))
}

pub(crate) fn nvpair(id: &str, name: &str, value: &str) -> Element {
    Element::new("nvpair")
        .with_attr("id", id)
        .with_attr("name", name)
        .with_attr("value", value)
}

/// `<section-id>-<name>`, the id crm gives a new nvpair.
pub(crate) fn nvpair_id(section: &Element, name: &str) -> String {
    format!(
        "{}-{}",
        section.attr("id").unwrap_or(INSTANCE_ATTRIBUTES),
        sanitize_id(name)
    )
}

/// Builds an `op` element, nesting `OCF_CHECK_LEVEL` as an instance
/// attribute. `taken` holds op ids already used under this owner.
pub(crate) fn op_element(
    owner_id: &str,
    name: &str,
    attrs: &OpAttributes,
    taken: &mut BTreeSet<String>,
) -> Element {
    let interval = attrs.get("interval").map(String::as_str).unwrap_or("0");
    let base = format!("{owner_id}-{}-{}", sanitize_id(name), sanitize_id(interval));
    let mut id = base.clone();
    let mut n = 1;
    while !taken.insert(id.clone()) {
        id = format!("{base}-{n}");
        n += 1;
    }

    let mut op = Element::new("op").with_attr("id", id.as_str()).with_attr("name", name);
    for (key, value) in attrs {
        if OP_SKIPPED_ATTRS.contains(&key.as_str()) {
            continue;
        }
        if key == OCF_CHECK_LEVEL {
            set_check_level(&mut op, value);
        } else {
            op.set_attr(key, value.as_str());
        }
    }
    op
}

/// Merges pending `attrs` into a live `op`. Empty values remove the attribute.
pub(crate) fn apply_op_attributes(op: &mut Element, attrs: &OpAttributes) {
    for (key, value) in attrs {
        if OP_SKIPPED_ATTRS.contains(&key.as_str()) {
            continue;
        }
        match (key.as_str(), value.is_empty()) {
            (OCF_CHECK_LEVEL, true) => remove_check_level(op),
            (OCF_CHECK_LEVEL, false) => set_check_level(op, value),
            (_, true) => {
                op.remove_attr(key);
            }
            (_, false) => op.set_attr(key, value.as_str()),
        }
    }
}

fn remove_check_level(op: &mut Element) {
    if let Some(section) = op.child_mut(INSTANCE_ATTRIBUTES) {
        section.retain_children(|nv| nv.attr("name") != Some(OCF_CHECK_LEVEL));
    }
    op.retain_children(|c| c.name() != INSTANCE_ATTRIBUTES || !c.children().is_empty());
}

fn set_check_level(op: &mut Element, value: &str) {
    let op_id = op.attr("id").unwrap_or("op").to_string();
    let section = op.ensure_child(INSTANCE_ATTRIBUTES, || section_element(&op_id, INSTANCE_ATTRIBUTES));
    let existing = section
        .children_mut()
        .iter_mut()
        .find(|nv| nv.attr("name") == Some(OCF_CHECK_LEVEL));
    match existing {
        Some(nv) => nv.set_attr("value", value),
        None => {
            let id = nvpair_id(section, OCF_CHECK_LEVEL);
            section.push_child(nvpair(&id, OCF_CHECK_LEVEL, value));
        }
    }
}

fn sanitize_id(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LIVE: &str = r#"
<template id="db" class="ocf" provider="heartbeat" type="mysql">
  <instance_attributes id="db-instance_attributes">
    <nvpair id="db-instance_attributes-binary" name="binary" value="/usr/bin/mysqld_safe"/>
  </instance_attributes>
  <meta_attributes id="db-meta_attributes">
    <nvpair id="db-meta_attributes-target-role" name="target-role" value="Stopped"/>
  </meta_attributes>
  <operations>
    <op id="db-monitor-10" name="monitor" interval="10" timeout="20"/>
    <op id="db-monitor-60" name="monitor" interval="60" timeout="30">
      <instance_attributes id="db-monitor-60-instance_attributes">
        <nvpair id="db-monitor-60-depth" name="OCF_CHECK_LEVEL" value="10"/>
      </instance_attributes>
    </op>
    <op id="db-start-0" name="start" interval="0" timeout="120"/>
  </operations>
</template>"#;

    fn attrs(pairs: &[(&str, &str)]) -> OpAttributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn reads_every_section() {
        let node = Element::parse_required(LIVE).unwrap();
        let template = from_document(&node);
        assert_eq!(template.id, "db");
        assert_eq!(template.agent(), "ocf:heartbeat:mysql");
        assert_eq!(template.params["binary"], "/usr/bin/mysqld_safe");
        assert_eq!(template.meta["target-role"], "Stopped");
        assert_eq!(
            template.ops["monitor"],
            vec![
                attrs(&[("interval", "10"), ("timeout", "20")]),
                attrs(&[("interval", "60"), ("timeout", "30"), ("OCF_CHECK_LEVEL", "10")]),
            ]
        );
        assert_eq!(
            template.ops["start"],
            vec![attrs(&[("interval", "0"), ("timeout", "120")])]
        );
    }

    #[test]
    fn missing_pieces_become_empty() {
        let node = Element::parse_required(r#"<template id="bare"/>"#).unwrap();
        let template = from_document(&node);
        assert_eq!(template.class, "");
        assert_eq!(template.provider, "");
        assert_eq!(template.kind, "");
        assert!(template.ops.is_empty());
        assert!(template.params.is_empty());
        assert!(template.meta.is_empty());
    }

    #[test]
    fn check_level_is_only_lifted_for_monitor() {
        let node = Element::parse_required(
            r#"<template id="t"><operations>
                 <op id="t-start" name="start" interval="0">
                   <instance_attributes id="x"><nvpair id="y" name="OCF_CHECK_LEVEL" value="20"/></instance_attributes>
                 </op>
               </operations></template>"#,
        )
        .unwrap();
        let template = from_document(&node);
        assert_eq!(template.ops["start"], vec![attrs(&[("interval", "0")])]);
    }

    #[test]
    fn to_document_round_trips() {
        let node = Element::parse_required(LIVE).unwrap();
        let template = from_document(&node);
        let rebuilt = to_document(&template);
        assert_eq!(from_document(&rebuilt), template);
        let ops = rebuilt.child(OPERATIONS).unwrap();
        let ids: Vec<_> = ops.children().iter().filter_map(|op| op.attr("id")).collect();
        assert_eq!(ids, vec!["db-monitor-10", "db-monitor-60", "db-start-0"]);
    }

    #[test]
    fn empty_op_values_survive_a_rebuild() {
        let mut template = Template::new("t");
        template.ops.insert(
            "monitor".to_string(),
            vec![attrs(&[("interval", "10"), ("description", ""), ("OCF_CHECK_LEVEL", "")])],
        );
        let node = to_document(&template);
        let op = &node.child(OPERATIONS).unwrap().children()[0];
        assert_eq!(op.attr("description"), Some(""));
        assert_eq!(op_check_level(op), Some(""));
        assert_eq!(from_document(&node), template);
    }

    #[test]
    fn duplicate_op_ids_get_a_suffix() {
        let mut template = Template::new("t");
        template.ops.insert(
            "monitor".to_string(),
            vec![attrs(&[("interval", "10")]), attrs(&[("interval", "10"), ("role", "Master")])],
        );
        let node = to_document(&template);
        let ids: Vec<_> = node
            .child(OPERATIONS)
            .unwrap()
            .children()
            .iter()
            .filter_map(|op| op.attr("id"))
            .collect();
        assert_eq!(ids, vec!["t-monitor-10", "t-monitor-10-1"]);
    }
}
