//! Reconciles a template's pending sections against its live node.
//!
//! Keys present in the pending map overwrite the live value, keys absent from
//! it are left alone, and a pending empty value deletes the key. Operations
//! are keyed by name: a pending name describes the complete set of instances
//! for that name, matched to live instances by interval.

use crate::document::Element;
use crate::template::translate::{
    INSTANCE_ATTRIBUTES, META_ATTRIBUTES, OPERATIONS, apply_op_attributes, nvpair, nvpair_id,
    op_element, section_element,
};
use crate::template::{NvPairs, OpAttributes, Operations, Template};
use std::collections::BTreeSet;

/// Merges ops, params, and meta of `template` into `node` in place.
pub fn merge_template(node: &mut Element, template: &Template) {
    merge_operations(node, &template.ops);
    merge_nvpairs(node, INSTANCE_ATTRIBUTES, &template.params);
    merge_nvpairs(node, META_ATTRIBUTES, &template.meta);
}

pub fn merge_nvpairs(node: &mut Element, section_name: &str, pending: &NvPairs) {
    if pending.is_empty() {
        return;
    }
    let owner_id = node.attr("id").unwrap_or_default().to_string();
    let section = node.ensure_child(section_name, || section_element(&owner_id, section_name));

    for (name, value) in pending {
        if value.is_empty() {
            section.retain_children(|nv| nv.attr("name") != Some(name.as_str()));
            continue;
        }
        let existing = section
            .children_mut()
            .iter_mut()
            .find(|nv| nv.attr("name") == Some(name.as_str()));
        match existing {
            Some(nv) => nv.set_attr("value", value.as_str()),
            None => {
                let id = nvpair_id(section, name);
                section.push_child(nvpair(&id, name, value));
            }
        }
    }

    drop_if_empty(node, section_name);
}

pub fn merge_operations(node: &mut Element, pending: &Operations) {
    if pending.is_empty() {
        return;
    }
    let owner_id = node.attr("id").unwrap_or_default().to_string();
    let section = node.ensure_child(OPERATIONS, || Element::new(OPERATIONS));
    let mut taken: BTreeSet<String> = section
        .children()
        .iter()
        .filter_map(|op| op.attr("id").map(str::to_string))
        .collect();

    for (name, instances) in pending {
        let ops = section.children_mut();
        let mut matched = vec![false; ops.len()];
        let mut appended = Vec::new();

        for attrs in instances {
            let interval = interval_of(attrs);
            let hit = ops.iter().enumerate().position(|(idx, op)| {
                !matched[idx] && is_op_named(op, name) && op.attr("interval").unwrap_or("0") == interval
            });
            match hit {
                Some(idx) => {
                    apply_op_attributes(&mut ops[idx], attrs);
                    matched[idx] = true;
                }
                None => {
                    let present: OpAttributes = attrs
                        .iter()
                        .filter(|(_, value)| !value.is_empty())
                        .map(|(key, value)| (key.clone(), value.clone()))
                        .collect();
                    appended.push(op_element(&owner_id, name, &present, &mut taken));
                }
            }
        }

        let mut idx = 0;
        ops.retain(|op| {
            let keep = matched[idx] || !is_op_named(op, name);
            idx += 1;
            keep
        });
        ops.extend(appended);
    }

    drop_if_empty(node, OPERATIONS);
}

fn interval_of(attrs: &OpAttributes) -> &str {
    attrs
        .get("interval")
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .unwrap_or("0")
}

fn is_op_named(op: &Element, name: &str) -> bool {
    op.name() == "op" && op.attr("name") == Some(name)
}

fn drop_if_empty(node: &mut Element, section_name: &str) {
    node.retain_children(|c| c.name() != section_name || !c.children().is_empty());
}
