//! Meta-attributes the cluster understands for every resource, independent of
//! the agent behind it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetaType {
    Boolean,
    Integer,
    Enum,
    String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaAttribute {
    #[serde(rename = "type")]
    pub kind: MetaType,
    pub default: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longdesc: Option<String>,
}

struct Builtin {
    name: &'static str,
    kind: MetaType,
    default: &'static str,
    values: &'static [&'static str],
    longdesc: Option<&'static str>,
}

const BUILTIN_META: [Builtin; 14] = [
    Builtin {
        name: "allow-migrate",
        kind: MetaType::Boolean,
        default: "false",
        values: &[],
        longdesc: Some("Set to true if the resource agent supports the migrate action"),
    },
    Builtin {
        name: "is-managed",
        kind: MetaType::Boolean,
        default: "true",
        values: &[],
        longdesc: Some("Is the cluster allowed to start and stop the resource?"),
    },
    Builtin {
        name: "maintenance",
        kind: MetaType::Boolean,
        default: "false",
        values: &[],
        longdesc: None,
    },
    Builtin {
        name: "interval-origin",
        kind: MetaType::Integer,
        default: "0",
        values: &[],
        longdesc: None,
    },
    Builtin {
        name: "migration-threshold",
        kind: MetaType::Integer,
        default: "0",
        values: &[],
        longdesc: Some(
            "How many failures may occur for this resource on a node, before this node is marked ineligible to host this resource. A value of INFINITY indicates that this feature is disabled.",
        ),
    },
    Builtin {
        name: "priority",
        kind: MetaType::Integer,
        default: "0",
        values: &[],
        longdesc: Some(
            "If not all resources can be active, the cluster will stop lower priority resources in order to keep higher priority ones active.",
        ),
    },
    Builtin {
        name: "multiple-active",
        kind: MetaType::Enum,
        default: "stop_start",
        values: &["block", "stop_only", "stop_start"],
        longdesc: Some(
            "What should the cluster do if it ever finds the resource active on more than one node?",
        ),
    },
    Builtin {
        name: "failure-timeout",
        kind: MetaType::Integer,
        default: "0",
        values: &[],
        longdesc: Some(
            "How many seconds to wait before acting as if the failure had not occurred, and potentially allowing the resource back to the node on which it failed. A value of 0 indicates that this feature is disabled.",
        ),
    },
    Builtin {
        name: "resource-stickiness",
        kind: MetaType::Integer,
        default: "0",
        values: &[],
        longdesc: Some("How much does the resource prefer to stay where it is?"),
    },
    Builtin {
        name: "target-role",
        kind: MetaType::Enum,
        default: "Started",
        values: &["Started", "Stopped", "Master"],
        longdesc: Some("What state should the cluster attempt to keep this resource in?"),
    },
    Builtin {
        name: "restart-type",
        kind: MetaType::Enum,
        default: "ignore",
        values: &["ignore", "restart"],
        longdesc: None,
    },
    Builtin {
        name: "description",
        kind: MetaType::String,
        default: "",
        values: &[],
        longdesc: None,
    },
    Builtin {
        name: "requires",
        kind: MetaType::Enum,
        default: "fencing",
        values: &["nothing", "quorum", "fencing"],
        longdesc: Some("Conditions under which the resource can be started."),
    },
    Builtin {
        name: "remote-node",
        kind: MetaType::String,
        default: "",
        values: &[],
        longdesc: Some(
            "The name of the remote-node this resource defines. This both enables the resource as a remote-node and defines the unique name used to identify the remote-node. If no other parameters are set, this value will also be assumed as the hostname to connect to at the port specified by remote-port. WARNING: This value cannot overlap with any resource or node IDs. If not specified, this feature is disabled.",
        ),
    },
];

pub fn builtin_meta_attributes() -> BTreeMap<String, MetaAttribute> {
    BUILTIN_META
        .iter()
        .map(|b| {
            let values = (!b.values.is_empty())
                .then(|| b.values.iter().map(|v| v.to_string()).collect());
            (
                b.name.to_string(),
                MetaAttribute {
                    kind: b.kind,
                    default: b.default.to_string(),
                    values,
                    longdesc: b.longdesc.map(str::to_string),
                },
            )
        })
        .collect()
}
