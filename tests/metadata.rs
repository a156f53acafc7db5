#![cfg(unix)]

#[path = "support/common.rs"]
mod common;

use anyhow::Result;
use cibtemplate::{MetaType, MetadataResolver, ToolOutput};
use common::{ScriptedRunner, as_runner, commands_with_marker, shared};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::path::Path;

const IPADDR2: &str = r#"<?xml version="1.0"?>
<!DOCTYPE resource-agent SYSTEM "ra-api-1.dtd">
<resource-agent name="IPaddr2">
  <version>1.0</version>
  <longdesc lang="en">Manages virtual IPv4 and IPv6 addresses.</longdesc>
  <shortdesc lang="en">Manages virtual IPv4 and IPv6 addresses (Linux specific version)</shortdesc>
  <parameters>
    <parameter name="ip" unique="1" required="1">
      <longdesc lang="en">The IPv4 or IPv6 address to be configured.</longdesc>
      <shortdesc lang="en">IPv4 or IPv6 address</shortdesc>
      <content type="string" default=""/>
    </parameter>
    <parameter name="cidr_netmask">
      <shortdesc lang="en">CIDR netmask</shortdesc>
      <content type="string"/>
    </parameter>
  </parameters>
  <actions>
    <action name="start" timeout="20s"/>
    <action name="stop" timeout="20s"/>
    <action name="monitor" depth="0" timeout="20s"/>
    <action name="monitor" depth="10" timeout="20s" interval="5"/>
  </actions>
</resource-agent>
"#;

const SHOW_IPADDR2: [&str; 2] = ["--show-metadata", "ocf:heartbeat:IPaddr2"];

fn resolver(runner: &std::sync::Arc<ScriptedRunner>) -> MetadataResolver {
    MetadataResolver::new(
        as_runner(runner),
        commands_with_marker(Path::new("/nonexistent/resource.d")),
    )
}

fn attrs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn monitor_actions_get_a_default_interval() -> Result<()> {
    let runner = shared(ScriptedRunner::new().ok("crm_resource", &SHOW_IPADDR2, IPADDR2));
    let resolved = resolver(&runner).metadata("ocf", "heartbeat", "IPaddr2");

    assert!(!resolved.is_degraded());
    let descriptor = resolved.value;
    assert_eq!(
        descriptor.ops["monitor"],
        vec![
            attrs(&[("interval", "20"), ("timeout", "20s")]),
            attrs(&[("interval", "5"), ("timeout", "20s")]),
        ]
    );
    assert_eq!(descriptor.ops["stop"], vec![attrs(&[("timeout", "20s")])]);
    assert!(descriptor.parameters["ip"].required);
    assert_eq!(descriptor.parameters["ip"].default.as_deref(), Some(""));
    assert_eq!(descriptor.parameters["cidr_netmask"].default, None);
    assert_eq!(descriptor.meta.len(), 14);
    Ok(())
}

#[test]
fn missing_class_or_type_returns_the_baseline_without_tools() -> Result<()> {
    let runner = shared(ScriptedRunner::new());
    let resolver = resolver(&runner);

    for (class, provider, kind) in [("", "heartbeat", ""), ("ocf", "heartbeat", ""), ("", "", "Dummy")] {
        let resolved = resolver.metadata(class, provider, kind);
        assert!(!resolved.is_degraded());
        assert!(resolved.value.parameters.is_empty());
        assert!(resolved.value.ops.is_empty());
        assert_eq!(resolved.value.meta.len(), 14);
    }
    assert!(runner.calls().is_empty());
    Ok(())
}

#[test]
fn builtin_meta_attributes_are_always_attached() -> Result<()> {
    let runner = shared(ScriptedRunner::new().ok("crm_resource", &SHOW_IPADDR2, IPADDR2));
    let meta = resolver(&runner).metadata("ocf", "heartbeat", "IPaddr2").value.meta;

    let role = &meta["target-role"];
    assert_eq!(role.kind, MetaType::Enum);
    assert_eq!(role.default, "Started");
    assert!(role.values.as_ref().is_some_and(|v| v.contains(&"Stopped".to_string())));
    assert_eq!(meta["is-managed"].kind, MetaType::Boolean);
    assert!(meta.contains_key("migration-threshold"));
    assert!(!meta.contains_key("remote-port"));
    Ok(())
}

#[test]
fn malformed_or_failing_output_degrades_to_the_baseline() -> Result<()> {
    let runner = shared(
        ScriptedRunner::new()
            .ok("crm_resource", &["--show-metadata", "ocf:pacemaker:Broken"], "<resource-agent><parameters>")
            .ok("crm_resource", &["--show-metadata", "lsb:empty"], "")
            .on(
                "crm_resource",
                &["--show-metadata", "ocf:pacemaker:Gone"],
                Ok(ToolOutput::failure(5, "no such agent")),
            ),
    );
    let resolver = resolver(&runner);

    for (class, provider, kind) in [
        ("ocf", "pacemaker", "Broken"),
        ("lsb", "", "empty"),
        ("ocf", "pacemaker", "Gone"),
    ] {
        let resolved = resolver.metadata(class, provider, kind);
        assert!(resolved.is_degraded(), "{class}:{kind} should be degraded");
        assert!(resolved.value.parameters.is_empty());
        assert_eq!(resolved.value.meta.len(), 14);
    }

    // Failures are retried on the next lookup.
    resolver.metadata("ocf", "pacemaker", "Gone");
    assert_eq!(
        runner.call_count("crm_resource", &["--show-metadata", "ocf:pacemaker:Gone"]),
        2
    );
    Ok(())
}

#[test]
fn descriptors_are_cached_per_agent() -> Result<()> {
    let runner = shared(ScriptedRunner::new().ok("crm_resource", &SHOW_IPADDR2, IPADDR2));
    let resolver = resolver(&runner);

    let first = resolver.metadata("ocf", "heartbeat", "IPaddr2");
    let second = resolver.metadata("ocf", "heartbeat", "IPaddr2");
    assert_eq!(first, second);
    assert_eq!(runner.call_count("crm_resource", &SHOW_IPADDR2), 1);

    resolver.invalidate_all();
    resolver.metadata("ocf", "heartbeat", "IPaddr2");
    assert_eq!(runner.call_count("crm_resource", &SHOW_IPADDR2), 2);
    Ok(())
}
