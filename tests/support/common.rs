#![allow(dead_code)]

use anyhow::{Context, Result};
use cibtemplate::{CommandSpec, CrmCommands, TemplateError, ToolConfig, ToolOutput, ToolRunner};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use tempfile::TempDir;

// Fake runner that answers scripted (tool, args) pairs and records every
// invocation. Unscripted invocations fail like a missing binary would.
pub struct ScriptedRunner {
    rules: Vec<(String, Vec<String>, Result<ToolOutput, TemplateError>)>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn on(mut self, tool: &str, args: &[&str], result: Result<ToolOutput, TemplateError>) -> Self {
        self.rules.push((
            tool.to_string(),
            args.iter().map(|a| a.to_string()).collect(),
            result,
        ));
        self
    }

    pub fn ok(self, tool: &str, args: &[&str], stdout: &str) -> Self {
        self.on(tool, args, Ok(ToolOutput::success(stdout)))
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, tool: &str, args: &[&str]) -> usize {
        self.calls()
            .iter()
            .filter(|(t, a)| t == tool && a.iter().map(String::as_str).eq(args.iter().copied()))
            .count()
    }
}

impl ToolRunner for ScriptedRunner {
    fn run(&self, spec: &CommandSpec) -> Result<ToolOutput, TemplateError> {
        let tool = spec.tool_name();
        let args = spec.arg_strings();
        self.calls.lock().unwrap().push((tool.clone(), args.clone()));
        self.rules
            .iter()
            .find(|(t, a, _)| *t == tool && *a == args)
            .map(|(_, _, result)| result.clone())
            .unwrap_or_else(|| Err(TemplateError::external(tool, "not scripted")))
    }
}

pub fn shared(runner: ScriptedRunner) -> Arc<ScriptedRunner> {
    Arc::new(runner)
}

pub fn as_runner(runner: &Arc<ScriptedRunner>) -> Arc<dyn ToolRunner> {
    Arc::clone(runner) as Arc<dyn ToolRunner>
}

/// Commands whose heartbeat marker points at `marker`.
pub fn commands_with_marker(marker: &Path) -> CrmCommands {
    CrmCommands::new(ToolConfig::default().with_heartbeat_marker(marker))
}

// Serializes tests that write and then exec fake tools, so a concurrent fork
// cannot hold a script open for writing (ETXTBSY).
pub struct ExecGuard {
    _guard: MutexGuard<'static, ()>,
}

pub fn exec_guard() -> ExecGuard {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let mutex = LOCK.get_or_init(|| Mutex::new(()));
    let guard = mutex.lock().unwrap_or_else(|err| err.into_inner());
    ExecGuard { _guard: guard }
}

// Scratch directory of executable shell scripts standing in for the cluster
// tools.
pub struct FakeSbin {
    pub dir: TempDir,
}

impl FakeSbin {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: TempDir::new().context("creating fake sbin dir")?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn install(&self, name: &str, body: &str) -> Result<PathBuf> {
        let path = self.dir.path().join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n"))
            .with_context(|| format!("writing fake tool {}", path.display()))?;
        make_executable(&path)?;
        Ok(path)
    }

    pub fn config(&self) -> ToolConfig {
        ToolConfig::default()
            .with_sbin_dir(self.path())
            .with_heartbeat_marker(self.path().join("no-such-marker"))
    }
}

pub fn make_executable(path: &Path) -> Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)?;
    Ok(())
}

/// Splits `line` into words with `/bin/sh` itself.
pub fn shell_words(line: &str) -> Result<Vec<String>> {
    let output = Command::new("/bin/sh")
        .arg("-c")
        .arg(format!("for w in {line}; do printf '%s\\0' \"$w\"; done"))
        .output()
        .context("running /bin/sh")?;
    assert!(output.status.success(), "sh rejected: {line}");
    let stdout = String::from_utf8(output.stdout)?;
    Ok(stdout
        .split('\0')
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect())
}

pub const LIVE_CIB: &str = r#"<cib epoch="12" num_updates="0" admin_epoch="0">
  <configuration>
    <crm_config/>
    <nodes/>
    <resources>
      <template id="web" class="ocf" provider="heartbeat" type="apache">
        <instance_attributes id="web-instance_attributes">
          <nvpair id="web-instance_attributes-configfile" name="configfile" value="/etc/apache2/httpd.conf"/>
          <nvpair id="web-instance_attributes-port" name="port" value="80"/>
        </instance_attributes>
        <meta_attributes id="web-meta_attributes">
          <nvpair id="web-meta_attributes-target-role" name="target-role" value="Started"/>
        </meta_attributes>
        <operations>
          <op id="web-monitor-10" name="monitor" interval="10" timeout="20"/>
          <op id="web-monitor-60" name="monitor" interval="60" timeout="30">
            <instance_attributes id="web-monitor-60-instance_attributes">
              <nvpair id="web-monitor-60-instance_attributes-OCF_CHECK_LEVEL" name="OCF_CHECK_LEVEL" value="10"/>
            </instance_attributes>
          </op>
          <op id="web-start-0" name="start" interval="0" timeout="40"/>
        </operations>
      </template>
      <template id="cron-tmpl" class="lsb" type="cron"/>
      <primitive id="vip" class="ocf" provider="heartbeat" type="IPaddr2"/>
    </resources>
    <constraints/>
  </configuration>
</cib>"#;
