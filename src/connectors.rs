//! Connectors to the cluster command-line tools.
//!
//! Every external invocation is described as a `CommandSpec` planned by
//! `CrmCommands` and executed through a `ToolRunner`. Services hold the runner
//! as a trait object so tests can script tool output without spawning
//! anything, while `ProcessRunner` spawns the real tools with a bounded wait.

use crate::config::ToolConfig;
use crate::error::TemplateError;
use std::ffi::OsString;
use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use wait_timeout::ChildExt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: OsString,
    pub args: Vec<OsString>,
    /// Bytes written to the child's stdin before waiting.
    pub stdin: Option<Vec<u8>>,
}

impl CommandSpec {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn stdin(mut self, bytes: Vec<u8>) -> Self {
        self.stdin = Some(bytes);
        self
    }

    /// File name of the program, for messages.
    pub fn tool_name(&self) -> String {
        std::path::Path::new(&self.program)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.to_string_lossy().into_owned())
    }

    /// Arguments lossily converted, for matching in fakes and logs.
    pub fn arg_strings(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code; `None` when the child was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == Some(0)
    }

    /// Stdout of a successful run, or an `ExternalTool` error naming `tool`.
    pub fn into_stdout(self, tool: &str) -> Result<String, TemplateError> {
        if self.succeeded() {
            return Ok(self.stdout);
        }
        let code = self
            .status
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        Err(TemplateError::external(
            tool,
            format!("exit status {code}: {}", self.stderr.trim()),
        ))
    }
}

/// Synchronous execution of one external command.
pub trait ToolRunner: Send + Sync {
    fn run(&self, spec: &CommandSpec) -> Result<ToolOutput, TemplateError>;
}

/// Spawns real processes and waits at most `timeout` for them.
#[derive(Clone, Debug)]
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn timed_out(&self, tool: String) -> TemplateError {
        TemplateError::Timeout {
            tool,
            seconds: self.timeout.as_secs(),
        }
    }
}

impl ToolRunner for ProcessRunner {
    fn run(&self, spec: &CommandSpec) -> Result<ToolOutput, TemplateError> {
        let tool = spec.tool_name();
        debug!(tool = %tool, args = ?spec.arg_strings(), "invoking external tool");
        let started = Instant::now();

        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| TemplateError::external(&tool, err.to_string()))?;

        if let (Some(bytes), Some(mut stdin)) = (spec.stdin.as_ref(), child.stdin.take()) {
            let bytes = bytes.clone();
            thread::spawn(move || {
                let _ = stdin.write_all(&bytes);
            });
        }

        // Drain both pipes while waiting so a chatty child cannot block on a
        // full pipe buffer. The readers share the same deadline as the wait:
        // a grandchild holding a pipe open must not stall the caller.
        let deadline = started + self.timeout;
        let (tx, rx) = mpsc::channel();
        let mut readers = 0;
        if let Some(pipe) = child.stdout.take() {
            spawn_reader(Stream::Stdout, pipe, tx.clone());
            readers += 1;
        }
        if let Some(pipe) = child.stderr.take() {
            spawn_reader(Stream::Stderr, pipe, tx.clone());
            readers += 1;
        }
        drop(tx);

        let waited = child
            .wait_timeout(self.timeout)
            .map_err(|err| TemplateError::external(&tool, format!("waiting: {err}")));

        let status = match waited {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(self.timed_out(tool));
            }
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(err);
            }
        };

        let Some((stdout, stderr)) = drain_readers(&rx, readers, deadline) else {
            warn!(tool = %tool, "tool exited but its output pipes stayed open");
            return Err(self.timed_out(tool));
        };
        debug!(tool = %tool, status = ?status.code(), "external tool finished");

        Ok(ToolOutput {
            status: status.code(),
            stdout,
            stderr,
        })
    }
}

enum Stream {
    Stdout,
    Stderr,
}

fn spawn_reader<R: Read + Send + 'static>(
    stream: Stream,
    mut pipe: R,
    tx: mpsc::Sender<(Stream, String)>,
) {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send((stream, String::from_utf8_lossy(&buf).into_owned()));
    });
}

/// Collects `expected` reader results, or `None` once `deadline` passes.
/// Readers still blocked at that point are left detached.
fn drain_readers(
    rx: &mpsc::Receiver<(Stream, String)>,
    expected: usize,
    deadline: Instant,
) -> Option<(String, String)> {
    let mut stdout = String::new();
    let mut stderr = String::new();
    for _ in 0..expected {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok((Stream::Stdout, text)) => stdout = text,
            Ok((Stream::Stderr, text)) => stderr = text,
            Err(mpsc::RecvTimeoutError::Timeout) => return None,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
    Some((stdout, stderr))
}

/// Address of a resource agent as understood by `crm_resource`.
pub fn agent_address(class: &str, provider: &str, kind: &str) -> String {
    if provider.is_empty() {
        format!("{class}:{kind}")
    } else {
        format!("{class}:{provider}:{kind}")
    }
}

/// Plans the command lines for the cluster tools named in a `ToolConfig`.
#[derive(Clone, Debug)]
pub struct CrmCommands {
    config: ToolConfig,
}

impl CrmCommands {
    pub fn new(config: ToolConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    pub fn list_classes(&self) -> CommandSpec {
        CommandSpec::new(self.config.tool_path("crm"))
            .arg("ra")
            .arg("classes")
    }

    pub fn list_types(&self, class: Option<&str>, provider: Option<&str>) -> CommandSpec {
        let mut spec = CommandSpec::new(self.config.tool_path("crm"))
            .arg("ra")
            .arg("list");
        if let Some(class) = class {
            spec = spec.arg(class);
        }
        if let Some(provider) = provider {
            spec = spec.arg(provider);
        }
        spec
    }

    pub fn show_metadata(&self, class: &str, provider: &str, kind: &str) -> CommandSpec {
        CommandSpec::new(self.config.tool_path("crm_resource"))
            .arg("--show-metadata")
            .arg(agent_address(class, provider, kind))
    }

    /// Local query for every `kind` element carrying `id`.
    pub fn query_object(&self, kind: &str, id: &str) -> CommandSpec {
        CommandSpec::new(self.config.tool_path("cibadmin"))
            .arg("--query")
            .arg("--local")
            .arg("--xpath")
            .arg(format!("//configuration//{kind}[@id='{id}']"))
    }

    /// Whole-object replace reading the serialized node from `xml_file`.
    pub fn replace_object(&self, xml_file: &std::path::Path) -> CommandSpec {
        CommandSpec::new(self.config.tool_path("cibadmin"))
            .arg("--replace")
            .arg("--xml-file")
            .arg(xml_file.as_os_str())
    }
}
