//! Command-line front end for the template engine.
//!
//! Usage:
//!   cibtemplate classes
//!   cibtemplate types --class ocf --provider heartbeat
//!   cibtemplate metadata ocf IPaddr2 --provider heartbeat
//!   cibtemplate show web-template
//!   cibtemplate render web-template
//!   cibtemplate update --file web-template.json

use anyhow::{Context, Result, bail};
use cibtemplate::schema_loader::{compile_template_schema, template_from_json};
use cibtemplate::{Resolved, Services, ToolConfig, commit, render};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "CIBTEMPLATE_LOG";

#[derive(Parser, Debug)]
#[command(name = "cibtemplate")]
#[command(about = "Inspect, render, and update cluster resource templates")]
struct Cli {
    /// Directory holding crm, crm_resource, and cibadmin.
    #[arg(long, global = true)]
    sbin_dir: Option<PathBuf>,
    /// Legacy resource directory that enables the heartbeat class.
    #[arg(long, global = true)]
    heartbeat_marker: Option<PathBuf>,
    /// Seconds to wait for any single cluster tool.
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every agent class, provider, and type as JSON.
    Classes,
    /// List agent types, optionally filtered.
    Types {
        #[arg(long)]
        class: Option<String>,
        #[arg(long, requires = "class")]
        provider: Option<String>,
    },
    /// Print an agent's parameters, actions, and meta attributes as JSON.
    Metadata {
        class: String,
        #[arg(value_name = "TYPE")]
        kind: String,
        #[arg(long, default_value = "")]
        provider: String,
    },
    /// Print a template from the live configuration as JSON.
    Show { id: String },
    /// Print the crm script line for a template.
    Render { id: String },
    /// Merge a JSON template into the existing live template.
    Update {
        #[arg(long)]
        file: PathBuf,
        /// Replacement JSON Schema for the input.
        #[arg(long)]
        schema: Option<PathBuf>,
    },
}

fn main() {
    init_logging();
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let services = Services::new(tool_config(&cli)?);

    match cli.command {
        Command::Classes => print_resolved(services.catalog.discover()),
        Command::Types { class, provider } => {
            let types = services
                .catalog
                .types(class.as_deref(), provider.as_deref())
                .context("listing agent types")?;
            for name in types {
                println!("{name}");
            }
            Ok(())
        }
        Command::Metadata {
            class,
            kind,
            provider,
        } => print_resolved(services.metadata.metadata(&class, &provider, &kind)),
        Command::Show { id } => {
            let template = services
                .load_template(&id)
                .with_context(|| format!("loading template {id}"))?;
            print_json(&template)
        }
        Command::Render { id } => {
            let template = services
                .load_template(&id)
                .with_context(|| format!("loading template {id}"))?;
            match render(&template) {
                Ok(line) => {
                    println!("{line}");
                    Ok(())
                }
                Err(errors) => bail!("cannot render {id}: {errors}"),
            }
        }
        Command::Update { file, schema } => {
            let input: Value = serde_json::from_reader(
                File::open(&file).with_context(|| format!("opening {}", file.display()))?,
            )
            .with_context(|| format!("parsing {}", file.display()))?;
            let schema = compile_template_schema(schema.as_deref())?;
            let template = template_from_json(&schema, &input)?;
            match commit(&template, &services.store) {
                Ok(_) => {
                    println!("updated {}", template.id);
                    Ok(())
                }
                Err(errors) => bail!("update of {} failed: {errors}", template.id),
            }
        }
    }
}

fn tool_config(cli: &Cli) -> Result<ToolConfig> {
    let mut config = ToolConfig::from_env()?;
    if let Some(dir) = &cli.sbin_dir {
        config = config.with_sbin_dir(dir);
    }
    if let Some(marker) = &cli.heartbeat_marker {
        config = config.with_heartbeat_marker(marker);
    }
    if let Some(secs) = cli.timeout_secs {
        config = config.with_tool_timeout(Duration::from_secs(secs));
    }
    Ok(config)
}

fn print_resolved<T: Serialize>(resolved: Resolved<T>) -> Result<()> {
    for reason in &resolved.degraded {
        eprintln!("warning: {reason}");
    }
    print_json(&resolved.value)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("serializing output")?;
    println!("{rendered}");
    Ok(())
}
