//! `info` command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use contracts::PipelineBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    dispatch: DispatchInfo,
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct DispatchInfo {
    mode: String,
    batch_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    quarantine: Option<String>,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    headers: BTreeMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(&args.config).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&blueprint, args.params);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(blueprint: &PipelineBlueprint, with_params: bool) -> ConfigInfo {
    let sinks = blueprint
        .sinks
        .iter()
        .map(|s| SinkInfo {
            name: s.name.clone(),
            sink_type: s.sink_type.to_string(),
            // Sorted for stable output
            params: if with_params {
                s.params.clone().into_iter().collect()
            } else {
                BTreeMap::new()
            },
            headers: if with_params {
                s.headers.clone().into_iter().collect()
            } else {
                BTreeMap::new()
            },
        })
        .collect();

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        dispatch: DispatchInfo {
            mode: format!("{:?}", blueprint.dispatch.mode).to_lowercase(),
            batch_size: blueprint.dispatch.batch_size,
            quarantine: blueprint
                .dispatch
                .quarantine
                .as_ref()
                .map(|p| p.display().to_string()),
        },
        sinks,
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                  outflow Configuration                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("⚙️  Dispatch");
    println!("   ├─ Version: {}", info.version);
    println!("   ├─ Mode: {}", info.dispatch.mode);
    println!("   ├─ Batch size: {}", info.dispatch.batch_size);
    match &info.dispatch.quarantine {
        Some(path) => println!("   └─ Quarantine: {}", path),
        None => println!("   └─ Quarantine: (log only)"),
    }

    println!("\n📤 Sinks ({})", info.sinks.len());
    for (i, sink) in info.sinks.iter().enumerate() {
        let is_last = i == info.sinks.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!("   {} {} ({})", prefix, sink.name, sink.sink_type);

        let entries: Vec<String> = sink
            .params
            .iter()
            .map(|(k, v)| format!("{} = {}", k, v))
            .chain(sink.headers.iter().map(|(k, v)| format!("header {}: {}", k, v)))
            .collect();
        for (j, entry) in entries.iter().enumerate() {
            let entry_prefix = if j == entries.len() - 1 { "└─" } else { "├─" };
            println!("   {}  {} {}", child_prefix, entry_prefix, entry);
        }
    }

    println!();
}
