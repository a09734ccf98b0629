//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::{DispatchConfig, PipelineBlueprint, SinkConfig};
use tracing::info;

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    // Validate config path
    if !args.config.exists() {
        return Err(CliError::config_not_found(&args.config).into());
    }

    // Load and parse configuration
    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let pipeline_config = build_pipeline_config(blueprint, args)?;

    info!(
        sink = %pipeline_config.sink.name,
        sink_type = %pipeline_config.sink.sink_type,
        mode = ?pipeline_config.dispatch.mode,
        batch_size = pipeline_config.dispatch.batch_size,
        quarantine = ?pipeline_config.dispatch.quarantine,
        "Configuration loaded"
    );

    // The pipeline watches the signal itself so the sink is closed on shutdown
    let stats = Pipeline::new(pipeline_config)
        .run(setup_shutdown_signal())
        .await
        .context("Pipeline execution failed")?;

    info!(
        records_read = stats.records_read,
        records_delivered = stats.records_delivered,
        records_failed = stats.records_failed,
        duration_secs = stats.duration.as_secs_f64(),
        throughput = format!("{:.2}", stats.throughput()),
        "Pipeline completed"
    );

    // Print detailed statistics
    stats.print_summary();

    info!("outflow finished");
    Ok(())
}

/// Select the sink and apply CLI overrides to the dispatch settings
fn build_pipeline_config(
    blueprint: PipelineBlueprint,
    args: &RunArgs,
) -> Result<PipelineConfig, CliError> {
    let sink = select_sink(&blueprint, args.sink.as_deref())?;
    let mut dispatch: DispatchConfig = blueprint.dispatch;

    // Apply CLI overrides
    if let Some(mode) = args.mode {
        info!(mode = ?mode, "Overriding dispatch mode from CLI");
        dispatch.mode = mode.into();
    }
    if let Some(batch_size) = args.batch_size {
        if batch_size == 0 {
            return Err(CliError::invalid_override("--batch-size must be > 0"));
        }
        info!(batch_size, "Overriding batch size from CLI");
        dispatch.batch_size = batch_size;
    }
    if let Some(ref quarantine) = args.quarantine {
        info!(quarantine = %quarantine.display(), "Overriding quarantine file from CLI");
        dispatch.quarantine = Some(quarantine.clone());
    }

    Ok(PipelineConfig {
        sink,
        dispatch,
        input: args.input.clone(),
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    })
}

/// Pick the named sink, or the first one when no name is given
fn select_sink(blueprint: &PipelineBlueprint, name: Option<&str>) -> Result<SinkConfig, CliError> {
    let available = || blueprint.sinks.iter().map(|s| s.name.as_str());
    match name {
        Some(name) => blueprint
            .sink(name)
            .cloned()
            .ok_or_else(|| CliError::sink_not_found(name, available())),
        None => blueprint
            .sinks
            .first()
            .cloned()
            .ok_or_else(|| CliError::sink_not_found("<first>", available())),
    }
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ModeArg;
    use contracts::{DispatchMode, SinkType};
    use std::path::PathBuf;

    fn blueprint() -> PipelineBlueprint {
        PipelineBlueprint {
            version: Default::default(),
            dispatch: DispatchConfig::default(),
            sinks: vec![
                SinkConfig::new("log", SinkType::Log),
                SinkConfig::new("devnull", SinkType::Null),
            ],
        }
    }

    fn args() -> RunArgs {
        RunArgs {
            config: PathBuf::from("outflow.toml"),
            sink: None,
            input: None,
            mode: None,
            batch_size: None,
            quarantine: None,
            metrics_port: 0,
        }
    }

    #[test]
    fn test_first_sink_by_default() {
        let config = build_pipeline_config(blueprint(), &args()).unwrap();
        assert_eq!(config.sink.name, "log");
        assert_eq!(config.dispatch.mode, DispatchMode::Single);
        assert_eq!(config.metrics_port, None);
    }

    #[test]
    fn test_overrides() {
        let args = RunArgs {
            sink: Some("devnull".into()),
            mode: Some(ModeArg::Batch),
            batch_size: Some(5),
            quarantine: Some(PathBuf::from("failed.jsonl")),
            metrics_port: 9100,
            ..args()
        };
        let config = build_pipeline_config(blueprint(), &args).unwrap();
        assert_eq!(config.sink.name, "devnull");
        assert_eq!(config.dispatch.mode, DispatchMode::Batch);
        assert_eq!(config.dispatch.batch_size, 5);
        assert_eq!(
            config.dispatch.quarantine,
            Some(PathBuf::from("failed.jsonl"))
        );
        assert_eq!(config.metrics_port, Some(9100));
    }

    #[test]
    fn test_unknown_sink() {
        let args = RunArgs {
            sink: Some("missing".into()),
            ..args()
        };
        let err = build_pipeline_config(blueprint(), &args).unwrap_err();
        assert!(err.to_string().contains("available: log, devnull"));
    }

    #[test]
    fn test_zero_batch_size_override() {
        let args = RunArgs {
            batch_size: Some(0),
            ..args()
        };
        assert!(matches!(
            build_pipeline_config(blueprint(), &args),
            Err(CliError::InvalidOverride { .. })
        ));
    }
}
