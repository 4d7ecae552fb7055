//! Argument parsing and the single-invocation flow.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use seqtrack_config::{LogFormatSetting, RawSettings, TrackerConfig, defaults};
use seqtrack_fsops::{
    AcquisitionService, CommandNotifier, DelimitedManifestDecoder, InvocationOutcome,
    LogNotifier, Notification, Notifier, deliver,
};
use seqtrack_telemetry::{
    InvocationContextGuard, LogFormat, LoggingConfig, init_logging, record_outcome,
};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::{CliError, CliResult};

const DEFAULT_CONFIG_PATH: &str = "seqtrack.conf";

#[derive(Parser, Debug)]
#[command(
    name = "seqtrack",
    version,
    about = "Record an arrived acquisition file and finalize its batch once complete"
)]
struct Cli {
    /// File that has just been written into a batch directory.
    #[arg(value_name = "TRIGGER")]
    trigger: PathBuf,
    /// Path to the `key = value` configuration file.
    #[arg(long, env = "SEQTRACK_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Semicolon-separated sample names used instead of the batch manifest.
    #[arg(long, value_name = "SAMPLES")]
    mock_samples: Option<String>,
    /// Enable debug logging and dump the effective configuration.
    #[arg(long)]
    debug: bool,
}

/// Parses CLI arguments, handles one triggering file, and returns the process
/// exit code.
#[must_use]
pub fn run() -> i32 {
    let cli = Cli::parse();
    let invocation_id = Uuid::new_v4().to_string();

    let config = match load_config(&cli).map_err(CliError::configuration) {
        Ok(config) => config,
        Err(err) => return report_startup_failure(&cli, &err),
    };
    install_logging(&config);

    let _context = InvocationContextGuard::new(invocation_id, cli.trigger.display().to_string());
    match execute(&cli.trigger, &config) {
        Ok(outcome) => {
            record_outcome(outcome.label());
            info!(outcome = outcome.label(), "invocation complete");
            0
        }
        Err(err) => {
            let exit_code = err.exit_code();
            let message = err.display_message();
            record_outcome("error");
            error!(class = err.class_label(), exit_code, error = %message, "invocation failed");
            eprintln!("error: {message}");
            exit_code
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<TrackerConfig> {
    let mut raw = RawSettings::load(&cli.config)
        .with_context(|| format!("failed to read configuration {}", cli.config.display()))?;
    if let Some(samples) = &cli.mock_samples {
        raw.set(defaults::MOCK_SAMPLES, samples.as_str());
    }
    if cli.debug {
        raw.set(defaults::DEBUG, "true");
    }
    TrackerConfig::from_raw(&raw)
        .with_context(|| format!("invalid configuration in {}", cli.config.display()))
}

/// Configuration is unavailable, so logging falls back to defaults and the
/// notification goes to the log.
fn report_startup_failure(cli: &Cli, err: &CliError) -> i32 {
    install(&LoggingConfig::default().with_debug(cli.debug));
    let message = err.display_message();
    error!(
        class = err.class_label(),
        trigger = %cli.trigger.display(),
        error = %message,
        "configuration failed"
    );
    deliver(
        &LogNotifier,
        &Notification::new("Configuration error", message.clone()),
    );
    eprintln!("error: {message}");
    err.exit_code()
}

fn install_logging(config: &TrackerConfig) {
    let format = config.log_format.map_or_else(LogFormat::infer, log_format);
    let logging = LoggingConfig {
        format,
        ..LoggingConfig::default()
    };
    install(&logging.with_debug(config.debug));
}

fn install(logging: &LoggingConfig<'_>) {
    if let Err(err) = init_logging(logging) {
        eprintln!("warning: {err}");
    }
}

const fn log_format(setting: LogFormatSetting) -> LogFormat {
    match setting {
        LogFormatSetting::Json => LogFormat::Json,
        LogFormatSetting::Pretty => LogFormat::Pretty,
    }
}

fn execute(trigger: &Path, config: &TrackerConfig) -> CliResult<InvocationOutcome> {
    if config.debug {
        match serde_json::to_string(config) {
            Ok(rendered) => debug!(config = %rendered, "effective configuration"),
            Err(err) => debug!(error = %err, "failed to render configuration"),
        }
    }

    let notifier = build_notifier(config)?;
    let decoder = DelimitedManifestDecoder;
    let service = AcquisitionService::new(config, &decoder, notifier.as_ref());
    Ok(service.run(trigger)?)
}

fn build_notifier(config: &TrackerConfig) -> CliResult<Box<dyn Notifier>> {
    match config.notify_command.as_deref() {
        Some(command) => Ok(Box::new(CommandNotifier::new(command)?)),
        None => Ok(Box::new(LogNotifier)),
    }
}
