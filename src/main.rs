use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use metricwatch::config::{LoggingConfig, MetricwatchConfig};
use metricwatch::detect::ids::SequentialIds;
use metricwatch::detect::request::{Action, DetectionRequest};
use metricwatch::detect::stream::RawMetricPoint;
use metricwatch::detect::validate::{validate_pattern_rules, validate_thresholds};
use metricwatch::detect::{DetectionEngine, Sensitivity};

#[derive(Parser)]
#[command(
    name = "metricwatch",
    about = "Threshold and pattern anomaly detection for operational metrics",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Bind address (overrides server.listen_address)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Run detection over a JSON request or array of points
    Detect {
        /// Input file, or `-` for stdin
        #[arg(long, default_value = "-")]
        input: String,

        /// Action to run (overrides the action in the input)
        #[arg(long, value_parser = parse_action)]
        action: Option<Action>,

        /// Sensitivity: low, medium or high
        #[arg(long)]
        sensitivity: Option<Sensitivity>,

        /// Hours of data kept by `comprehensive`
        #[arg(long)]
        time_window: Option<u32>,
    },

    /// Validate the configured thresholds and pattern rules
    Validate,

    /// Print the effective default thresholds and pattern rules
    Defaults,
}

fn parse_action(s: &str) -> Result<Action, String> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|_| format!("unknown action '{}'", s))
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(input).with_context(|| format!("failed to read input file: {}", input))
    }
}

/// Accept either a full request object or a bare array of points.
fn parse_request(body: &str, action: Option<Action>) -> Result<DetectionRequest> {
    let value: serde_json::Value = serde_json::from_str(body).context("input is not valid JSON")?;
    let mut request = if value.is_array() {
        let data: Vec<RawMetricPoint> = serde_json::from_value(value).context("invalid metric points")?;
        let mut request = DetectionRequest::new(action.unwrap_or(Action::Comprehensive));
        request.data = data;
        request
    } else {
        serde_json::from_value(value).context("invalid detection request")?
    };
    if let Some(action) = action {
        request.action = action;
    }
    Ok(request)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config loading logs its fallbacks before the configured subscriber exists.
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    let config = tracing::subscriber::with_default(bootstrap, || {
        MetricwatchConfig::resolve(cli.config.as_deref())
    })?;
    init_tracing(&config.logging);

    match cli.command {
        Commands::Serve { bind } => {
            let mut config = config;
            if let Some(bind) = bind {
                config.server.listen_address = bind;
            }
            tracing::info!(bind = %config.server.listen_address, "Starting metricwatch daemon");
            metricwatch::serve(config).await?;
        }
        Commands::Detect {
            input,
            action,
            sensitivity,
            time_window,
        } => {
            let mut request = parse_request(&read_input(&input)?, action)?;
            if sensitivity.is_some() {
                request.sensitivity = sensitivity;
            }
            if time_window.is_some() {
                request.time_window = time_window;
            }

            let engine = DetectionEngine::new(config.detection, Arc::new(SequentialIds::new()));
            let response = engine.handle(request, chrono::Utc::now(), &CancellationToken::new())?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Validate => {
            let thresholds = validate_thresholds(&config.detection.thresholds);
            let rules = validate_pattern_rules(&config.detection.pattern_rules);

            println!(
                "thresholds:    {} accepted, {} rejected",
                thresholds.accepted.len(),
                thresholds.result.errors.len()
            );
            println!(
                "pattern rules: {} accepted, {} rejected",
                rules.accepted.len(),
                rules.result.errors.len()
            );
            for err in thresholds.result.errors.iter().chain(&rules.result.errors) {
                println!(" - {}", err);
            }
            if !thresholds.result.valid || !rules.result.valid {
                bail!("configuration contains invalid entries");
            }
            println!("configuration OK");
        }
        Commands::Defaults => {
            let engine = DetectionEngine::new(config.detection, Arc::new(SequentialIds::new()));
            let response = engine.handle(
                DetectionRequest::new(Action::Configure),
                chrono::Utc::now(),
                &CancellationToken::new(),
            )?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}
