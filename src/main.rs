//! db-sampler - turns custom SQL queries into labeled metric samples.

mod cli;

use std::io::Write;
use std::sync::Arc;

use cli::{Cli, OutputFormat};
use db_sampler::collector::QueryDispatcher;
use db_sampler::config::{Config, QueryDefinition};
use db_sampler::db::{self, DataSource};
use db_sampler::error::{CollectorError, Result};
use db_sampler::logging::{default_log_path, init_file_logging, init_stderr_logging};
use db_sampler::report::TracingReporter;
use db_sampler::sink::{MetricSample, Samples};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse_args();

    match &cli.log_file {
        Some(path) => init_file_logging(&path.clone().unwrap_or_else(default_log_path)),
        None => init_stderr_logging(),
    }

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let format = cli.parse_output_format().map_err(CollectorError::config)?;

    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    cli.apply_overrides(&mut config)?;
    config.connection.apply_env_defaults();
    config.connection.validate()?;

    if config.queries.is_empty() {
        warn!("No queries configured; cycles will emit nothing");
    }

    info!("Connecting to {}", config.connection.display_string());
    let source = Arc::new(db::connect(&config.connection).await?);
    let samples = Arc::new(Samples::new());
    let dispatcher = QueryDispatcher::new(source.clone(), samples.clone(), Arc::new(TracingReporter));
    let cancel = CancellationToken::new();

    if cli.once {
        run_cycle(&dispatcher, &config.queries, &cancel, &samples, format).await?;
    } else {
        tokio::spawn({
            let cancel = cancel.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Shutting down");
                    cancel.cancel();
                }
            }
        });

        let mut ticker = tokio::time::interval(config.collector.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            run_cycle(&dispatcher, &config.queries, &cancel, &samples, format).await?;
        }
    }

    source.close().await
}

/// Runs one collection cycle and prints what it produced.
async fn run_cycle(
    dispatcher: &QueryDispatcher,
    queries: &[QueryDefinition],
    cancel: &CancellationToken,
    samples: &Samples,
    format: OutputFormat,
) -> Result<()> {
    let started = Instant::now();
    dispatcher.dispatch(queries, cancel).await;
    let collected = samples.drain();
    info!(
        queries = queries.len(),
        samples = collected.len(),
        elapsed = ?started.elapsed(),
        "Collection cycle complete"
    );
    print_samples(&collected, format)
}

fn print_samples(samples: &[MetricSample], format: OutputFormat) -> Result<()> {
    let rendered = match format {
        OutputFormat::Text => samples.iter().map(MetricSample::render).collect::<String>(),
        OutputFormat::Json => {
            let mut json = serde_json::to_string(samples)
                .map_err(|e| CollectorError::internal(format!("Failed to encode samples: {e}")))?;
            json.push('\n');
            json
        }
    };

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(rendered.as_bytes())
        .and_then(|()| stdout.flush())
        .map_err(|e| CollectorError::internal(format!("Failed to write samples: {e}")))
}
