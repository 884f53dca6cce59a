//! Command execution for the camera trap ETL CLI
//!
//! Sets up logging, resolves the database location once, runs the pipeline
//! and prints the run report.

use crate::cli::args::Args;
use crate::config::{database_candidates, resolve_database_path};
use crate::constants::DATABASE_PATH_ENV;
use crate::processor::report::print_summary;
use crate::processor::{Pipeline, PipelineSummary};
use anyhow::Context;
use tracing::{debug, info};

/// Set up structured logging
///
/// `RUST_LOG` takes precedence; otherwise the level comes from the
/// verbose and quiet flags.
pub fn setup_logging(args: &Args) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("camera_trap_etl={}", log_level)));

    if args.quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    debug!("Logging initialized at level: {}", log_level);
}

/// Run the ETL for parsed arguments
pub fn run(args: Args) -> anyhow::Result<PipelineSummary> {
    setup_logging(&args);

    let environment = std::env::var(DATABASE_PATH_ENV).ok();
    let resolved = resolve_database_path(
        args.database.as_deref(),
        environment.as_deref(),
        &database_candidates(),
    );
    info!(
        "Using database {} ({})",
        resolved.path.display(),
        resolved.source
    );

    let pipeline = Pipeline::new(args.to_config(&resolved.path))
        .context("Invalid pipeline configuration")?;
    let summary = pipeline.run().with_context(|| {
        format!(
            "ETL of {} into {} failed",
            args.csv_path.display(),
            resolved.path.display()
        )
    })?;

    if !args.quiet {
        print_summary(&summary);
    }
    Ok(summary)
}
