use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, info, warn};

use keyweave::config as cfg;
use keyweave::engine::Controller;
use keyweave::injector::EnigoInjector;
use keyweave::routines;

/// Keyweave CLI
#[derive(Debug, Parser)]
#[command(
    name = keyweave::PKG_NAME,
    version = keyweave::PKG_VERSION,
    about = "A cooperative scheduler for timed keyboard/mouse input routines"
)]
struct Args {
    /// Path to the JSON configuration file (optional; defaults are built in)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Prebuilt routine to run
    #[arg(long = "routine", default_value = "patrol")]
    routine: String,

    /// Delay in seconds before starting (time to focus the game window)
    #[arg(long = "delay", default_value_t = 3.0)]
    delay: f64,

    /// Enable dry-run mode (log actions instead of injecting input)
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Set log level (e.g., trace, debug, info, warn, error). Overrides RUST_LOG.
    #[arg(long = "log-level")]
    log_level: Option<String>,

    /// Print the JSON Schema for the configuration and exit
    #[arg(long = "print-schema")]
    print_schema: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Honor --log-level by initializing tracing directly at that level.
    if let Some(level) = &args.log_level {
        let level = match level.to_lowercase().as_str() {
            "trace" => tracing::Level::TRACE,
            "debug" => tracing::Level::DEBUG,
            "info" => tracing::Level::INFO,
            "warn" | "warning" => tracing::Level::WARN,
            "error" => tracing::Level::ERROR,
            _ => tracing::Level::INFO,
        };
        let _ = tracing_subscriber::fmt().with_max_level(level).try_init();
    } else {
        keyweave::init_tracing();
    }

    info!(
        version = keyweave::PKG_VERSION,
        routine = %args.routine,
        dry_run = args.dry_run,
        "Starting keyweave"
    );

    if args.print_schema {
        let schema = cfg::generate_schema();
        let json = serde_json::to_string_pretty(&schema)?;
        println!("{json}");
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => cfg::load_from_path_async(path).await?,
        None => cfg::Config::default(),
    };
    debug!(target: "keyweave", "Configuration ready");

    let injector = Arc::new(EnigoInjector::spawn(args.dry_run)?);
    let controller = Controller::new(config, injector);

    if args.delay > 0.0 {
        info!("Starting routine '{}' in {:.1}s...", args.routine, args.delay);
        tokio::time::sleep(Duration::from_secs_f64(args.delay)).await;
    }

    // Ctrl+C interrupts the routine and releases anything still held.
    tokio::select! {
        result = routines::run_by_name(&controller, &args.routine) => {
            let status = result?;
            info!(%status, "Routine finished");
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Received Ctrl+C, triggering emergency stop");
            let released = controller.emergency_stop();
            info!(released, "Emergency stop done");
        }
    }

    info!("Keyweave exited");
    Ok(())
}
