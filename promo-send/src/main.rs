//! promo-send - Background daemon for scheduled publishing
//!
//! Monitors the post queue and publishes content when its scheduled
//! time arrives.

use clap::Parser;
use libpromocast::{Config, Database, Dispatcher, PublisherRegistry, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "promo-send")]
#[command(version)]
#[command(about = "Background daemon for scheduled publishing")]
#[command(long_about = "\
promo-send - Background daemon for scheduled publishing

DESCRIPTION:
    promo-send is a long-running daemon that monitors the Promocast queue
    and publishes scheduled posts when their time arrives.

    It polls the database at regular intervals, claims each due post so
    concurrent daemons never publish the same post twice, dispatches it
    through the platform publisher, and records the outcome.

USAGE:
    # Run in foreground (logs to stderr)
    promo-send

    # Run with custom poll interval
    promo-send --poll-interval 30

    # Enable verbose logging
    promo-send --verbose

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current batch)

CONFIGURATION:
    Configuration file: ~/.config/promocast/config.toml
    Database location: ~/.local/share/promocast/promocast.db

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error

For more information, visit: https://github.com/promocast/promocast
")]
struct Cli {
    /// Poll interval in seconds
    #[arg(long, value_name = "SECONDS")]
    #[arg(help = "How often to check for due posts (default: 60)")]
    poll_interval: Option<u64>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    #[arg(help = "Enable verbose logging (useful for debugging)")]
    verbose: bool,

    /// Run once and exit (for testing)
    #[arg(long, hide = true)]
    #[arg(help = "Process due posts once and exit (for testing)")]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    libpromocast::logging::init_cli(cli.verbose, "info");

    let config = Config::load()?;
    let db = Database::new(&config.database.path).await?;
    let registry = PublisherRegistry::with_defaults(&config)?;
    let dispatcher = Dispatcher::new(db, registry);

    info!("promo-send daemon starting");

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    let poll_interval = cli.poll_interval.unwrap_or(60);
    info!("Poll interval: {}s", poll_interval);

    if cli.once {
        process_due_posts(&dispatcher).await?;
        info!("promo-send: processed posts once, exiting");
    } else {
        run_daemon_loop(&dispatcher, poll_interval, shutdown).await?;
    }

    info!("promo-send daemon stopped");
    Ok(())
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).map_err(|e| {
        libpromocast::PromocastError::InvalidInput(format!("Signal setup failed: {}", e))
    })?;

    // Spawn thread to handle signals
    let shutdown_clone = shutdown.clone();
    std::thread::spawn(move || {
        for sig in signals.forever() {
            match sig {
                SIGTERM | SIGINT => {
                    info!("Received shutdown signal, stopping gracefully...");
                    shutdown_clone.store(true, Ordering::Relaxed);
                    break;
                }
                _ => {}
            }
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(_shutdown: Arc<AtomicBool>) -> Result<()> {
    Ok(())
}

/// Main daemon loop
async fn run_daemon_loop(
    dispatcher: &Dispatcher,
    poll_interval: u64,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Shutdown requested, stopping daemon loop");
            break;
        }

        if let Err(e) = process_due_posts(dispatcher).await {
            error!("Error processing posts: {}", e);
        }

        // Sleep until next poll (check shutdown every second)
        for _ in 0..poll_interval {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            sleep(Duration::from_secs(1)).await;
        }
    }

    Ok(())
}

/// Publish every post whose scheduled time has passed
async fn process_due_posts(dispatcher: &Dispatcher) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    let results = dispatcher.publish_due(now).await?;

    for post in results {
        info!(
            post_id = post.id,
            platform = %post.platform,
            status = %post.status,
            "processed post"
        );
    }

    Ok(())
}
