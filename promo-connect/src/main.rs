//! promo-connect - Connect social platform accounts via OAuth
//!
//! Unix-style tool for managing platform connections: run the OAuth
//! authorization flow, inspect connection status, and disconnect
//! credentials.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use clap::{Parser, Subcommand};
use libpromocast::{Config, Database, OAuthManager, Platform, PromocastError, Result};

#[derive(Parser, Debug)]
#[command(name = "promo-connect")]
#[command(version)]
#[command(about = "Connect social platform accounts via OAuth")]
#[command(long_about = "\
promo-connect - Connect social platform accounts via OAuth

DESCRIPTION:
    promo-connect manages the OAuth credentials Promocast publishes with.
    The connect command walks through a full authorization flow: it prints
    the platform's authorization URL, waits for you to paste the redirect
    URL back, and stores the resulting credential.

COMMANDS:
    connect     Run the OAuth authorization flow for a platform
    status      Show connection status (one platform or all)
    disconnect  Disconnect a platform credential

USAGE EXAMPLES:
    # Connect an X account for account 1
    promo-connect connect --account 1 x

    # Show connection status for every platform
    promo-connect status --account 1

    # Disconnect facebook
    promo-connect disconnect --account 1 facebook

CONFIGURATION:
    Configuration file: ~/.config/promocast/config.toml
    Database location: ~/.local/share/promocast/promocast.db

    Override with environment variables:
        PROMOCAST_CONFIG    - Path to config file

EXIT CODES:
    0 - Success
    1 - Operation failed
    2 - OAuth or database error
    3 - Invalid input

For more information, visit: https://github.com/promocast/promocast
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    #[arg(help = "Enable verbose logging to stderr (useful for debugging)")]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the OAuth authorization flow for a platform
    Connect {
        /// Platform to connect (x, tiktok, facebook)
        platform: Platform,

        /// Account the credential belongs to
        #[arg(short, long, env = "PROMOCAST_ACCOUNT")]
        account: i64,
    },

    /// Show connection status
    Status {
        /// Platform to check; omit for all platforms
        platform: Option<Platform>,

        /// Account to check
        #[arg(short, long, env = "PROMOCAST_ACCOUNT")]
        account: i64,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Disconnect a platform credential
    Disconnect {
        /// Platform to disconnect
        platform: Platform,

        /// Account the credential belongs to
        #[arg(short, long, env = "PROMOCAST_ACCOUNT")]
        account: i64,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    libpromocast::logging::init_cli(cli.verbose, "error");

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let db = Database::new(&config.database.path).await?;
    let manager = OAuthManager::new(db, &config)?;

    match cli.command {
        Commands::Connect { platform, account } => {
            cmd_connect(&manager, account, platform).await?;
        }
        Commands::Status {
            platform,
            account,
            format,
        } => {
            cmd_status(&manager, account, platform, &format).await?;
        }
        Commands::Disconnect { platform, account } => {
            manager.disconnect(account, platform).await?;
            println!("Disconnected {} for account {}", platform, account);
        }
    }

    Ok(())
}

/// Run the interactive authorization flow: print the URL, wait for the
/// pasted redirect, complete the exchange.
async fn cmd_connect(manager: &OAuthManager, account: i64, platform: Platform) -> Result<()> {
    let url = manager.begin_authorization(account, platform)?;

    println!("Open this URL in a browser and authorize the application:");
    println!();
    println!("  {}", url);
    println!();
    print!("Paste the full redirect URL here: ");
    std::io::stdout()
        .flush()
        .map_err(|e| PromocastError::InvalidInput(format!("stdout unavailable: {}", e)))?;

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| PromocastError::InvalidInput(format!("Failed to read input: {}", e)))?;

    let (code, state, error) = parse_redirect(line.trim())?;
    let credential = manager
        .complete_authorization(platform, &code, &state, error.as_deref())
        .await?;

    println!(
        "Connected {} as @{} (account {})",
        platform, credential.handle, account
    );
    Ok(())
}

/// Pull code, state, and error out of the pasted redirect URL.
fn parse_redirect(input: &str) -> Result<(String, String, Option<String>)> {
    let url = reqwest::Url::parse(input)
        .map_err(|e| PromocastError::InvalidInput(format!("Not a valid redirect URL: {}", e)))?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.to_string()),
            "state" => state = Some(value.to_string()),
            "error" | "error_description" => error = Some(value.to_string()),
            _ => {}
        }
    }

    let state = state.ok_or_else(|| {
        PromocastError::InvalidInput("Redirect URL is missing the state parameter".to_string())
    })?;
    Ok((code.unwrap_or_default(), state, error))
}

/// Show connection status for one platform or all of them
async fn cmd_status(
    manager: &OAuthManager,
    account: i64,
    platform: Option<Platform>,
    format: &str,
) -> Result<()> {
    if format != "text" && format != "json" {
        return Err(PromocastError::InvalidInput(format!(
            "Invalid format '{}'. Must be 'text' or 'json'",
            format
        )));
    }

    // BTreeMap keyed by name for stable output ordering
    let statuses: BTreeMap<String, libpromocast::ConnectionStatus> = match platform {
        Some(p) => {
            let status = manager.status(account, p).await?;
            BTreeMap::from([(p.to_string(), status)])
        }
        None => manager
            .status_all(account)
            .await?
            .into_iter()
            .map(|(p, s)| (p.to_string(), s))
            .collect(),
    };

    if format == "json" {
        println!(
            "{}",
            serde_json::to_string_pretty(&statuses)
                .map_err(|e| PromocastError::InvalidInput(e.to_string()))?
        );
    } else {
        for (name, status) in &statuses {
            if status.connected {
                let handle = status.handle.as_deref().unwrap_or("unknown");
                println!("{:<12} connected (@{})", name, handle);
            } else {
                println!("{:<12} not connected", name);
            }
        }
    }

    Ok(())
}
