//! promo-post - Schedule and publish social posts
//!
//! Unix-style tool for the Promocast post queue: enqueue a post for a
//! platform, publish one immediately, cancel one, or inspect it.

use clap::{Parser, Subcommand};
use libpromocast::{
    Config, Database, Dispatcher, NewPost, Platform, PromocastError, PublisherRegistry, Result,
    ScheduledPost,
};

#[derive(Parser, Debug)]
#[command(name = "promo-post")]
#[command(version)]
#[command(about = "Schedule and publish social posts")]
#[command(long_about = "\
promo-post - Schedule and publish social posts

DESCRIPTION:
    promo-post manages the Promocast post queue. Posts are scheduled per
    platform and picked up by promo-send when due; publish dispatches one
    immediately instead of waiting for the daemon.

COMMANDS:
    schedule    Enqueue a post for a platform
    publish     Publish a scheduled post now
    cancel      Cancel a scheduled post
    show        Show a post

USAGE EXAMPLES:
    # Schedule a post for X, due immediately
    promo-post schedule --account 1 x \"Launch day!\"

    # Schedule for a specific time (RFC 3339 or unix timestamp)
    promo-post schedule --account 1 facebook \"Launch day!\" --at 2026-09-01T09:00:00Z

    # Attach a media asset
    promo-post schedule --account 1 facebook \"Launch day!\" --media 3

    # Publish post 7 right now
    promo-post publish 7

    # Cancel post 7
    promo-post cancel 7

CONFIGURATION:
    Configuration file: ~/.config/promocast/config.toml
    Database location: ~/.local/share/promocast/promocast.db

EXIT CODES:
    0 - Success
    1 - Operation failed
    2 - Dispatch or database error
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
    /// Enqueue a post for a platform
    Schedule {
        /// Target platform (facebook, instagram, tiktok, x, youtube, linkedin)
        platform: Platform,

        /// Post content (max 2000 characters)
        content: String,

        /// Account the post belongs to
        #[arg(short, long, env = "PROMOCAST_ACCOUNT")]
        account: i64,

        /// When to publish: RFC 3339 or unix timestamp (default: now)
        #[arg(long, value_name = "TIME")]
        at: Option<String>,

        /// Campaign the post belongs to
        #[arg(long)]
        campaign: Option<i64>,

        /// Media asset id to attach
        #[arg(long)]
        media: Option<i64>,
    },

    /// Publish a scheduled post now
    Publish {
        /// Post ID to publish
        post_id: i64,
    },

    /// Cancel a scheduled post
    Cancel {
        /// Post ID to cancel
        post_id: i64,
    },

    /// Show a post
    Show {
        /// Post ID to show
        post_id: i64,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
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

    match cli.command {
        Commands::Schedule {
            platform,
            content,
            account,
            at,
            campaign,
            media,
        } => {
            let scheduled_at = match at {
                Some(s) => parse_time(&s)?,
                None => chrono::Utc::now().timestamp(),
            };
            let post = db
                .create_post(&NewPost {
                    account_id: account,
                    campaign_id: campaign,
                    platform,
                    content,
                    media_asset_id: media,
                    scheduled_at,
                })
                .await?;
            println!("Scheduled post {} for {} at {}", post.id, platform, scheduled_at);
        }
        Commands::Publish { post_id } => {
            let registry = PublisherRegistry::with_defaults(&config)?;
            let dispatcher = Dispatcher::new(db, registry);
            let post = dispatcher.publish(post_id).await?;
            println!(
                "Published post {} to {} (external id: {})",
                post.id,
                post.platform,
                post.external_post_id.as_deref().unwrap_or("unknown")
            );
        }
        Commands::Cancel { post_id } => {
            if db.cancel_post(post_id).await? {
                println!("Canceled post {}", post_id);
            } else {
                return Err(PromocastError::InvalidInput(format!(
                    "Post {} is not in scheduled status and cannot be canceled",
                    post_id
                )));
            }
        }
        Commands::Show { post_id, format } => {
            let post = db.get_post(post_id).await?.ok_or_else(|| {
                PromocastError::InvalidInput(format!("Post {} not found", post_id))
            })?;
            print_post(&post, &format)?;
        }
    }

    Ok(())
}

/// Parse a schedule time: RFC 3339 first, plain unix timestamp second.
fn parse_time(s: &str) -> Result<i64> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Ok(dt.timestamp());
    }
    s.parse::<i64>().map_err(|_| {
        PromocastError::InvalidInput(format!(
            "Invalid time '{}'. Use RFC 3339 (2026-09-01T09:00:00Z) or a unix timestamp",
            s
        ))
    })
}

fn print_post(post: &ScheduledPost, format: &str) -> Result<()> {
    match format {
        "json" => {
            println!(
                "{}",
                serde_json::to_string_pretty(post)
                    .map_err(|e| PromocastError::InvalidInput(e.to_string()))?
            );
        }
        "text" => {
            println!("Post {}", post.id);
            println!("  platform:     {}", post.platform);
            println!("  status:       {}", post.status);
            println!("  scheduled at: {}", post.scheduled_at);
            if let Some(external) = &post.external_post_id {
                println!("  external id:  {}", external);
            }
            println!("  content:      {}", post.content);
        }
        _ => {
            return Err(PromocastError::InvalidInput(format!(
                "Invalid format '{}'. Must be 'text' or 'json'",
                format
            )));
        }
    }
    Ok(())
}
