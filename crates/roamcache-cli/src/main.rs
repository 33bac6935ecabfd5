//! roamcache - browse places, routes and itineraries, online or off

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod output;

/// Log file prefix inside the log directory
const LOG_FILE_PREFIX: &str = "roamcache.log";

#[derive(Parser, Debug)]
#[command(name = "roamcache")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Backend base URL (overrides the config file)
    #[arg(long, global = true, env = "ROAMCACHE_API_URL", hide_env = true)]
    pub api_url: Option<String>,

    /// Skip the reachability check and behave as if offline
    #[arg(long, global = true)]
    pub offline: bool,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Also write logs to daily files in this directory
    #[arg(long, global = true, value_name = "DIR")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in and store the token in the system keychain
    Login {
        /// Defaults to the last user who logged in
        username: Option<String>,
    },

    /// Forget the stored session and token
    Logout,

    /// Show connectivity, session, queue and cache state
    Status,

    /// List places
    Places {
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// Substring match on name, description and city
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show one place
    Place { id: i64 },

    /// Highest-rated places
    Popular {
        #[arg(long, default_value_t = roamcache_core::offline::DEFAULT_POPULAR_LIMIT)]
        limit: usize,
    },

    /// Places around a coordinate, nearest first
    Nearby {
        #[arg(allow_hyphen_values = true)]
        lat: f64,
        #[arg(allow_hyphen_values = true)]
        lng: f64,
        /// Search radius in km [default: 20]
        #[arg(long)]
        radius: Option<f64>,
    },

    /// List routes
    Routes {
        /// Only routes passing through this place
        #[arg(long)]
        place: Option<i64>,
    },

    /// Show one route
    Route { id: i64 },

    /// List saved itineraries
    Itineraries,

    /// Show one itinerary with its plan
    Itinerary { id: i64 },

    /// List favorite places
    Favorites,

    /// List visited places
    Visited,

    /// Add or remove a favorite
    #[command(subcommand)]
    Favorite(FavoriteCommands),

    /// Mark a place as visited
    Visit { place_id: i64 },

    /// Review a place
    Review {
        place_id: i64,
        /// 1 to 5
        rating: u8,
        #[arg(long)]
        comment: Option<String>,
    },

    /// Replay queued actions now if online
    Sync,

    /// Inspect the offline action queue
    #[command(subcommand)]
    Queue(QueueCommands),

    /// Inspect the cache
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Download everything for offline use (kept for 7 days)
    SaveOffline,

    /// Monitor connectivity and replay the queue on reconnect until Ctrl-C
    Watch,
}

#[derive(Subcommand, Debug)]
pub enum FavoriteCommands {
    Add { place_id: i64 },
    Remove { place_id: i64 },
}

#[derive(Subcommand, Debug)]
pub enum QueueCommands {
    /// Show pending actions
    List,
    /// Drop every pending action
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show live entries and their time left
    List,
    /// Remove every cached resource (the queue is kept)
    Clear,
}

fn init_tracing(log_dir: Option<&PathBuf>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let stderr_layer = fmt::layer().with_writer(io::stderr);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(stderr_layer)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(stderr_layer)
                .with(filter)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let log_guard = init_tracing(cli.log_file.as_ref());
    info!("roamcache starting");

    let result = run(cli).await;
    // Flush file logs before a possible exit
    drop(log_guard);

    if let Err(err) = result {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Login { ref username } => commands::login(&cli, username.as_deref()).await,
        Commands::Logout => commands::logout(),
        _ => {
            let app = commands::App::open(&cli).await?;
            commands::dispatch(&app, &cli).await
        }
    }
}
