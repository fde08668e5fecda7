use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hive_stats::config::AppConfig;
use hive_stats::fetch::AbortHandle;
use hive_stats::{parse_duration, Game, HiveClient, MonthlyLeaderboardQuery, YearMonth};

#[derive(Parser)]
#[command(name = "hive-stats")]
#[command(about = "Query player and leaderboard statistics from the Hive API")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./hive-stats.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Override the API base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Cache responses for this long (e.g., "90s", "5m")
    #[arg(long)]
    cache_ttl: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Statistics of one player in one game
    Player {
        /// Game id (wars, sky, hide, ...)
        game: Game,

        /// Username or UUID
        identifier: String,

        /// Monthly instead of all-time statistics
        #[arg(long)]
        monthly: bool,

        /// Month to query (YYYY-MM); implies --monthly
        #[arg(long)]
        month: Option<YearMonth>,
    },

    /// Leaderboard of a game
    Leaderboard {
        game: Game,

        /// Monthly instead of all-time leaderboard
        #[arg(long)]
        monthly: bool,

        /// Month to query (YYYY-MM); implies --monthly
        #[arg(long)]
        month: Option<YearMonth>,

        /// Number of entries (requires --month)
        #[arg(long, requires = "month")]
        amount: Option<u32>,

        /// Entries to skip (requires --amount)
        #[arg(long, requires = "amount")]
        skip: Option<u32>,
    },

    /// Server-wide statistics
    Server,

    /// Maps of a game
    Maps { game: Game },

    /// Metadata of a game
    Meta { game: Game },

    /// Main profile of a player
    Info {
        identifier: String,

        /// Resolve hub title names
        #[arg(long)]
        hub_titles: bool,
    },

    /// Search players by username prefix
    Search { partial: String },

    /// Print the built-in game registry
    Games,

    /// Derive leveling configs from live game metadata
    XpInfo {
        /// Games to check (all when empty)
        games: Vec<Game>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    // Initialize tracing
    let log_level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    tracing::debug!("Starting hive-stats v{}", env!("CARGO_PKG_VERSION"));

    if let Some(base_url) = cli.base_url {
        config.api.base_url = base_url;
    }
    if let Some(ttl) = cli.cache_ttl.as_deref() {
        let ttl = parse_duration(ttl)
            .with_context(|| format!("Invalid --cache-ttl '{}' (expected e.g. 90s, 5m)", ttl))?;
        config.api.cache_ttl_secs = ttl.as_secs();
    }
    config.validate()?;

    // Abort in-flight requests on Ctrl-C
    let abort = AbortHandle::new();
    let client = HiveClient::new(&config.api)?.with_signal(abort.signal());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, aborting requests");
            abort.abort();
        }
    });

    match cli.command {
        Commands::Player {
            game,
            identifier,
            monthly,
            month,
        } => {
            let stats = if monthly || month.is_some() {
                client
                    .get_monthly_player_statistics(game, &identifier, month)
                    .await?
            } else {
                client
                    .get_all_time_player_statistics(game, &identifier)
                    .await?
            };
            print_json(&stats)?;
        }

        Commands::Leaderboard {
            game,
            monthly,
            month,
            amount,
            skip,
        } => {
            let records = if monthly || month.is_some() {
                let query = month.map(|date| MonthlyLeaderboardQuery {
                    date,
                    amount,
                    skip,
                });
                client.get_monthly_leaderboard(game, query).await?
            } else {
                client.get_all_time_leaderboard(game).await?
            };
            print_json(&records)?;
        }

        Commands::Server => {
            print_json(&client.get_server_statistics().await?)?;
        }

        Commands::Maps { game } => {
            print_json(&client.get_game_maps(game).await?)?;
        }

        Commands::Meta { game } => {
            print_json(&client.get_game_metainfo(game).await?)?;
        }

        Commands::Info {
            identifier,
            hub_titles,
        } => {
            print_json(&client.get_player_info(&identifier, hub_titles).await?)?;
        }

        Commands::Search { partial } => {
            print_json(&client.search_players(&partial).await?)?;
        }

        Commands::Games => {
            let registry: Vec<_> = Game::ALL
                .iter()
                .map(|game| {
                    let info = game.info();
                    json!({
                        "id": game.id(),
                        "name": game.name(),
                        "levels": info.levels,
                        "leaderboard_epoch": info.leaderboard_epoch,
                    })
                })
                .collect();
            print_json(&registry)?;
        }

        Commands::XpInfo { games } => {
            let games = if games.is_empty() {
                Game::ALL.to_vec()
            } else {
                games
            };

            let report = client.check_leveling(&games).await;
            print_json(&report)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
