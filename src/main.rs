//! Binary entrypoint for the ctfboard CLI.
//!
//! Commands:
//! - `start` - run the HTTP server on the configured bind address
//! - `init` - create a starter `config.toml` and seed the notice board
//! - `status` - print storage statistics and in-process game counters

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;

use ctfboard::config::Config;
use ctfboard::metrics;
use ctfboard::storage::Storage;
use ctfboard::web::{self, AppState};

#[derive(Parser)]
#[command(name = "ctfboard")]
#[command(about = "A deliberately vulnerable campus board for CTF training")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the board server
    Start,
    /// Initialize a new board configuration and data directory
    Init,
    /// Show board status and statistics
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Init writes the config it would otherwise load.
    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Start => {
            let config = match pre_config {
                Some(config) => config,
                None => Config::load(&cli.config).await?,
            };
            info!("Starting ctfboard v{}", env!("CARGO_PKG_VERSION"));
            let state = AppState::new(config).await?;
            web::serve(state).await?;
        }
        Commands::Init => {
            info!("Initializing new board configuration");
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);

            let config = Config::load(&cli.config).await?;
            let mut storage = Storage::new(&config.storage.data_dir).await?;
            storage.seed_notices().await?;
            info!(
                "Initialized data directory at {} with seed notices",
                config.storage.data_dir
            );
        }
        Commands::Status => {
            let config = match pre_config {
                Some(config) => config,
                None => Config::load(&cli.config).await?,
            };
            let storage = Storage::new(&config.storage.data_dir).await?;
            let stats = storage.statistics().await?;
            println!("{} status", config.server.name);
            println!("  data dir:     {}", storage.base_dir());
            println!("  users:        {}", stats.total_users);
            println!("  notices:      {}", stats.total_notices);
            println!("  assignments:  {}", stats.total_assignments);
            let counters = metrics::level_counters_snapshot();
            if !counters.is_empty() {
                println!("  game activity (since start):");
                for (slug, counter) in counters {
                    println!(
                        "    {}: {} views, {} completions",
                        slug, counter.views, counter.completions
                    );
                }
            }
        }
    }

    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config.as_ref().and_then(|c| c.logging.file.clone());
    if let Some(path) = log_file {
        if let Ok(f) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
        {
            let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
            // When stdout is a terminal, mirror the file log to the console.
            let is_tty = atty::is(atty::Stream::Stdout);
            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());
                if let Ok(mut guard) = write_mutex.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        } else {
            builder.format(|fmt, record| {
                writeln!(
                    fmt,
                    "{} [{}] {}",
                    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                    record.level(),
                    record.args()
                )
            });
        }
    } else {
        builder.format(|fmt, record| {
            writeln!(
                fmt,
                "{} [{}] {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                record.level(),
                record.args()
            )
        });
    }
    let _ = builder.try_init();
}
