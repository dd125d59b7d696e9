//! Kura media server (kurad)

use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod db;
mod library;

use config::Config;
use library::{scanner, MediaKind, SourceRegistry};

#[derive(Parser)]
#[command(name = "kurad")]
#[command(about = "Kura personal media server daemon", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server (runs in background)
    Serve {
        /// Run in foreground (don't daemonize)
        #[arg(long)]
        foreground: bool,
    },
    /// Stop the server
    Down,
    /// Show server status
    Status,
    /// List configured content sources
    Sources,
    /// Index a source into the database
    Scan {
        /// Source key (ROOT_*, V_* or M_*)
        key: String,
        /// Manga root folder; every root folder when omitted
        #[arg(long)]
        root: Option<String>,
    },
    /// Run database migrations
    Migrate,
    /// Forget the index (favorites, views and playlists are kept unless --all)
    Reset {
        /// Also drop favorites, view counts and playlists
        #[arg(long)]
        all: bool,
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

fn pid_file() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kurad.pid")
}

fn is_server_running() -> Option<u32> {
    let pid_path = pid_file();
    if pid_path.exists() {
        if let Ok(pid_str) = fs::read_to_string(&pid_path) {
            if let Ok(pid) = pid_str.trim().parse::<u32>() {
                // Check if process is still running
                #[cfg(unix)]
                {
                    let result = Command::new("kill")
                        .args(["-0", &pid.to_string()])
                        .stdout(Stdio::null())
                        .stderr(Stdio::null())
                        .status();
                    if result.map(|s| s.success()).unwrap_or(false) {
                        return Some(pid);
                    }
                }
                #[cfg(not(unix))]
                {
                    return Some(pid);
                }
            }
        }
        // Stale pid file, remove it
        let _ = fs::remove_file(&pid_path);
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Commands that don't need full init
    match &cli.command {
        Commands::Down => {
            return stop_server();
        }
        Commands::Status => {
            return show_status();
        }
        Commands::Serve { foreground } if !foreground => {
            return start_daemon();
        }
        _ => {}
    }

    // Initialize logging for foreground commands
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kurad=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Serve { foreground: _ } => {
            // Running in foreground mode
            run_server(config).await?;
        }
        Commands::Down => unreachable!(),
        Commands::Status => unreachable!(),
        Commands::Sources => {
            list_sources(&config);
        }
        Commands::Scan { key, root } => {
            scan_source(&config, &key, root.as_deref()).await?;
        }
        Commands::Migrate => {
            run_migrations(&config).await?;
        }
        Commands::Reset { all, force } => {
            reset_database(&config, all, force).await?;
        }
    }

    Ok(())
}

fn start_daemon() -> anyhow::Result<()> {
    // Check if already running
    if let Some(pid) = is_server_running() {
        println!("kurad already running (pid {})", pid);
        return Ok(());
    }

    // Get current executable path
    let exe = std::env::current_exe()?;

    // Spawn detached process with --foreground flag
    let child = Command::new(&exe)
        .args(["serve", "--foreground"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    let pid = child.id();

    // Save PID
    let pid_path = pid_file();
    if let Some(parent) = pid_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&pid_path, pid.to_string())?;

    // Load config to get ports
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    println!("kurad serving on localhost:{}", config.rest_port);
    println!("pid: {}", pid);

    Ok(())
}

fn stop_server() -> anyhow::Result<()> {
    if let Some(pid) = is_server_running() {
        #[cfg(unix)]
        {
            Command::new("kill").args([&pid.to_string()]).status()?;
        }
        #[cfg(not(unix))]
        {
            Command::new("taskkill")
                .args(["/PID", &pid.to_string(), "/F"])
                .status()?;
        }

        let _ = fs::remove_file(pid_file());
        println!("kurad stopped");
    } else {
        println!("kurad not running");
    }
    Ok(())
}

fn show_status() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    if let Some(pid) = is_server_running() {
        println!("kurad running");
        println!("  pid: {}", pid);
        println!("  rest: localhost:{}", config.rest_port);
        println!("  sources: {}", config.sources.len());
    } else {
        println!("kurad not running");
    }
    Ok(())
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    // Save PID for foreground mode too
    let pid_path = pid_file();
    if let Some(parent) = pid_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&pid_path, std::process::id().to_string())?;

    if config.sources.is_empty() {
        tracing::warn!("no sources configured; set ROOT_*, V_* or M_* variables");
    }
    for source in &config.sources {
        if !source.path.is_dir() {
            tracing::warn!(key = %source.key, path = %source.path.display(), "source directory missing");
        }
    }

    // Initialize database pool
    let db_pool = db::create_pool(&config.database_url).await?;

    // Auto-run migrations on startup (idempotent)
    tracing::info!("checking database migrations...");
    db::run_migrations(&db_pool).await?;

    // Create shared application state
    let app_state = api::AppState::new(db_pool, config.clone());

    // Start REST server
    let rest_addr = format!("0.0.0.0:{}", config.rest_port).parse()?;
    let rest_handle = tokio::spawn(async move {
        tracing::info!("REST listening on {}", rest_addr);
        api::rest::serve(rest_addr, app_state).await
    });

    // Wait for REST server
    rest_handle.await??;

    // Cleanup PID file
    let _ = fs::remove_file(pid_file());

    Ok(())
}

fn list_sources(config: &Config) {
    if config.sources.is_empty() {
        println!("no sources");
        return;
    }
    for source in &config.sources {
        let state = if source.path.is_dir() { "" } else { " (missing)" };
        println!(
            "{:<20} {:<6} {}{}",
            source.key,
            source.kind,
            source.path.display(),
            state
        );
    }
}

async fn scan_source(config: &Config, key: &str, root: Option<&str>) -> anyhow::Result<()> {
    let registry = SourceRegistry::new(config.sources.clone());
    let source = registry.get(key)?.clone();

    let roots = match (source.kind, root) {
        (MediaKind::Manga, Some(root)) => vec![root.to_string()],
        (MediaKind::Manga, None) => {
            let source = source.clone();
            tokio::task::spawn_blocking(move || scanner::root_folders(&source)).await??
        }
        (_, Some(_)) => anyhow::bail!("{} sources have no root folders", source.kind),
        (_, None) => vec![String::new()],
    };

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;

    for root in roots {
        let summary = library::scan_namespace(&pool, &source, &root).await?;
        let label = if root.is_empty() { "/" } else { root.as_str() };
        println!(
            "{} {}: {} indexed, {} removed",
            source.key, label, summary.indexed, summary.pruned
        );
    }

    Ok(())
}

async fn run_migrations(config: &Config) -> anyhow::Result<()> {
    println!("running migrations...");
    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    println!("migrations complete");
    Ok(())
}

async fn reset_database(config: &Config, all: bool, force: bool) -> anyhow::Result<()> {
    if !force {
        if all {
            println!("this will DELETE the index, favorites, view counts and playlists.");
        } else {
            println!("this will delete the index; it is rebuilt on next use.");
        }
        println!("type 'yes' to confirm: ");

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if input.trim() != "yes" {
            println!("aborted");
            return Ok(());
        }
    }

    println!("resetting database...");
    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;

    if all {
        sqlx::query("DELETE FROM playlists").execute(&pool).await?;
        sqlx::query("DELETE FROM entries").execute(&pool).await?;
    }
    // Listings rescan a namespace that has no scan record
    sqlx::query("DELETE FROM scans").execute(&pool).await?;

    println!("database reset complete");

    Ok(())
}
