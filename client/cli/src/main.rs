use clap::{Args, Parser, Subcommand};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod cache;
mod config;
mod favorites;
mod library;
mod links;
mod playlists;
mod reader;
mod sliders;
mod store;

use api::{ApiClient, FolderEntry, PlaylistUpdate};
use cache::{Cache, CachePurpose};
use config::Config;
use library::{MediaKind, Namespace};
use reader::{ReaderMode, ScrollLoader, SwipeWindow};
use store::LocalStore;

#[derive(Parser)]
#[command(name = "kura")]
#[command(about = "Kura media server client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// A library: source key plus manga root folder
#[derive(Args)]
struct Library {
    /// Source key (ROOT_*, V_* or M_*)
    key: String,
    /// Root folder (manga only)
    #[arg(long)]
    root: Option<String>,
}

impl Library {
    fn namespace(&self) -> anyhow::Result<Namespace> {
        Namespace::new(&self.key, self.root.as_deref())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show or change client settings
    Config {
        /// Server URL
        #[arg(long)]
        server: Option<String>,
        /// Images per reader page
        #[arg(long)]
        page_size: Option<usize>,
        /// Images per scroll batch
        #[arg(long)]
        batch_size: Option<usize>,
        /// Slides kept around the current one in swipe mode
        #[arg(long)]
        swipe_radius: Option<usize>,
    },
    /// Show server name and version
    Info,
    /// List content sources
    Sources,
    /// List root folders of a manga source
    Roots {
        /// Manga source key
        key: String,
    },
    /// List a folder
    Ls {
        #[command(flatten)]
        library: Library,
        /// Folder path (top level when omitted)
        #[arg(default_value = "")]
        path: String,
        /// Ignore the cached listing
        #[arg(long)]
        refresh: bool,
    },
    /// Random picks
    Random {
        #[command(flatten)]
        library: Library,
        #[arg(long)]
        refresh: bool,
    },
    /// Most viewed
    Top {
        #[command(flatten)]
        library: Library,
        #[arg(long)]
        refresh: bool,
    },
    /// Recently opened
    Recent {
        #[command(flatten)]
        library: Library,
        /// Forget the list
        #[arg(long)]
        clear: bool,
    },
    /// Favorites
    Favorites {
        #[command(flatten)]
        library: Library,
    },
    /// Search names
    Search {
        #[command(flatten)]
        library: Library,
        query: String,
    },
    /// Mark an entry as favorite
    Fav {
        #[command(flatten)]
        library: Library,
        path: String,
        /// Remove the mark instead
        #[arg(long)]
        off: bool,
    },
    /// Open an entry: count a view, remember it and print its URL
    Open {
        #[command(flatten)]
        library: Library,
        path: String,
    },
    /// Page through a manga folder
    Read {
        #[command(flatten)]
        library: Library,
        path: String,
        /// Page number, starting at 0
        #[arg(long, default_value_t = 0)]
        page: usize,
        #[arg(long, value_enum, default_value_t = ReaderMode::Scroll)]
        mode: ReaderMode,
        /// Current slide within the page (swipe mode)
        #[arg(long, default_value_t = 0)]
        slide: usize,
    },
    /// Print a web link to a folder
    Link {
        #[command(flatten)]
        library: Library,
        #[arg(default_value = "")]
        path: String,
    },
    /// List the folder a web link points to
    Goto {
        url: String,
        #[arg(long)]
        refresh: bool,
    },
    /// Index a library on the server
    Scan {
        #[command(flatten)]
        library: Library,
    },
    /// Music playlists
    Playlist {
        #[command(subcommand)]
        command: PlaylistCommands,
    },
    /// Local cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand)]
enum PlaylistCommands {
    /// List playlists of a music source
    List { key: String },
    /// Show a playlist's tracks
    Show { id: i64 },
    /// Create a playlist
    Create {
        key: String,
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Rename or describe a playlist
    Edit {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a playlist
    Delete { key: String, id: i64 },
    /// Add a track
    Add { key: String, id: i64, path: String },
    /// Remove a track
    Remove { key: String, id: i64, path: String },
    /// Playlists containing a track
    Containing {
        key: String,
        path: String,
        #[arg(long)]
        refresh: bool,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Drop cached snapshots, everything when no key is given
    Clear {
        key: Option<String>,
        #[arg(long)]
        root: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kura=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load()?;
    let api = ApiClient::new(config.server_url());
    let cache = Cache::new(LocalStore::open(&Config::cache_path()?)?);

    match cli.command {
        Commands::Config {
            server,
            page_size,
            batch_size,
            swipe_radius,
        } => {
            configure(config, server, page_size, batch_size, swipe_radius)?;
        }
        Commands::Info => {
            let info = api.get_server_info().await?;
            println!("{} {} ({})", info.name, info.version, api.base_url());
        }
        Commands::Sources => {
            let sources = api.sources().await?;
            for source in sources
                .manga
                .iter()
                .chain(&sources.movie)
                .chain(&sources.music)
            {
                println!("{:<6} {}", source.kind, source.key);
            }
        }
        Commands::Roots { key } => {
            for root in api.manga_roots(&key).await? {
                println!("{}", root);
            }
        }
        Commands::Ls {
            library,
            path,
            refresh,
        } => {
            let ns = library.namespace()?;
            let entries = list_folder(&api, &cache, &ns, &path, refresh).await?;
            print_entries(&entries);
        }
        Commands::Random { library, refresh } => {
            let ns = library.namespace()?;
            let entries = sliders::random(&api, &cache, &ns, refresh).await?;
            print_snapshot_age(&cache, &ns, CachePurpose::Random)?;
            print_entries(&entries);
        }
        Commands::Top { library, refresh } => {
            let ns = library.namespace()?;
            let entries = sliders::top(&api, &cache, &ns, refresh).await?;
            print_snapshot_age(&cache, &ns, CachePurpose::Top)?;
            print_entries(&entries);
        }
        Commands::Recent { library, clear } => {
            let ns = library.namespace()?;
            if clear {
                sliders::clear_recent(&cache, &ns)?;
                println!("recent list cleared");
            } else {
                print_entries(&sliders::recent(&cache, &ns)?);
            }
        }
        Commands::Favorites { library } => {
            let ns = library.namespace()?;
            print_entries(&api.favorites(&ns).await?);
        }
        Commands::Search { library, query } => {
            let ns = library.namespace()?;
            print_entries(&api.search(&ns, &query).await?);
        }
        Commands::Fav { library, path, off } => {
            let ns = library.namespace()?;
            let value = !off;
            let changed = favorites::toggle_favorite(&api, &cache, &ns, &path, value).await?;
            let state = if value { "favorite" } else { "not favorite" };
            println!("{}: {} ({} cached lists updated)", path, state, changed);
        }
        Commands::Open { library, path } => {
            let ns = library.namespace()?;
            open_entry(&api, &cache, &ns, &path).await?;
        }
        Commands::Read {
            library,
            path,
            page,
            mode,
            slide,
        } => {
            let ns = library.namespace()?;
            if ns.kind != MediaKind::Manga {
                anyhow::bail!("only manga sources can be read page by page");
            }
            read_manga(&api, &cache, &config, &ns, &path, page, mode, slide).await?;
        }
        Commands::Link { library, path } => {
            let ns = library.namespace()?;
            println!("{}", links::deep_link(config.server_url(), &ns, &path)?);
        }
        Commands::Goto { url, refresh } => {
            let (ns, path) = links::parse_deep_link(&url)?;
            let entries = list_folder(&api, &cache, &ns, &path, refresh).await?;
            print_entries(&entries);
        }
        Commands::Scan { library } => {
            let ns = library.namespace()?;
            scan(&api, &cache, &ns).await?;
        }
        Commands::Playlist { command } => {
            playlist_command(&api, &cache, command).await?;
        }
        Commands::Cache { command } => match command {
            CacheCommands::Clear { key, root } => {
                let prefix = match key {
                    Some(key) => cache::namespace_prefix(&Namespace::new(&key, root.as_deref())?),
                    None => String::new(),
                };
                let removed = cache.clear(&prefix)?;
                println!("removed {} cached entries", removed);
            }
        },
    }

    Ok(())
}

fn configure(
    mut config: Config,
    server: Option<String>,
    page_size: Option<usize>,
    batch_size: Option<usize>,
    swipe_radius: Option<usize>,
) -> anyhow::Result<()> {
    let changing = server.is_some()
        || page_size.is_some()
        || batch_size.is_some()
        || swipe_radius.is_some();

    if changing {
        if let Some(server) = server {
            config.server_url = Some(server.trim_end_matches('/').to_string());
        }
        config.page_size = page_size.or(config.page_size);
        config.batch_size = batch_size.or(config.batch_size);
        config.swipe_radius = swipe_radius.or(config.swipe_radius);
        config.save()?;
    }

    println!("server:       {}", config.server_url());
    println!("page size:    {}", config.page_size());
    println!("batch size:   {}", config.batch_size());
    println!("swipe radius: {}", config.swipe_radius());
    println!("config file:  {}", Config::config_path()?.display());
    Ok(())
}

async fn list_folder(
    api: &ApiClient,
    cache: &Cache,
    ns: &Namespace,
    path: &str,
    refresh: bool,
) -> anyhow::Result<Vec<FolderEntry>> {
    let path = path.trim_matches('/');
    let key = cache::key(ns, CachePurpose::Folder, Some(path));
    cache
        .get_or_fetch(&key, CachePurpose::Folder, refresh, move || async move {
            Ok(api.list_folder(ns, path).await?)
        })
        .await
}

/// Entry for `path`, looked up in its parent's listing
async fn find_entry(
    api: &ApiClient,
    cache: &Cache,
    ns: &Namespace,
    path: &str,
) -> anyhow::Result<FolderEntry> {
    let path = path.trim_matches('/');
    let parent = path.rsplit_once('/').map_or("", |(parent, _)| parent);
    let listing = list_folder(api, cache, ns, parent, false).await?;
    listing
        .into_iter()
        .find(|e| e.path == path)
        .ok_or_else(|| anyhow::anyhow!("not found: {}", path))
}

/// Count a view and put the entry on the recent list
async fn record_open(
    api: &ApiClient,
    cache: &Cache,
    ns: &Namespace,
    entry: &FolderEntry,
) -> anyhow::Result<()> {
    match api.increase_view(ns, &entry.path).await {
        Ok(count) => tracing::debug!(path = %entry.path, count, "view counted"),
        Err(e) => tracing::warn!(path = %entry.path, "view not counted: {}", e),
    }
    sliders::push_recent(cache, ns, entry.clone())?;
    Ok(())
}

async fn open_entry(
    api: &ApiClient,
    cache: &Cache,
    ns: &Namespace,
    path: &str,
) -> anyhow::Result<()> {
    let entry = find_entry(api, cache, ns, path).await?;
    record_open(api, cache, ns, &entry).await?;

    if entry.is_folder() {
        println!("{}", links::deep_link(api.base_url(), ns, &entry.path)?);
        if let Some(thumbnail) = &entry.thumbnail {
            println!("cover: {}", api.absolute(thumbnail));
        }
    } else {
        println!("{}", links::media_url(api.base_url(), ns, &entry.path)?);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn read_manga(
    api: &ApiClient,
    cache: &Cache,
    config: &Config,
    ns: &Namespace,
    path: &str,
    page: usize,
    mode: ReaderMode,
    slide: usize,
) -> anyhow::Result<()> {
    let path = path.trim_matches('/');
    let images = api.manga_images(ns, path).await?;
    if images.is_empty() {
        println!("no images in {}", path);
        return Ok(());
    }

    if !path.is_empty() {
        let entry = find_entry(api, cache, ns, path).await?;
        record_open(api, cache, ns, &entry).await?;
    }

    let per_page = config.page_size();
    let pages = reader::total_pages(images.len(), per_page);

    match mode {
        ReaderMode::Scroll => {
            let current = reader::paginate(&images, page, per_page);
            if current.is_empty() {
                anyhow::bail!("page {} out of range (0..{})", page, pages);
            }
            println!("page {}/{} ({} images)", page + 1, pages, current.len());
            let mut loader = ScrollLoader::new(current.len(), config.batch_size());
            while !loader.is_done() {
                let Some(range) = loader.next_batch() else {
                    break;
                };
                for (i, url) in current[range.clone()].iter().enumerate() {
                    println!("{:>4}  {}", range.start + i, api.absolute(url));
                }
                println!("-- loaded {}/{}", loader.loaded(), current.len());
            }
        }
        ReaderMode::Swipe => {
            let window = SwipeWindow::new(images.len(), per_page, config.swipe_radius())
                .at(page, slide);
            let current = reader::paginate(&images, window.page(), per_page);
            println!(
                "page {}/{} slide {}/{} (image {} of {})",
                window.page() + 1,
                pages,
                window.index() + 1,
                window.page_len(),
                window.global_index() + 1,
                images.len()
            );
            for (i, url) in current.iter().enumerate() {
                if !window.is_materialized(i) {
                    continue;
                }
                let marker = if i == window.index() { ">" } else { " " };
                println!("{} {:>4}  {}", marker, i, api.absolute(url));
            }

            let mut next = window.clone();
            if next.next_slide() {
                println!("next: --page {} --slide {}", next.page(), next.index());
            }
            let mut prev = window;
            if prev.prev_slide() {
                println!("prev: --page {} --slide {}", prev.page(), prev.index());
            }
        }
    }
    Ok(())
}

async fn scan(api: &ApiClient, cache: &Cache, ns: &Namespace) -> anyhow::Result<()> {
    let mut job = api.start_scan(&ns.source, &ns.root).await?;

    let spinner = indicatif::ProgressBar::new_spinner();
    spinner.set_style(
        indicatif::ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
            .unwrap_or_else(|_| indicatif::ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("scanning {} {}", job.source_key, job.root_folder));
    spinner.enable_steady_tick(Duration::from_millis(120));

    while job.is_running() {
        tokio::time::sleep(Duration::from_millis(500)).await;
        job = api.get_scan(&job.id).await?;
    }

    match job.state.as_str() {
        "done" => {
            spinner.finish_with_message(format!(
                "{} indexed, {} removed",
                job.indexed.unwrap_or(0),
                job.pruned.unwrap_or(0)
            ));
            // Listings may have changed
            let prefix = cache::key(ns, CachePurpose::Folder, None);
            cache.clear(&prefix)?;
            Ok(())
        }
        _ => {
            spinner.abandon_with_message("scan failed");
            anyhow::bail!(
                "scan failed: {}",
                job.message.unwrap_or_else(|| "unknown error".to_string())
            )
        }
    }
}

async fn playlist_command(
    api: &ApiClient,
    cache: &Cache,
    command: PlaylistCommands,
) -> anyhow::Result<()> {
    match command {
        PlaylistCommands::List { key } => {
            let list = api.list_playlists(&key).await?;
            if list.is_empty() {
                println!("no playlists");
            }
            for p in list {
                let updated = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(p.updated_at)
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                match &p.description {
                    Some(d) => println!("{:>4}  {}  ({}) {}", p.id, p.name, updated, d),
                    None => println!("{:>4}  {}  ({})", p.id, p.name, updated),
                }
            }
        }
        PlaylistCommands::Show { id } => {
            let playlist = api.get_playlist(id).await?;
            println!("{} [{}]", playlist.name, playlist.key);
            if let Some(description) = &playlist.description {
                println!("{}", description);
            }
            for (i, track) in playlist.tracks.iter().enumerate() {
                println!("{:>4}  {}", i + 1, track);
            }
        }
        PlaylistCommands::Create {
            key,
            name,
            description,
        } => {
            let playlist = api
                .create_playlist(&key, &name, description.as_deref())
                .await?;
            println!("created playlist {} ({})", playlist.id, playlist.name);
        }
        PlaylistCommands::Edit {
            id,
            name,
            description,
        } => {
            let playlist = api
                .update_playlist(
                    id,
                    &PlaylistUpdate {
                        name,
                        description,
                        tracks: None,
                    },
                )
                .await?;
            println!("updated playlist {} ({})", playlist.id, playlist.name);
        }
        PlaylistCommands::Delete { key, id } => {
            let ns = Namespace::new(&key, None)?;
            playlists::delete_playlist(api, cache, &ns, id).await?;
            println!("deleted playlist {}", id);
        }
        PlaylistCommands::Add { key, id, path } => {
            let ns = Namespace::new(&key, None)?;
            if playlists::add_track(api, cache, &ns, id, &path).await? {
                println!("added {}", path);
            } else {
                println!("already in playlist");
            }
        }
        PlaylistCommands::Remove { key, id, path } => {
            let ns = Namespace::new(&key, None)?;
            if playlists::remove_track(api, cache, &ns, id, &path).await? {
                println!("removed {}", path);
            } else {
                println!("not in playlist");
            }
        }
        PlaylistCommands::Containing { key, path, refresh } => {
            let ns = Namespace::new(&key, None)?;
            let ids = playlists::membership(api, cache, &ns, &path, refresh).await?;
            if ids.is_empty() {
                println!("in no playlist");
            }
            for id in ids {
                println!("{}", id);
            }
        }
    }
    Ok(())
}

fn print_snapshot_age(cache: &Cache, ns: &Namespace, purpose: CachePurpose) -> anyhow::Result<()> {
    let key = cache::key(ns, purpose, None);
    if let Some(minutes) = sliders::snapshot_age_minutes(cache, &key, cache::now_millis())? {
        if minutes > 0 {
            println!("(cached {} min ago, --refresh to reload)", minutes);
        }
    }
    Ok(())
}

fn print_entries(entries: &[FolderEntry]) {
    if entries.is_empty() {
        println!("nothing here");
        return;
    }
    for entry in entries {
        let star = if entry.is_favorite { "*" } else { " " };
        let detail = if entry.is_folder() {
            if entry.image_count > 0 {
                format!("{} images", entry.image_count)
            } else {
                String::new()
            }
        } else {
            format_size(entry.size.max(0) as u64)
        };
        let views = if entry.view_count > 0 {
            format!("  {} views", entry.view_count)
        } else {
            String::new()
        };
        println!(
            "{} {:<6} {:>10}  {}{}",
            star, entry.kind, detail, entry.path, views
        );
    }
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
