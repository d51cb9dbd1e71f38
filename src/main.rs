use anyhow::{Context, Result};
use clap::Parser;
use reqwest::redirect::Policy;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;

use newsroll::config::Config;
use newsroll::loader::{FeedLoader, LoaderConfig, TriggerOutcome};
use newsroll::render::HtmlContainer;
use newsroll::storage::{Database, DatabaseError, KeyValueStore};
use newsroll::trigger::{run_triggers, ScrollPosition, TriggerSettings};

/// Get the config directory path (~/.config/newsroll/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("newsroll"))
}

#[derive(Parser, Debug)]
#[command(
    name = "newsroll",
    about = "Incremental news loader: pages two news APIs into one de-duplicated HTML feed"
)]
struct Args {
    /// Config file (default: ~/.config/newsroll/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write the rendered page here instead of stdout
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Extra pages to load after the first (default: until both sources run dry)
    #[arg(long, value_name = "N")]
    pages: Option<usize>,

    /// Read stdin; every line is a scroll to the bottom of the page
    #[arg(long, conflicts_with = "pages")]
    interactive: bool,

    /// Drop cached API responses before loading
    #[arg(long)]
    clear_cache: bool,
}

/// Follow at most 3 redirects and refuse loops.
///
/// Hops are logged without their query string, which carries the API key.
fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= 3 {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev.as_str() == url.as_str()) {
            return attempt.error("Redirect loop detected");
        }

        tracing::debug!(
            host = %url.host_str().unwrap_or(""),
            path = %url.path(),
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );
        attempt.follow()
    })
}

fn build_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .redirect(create_redirect_policy())
        .pool_max_idle_per_host(2)
        .pool_idle_timeout(std::time::Duration::from_secs(30))
        .tcp_keepalive(std::time::Duration::from_secs(60))
        .build()
        .context("Failed to build HTTP client")
}

/// Create the config directory user-only if it does not exist yet.
fn ensure_config_dir(config_dir: &Path) -> Result<()> {
    if !config_dir.exists() {
        std::fs::create_dir_all(config_dir).context("Failed to create config directory")?;
        tracing::info!(path = %config_dir.display(), "Created config directory");
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o700);
        if let Err(e) = std::fs::set_permissions(config_dir, perms) {
            tracing::warn!(
                path = %config_dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }
    Ok(())
}

async fn open_cache_db(path: &Path) -> Result<Database> {
    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    match Database::open(path_str).await {
        Ok(db) => Ok(db),
        Err(DatabaseError::InstanceLocked) => {
            anyhow::bail!("Another newsroll process holds the cache database. Close it and try again.")
        }
        Err(e) => Err(anyhow::anyhow!("Failed to open cache database: {}", e)),
    }
}

async fn clear_cache(db: &Database, loader_config: &LoaderConfig) -> Result<()> {
    for key in [&loader_config.primary.cache_key, &loader_config.secondary.cache_key] {
        db.remove(key)
            .await
            .with_context(|| format!("Failed to clear cache entry '{}'", key))?;
    }
    tracing::info!("Response cache cleared");
    Ok(())
}

/// Trigger `extra` more pages (or until exhausted) after the start-up page.
async fn load_pages(loader: &FeedLoader<Database, HtmlContainer>, extra: Option<usize>) -> usize {
    let mut fired = 0;
    loop {
        if extra.is_some_and(|n| fired > n) {
            break;
        }
        fired += 1;
        match loader.on_trigger().await {
            TriggerOutcome::Exhausted => break,
            // A failed page is not retried here; it would fail the same way.
            TriggerOutcome::Failed(_) => break,
            TriggerOutcome::Rendered { .. } | TriggerOutcome::Busy(_) => {}
        }
        if loader.is_exhausted() {
            break;
        }
    }
    fired
}

/// Feed stdin lines to the trigger loop as scroll-to-bottom events.
async fn load_interactive(
    loader: &FeedLoader<Database, HtmlContainer>,
    settings: TriggerSettings,
) -> usize {
    let (tx, rx) = mpsc::channel::<ScrollPosition>(32);

    let reader = async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(_)) => {
                    if tx.send(ScrollPosition::at_bottom(10_000, 800)).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read stdin");
                    break;
                }
            }
        }
    };

    let run = run_triggers(loader, rx, settings);
    tokio::pin!(run);

    // Closing stdin drops the sender, which lets the trigger loop wind down.
    tokio::select! {
        fired = &mut run => fired,
        () = reader => run.await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    ensure_config_dir(&config_dir)?;

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    let loader_config = config.loader_config().context("Invalid source configuration")?;
    if loader_config.api_key.is_none() {
        tracing::warn!("No API key configured; set NEWSROLL_API_KEY or api_key in config.toml");
    }

    let db = open_cache_db(&config_dir.join("cache.db")).await?;
    if args.clear_cache {
        clear_cache(&db, &loader_config).await?;
    }

    let trigger_settings = TriggerSettings {
        debounce: config.debounce(),
        threshold: config.scroll_threshold,
    };
    let loader = FeedLoader::new(build_http_client()?, loader_config, db, HtmlContainer::new());

    let fired = if args.interactive {
        load_interactive(&loader, trigger_settings).await
    } else {
        load_pages(&loader, args.pages).await
    };
    tracing::info!(
        triggers = fired,
        items = loader.rendered_count(),
        exhausted = loader.is_exhausted(),
        "Loading finished"
    );

    let document = loader.sink().to_document("Latest News");
    match &args.output {
        Some(path) => {
            std::fs::write(path, document)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Wrote {} items to {}", loader.rendered_count(), path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(document.as_bytes())
                .context("Failed to write page to stdout")?;
        }
    }

    Ok(())
}
