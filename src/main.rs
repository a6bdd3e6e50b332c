use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use gleaner::config::Config;
use gleaner::feed::HttpFetcher;
use gleaner::ingest::{Scheduler, SchedulerExit};
use gleaner::storage::{Database, DatabaseError};
use gleaner::util::validate_feed_url;

/// Get the config directory path (~/.config/gleaner/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("gleaner"))
}

#[derive(Parser, Debug)]
#[command(name = "gleaner", about = "Periodic RSS ingestion into a deduplicated post store")]
struct Args {
    /// Config file (default: ~/.config/gleaner/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// SQLite database file, overrides `database_path`
    #[arg(long, value_name = "FILE")]
    database: Option<PathBuf>,

    /// Seconds between ticks, overrides `fetch_interval_secs`
    #[arg(long, value_name = "SECS")]
    interval: Option<u64>,

    /// Feeds per tick, overrides `concurrency`
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Subscribe a feed URL and exit
    #[arg(long, value_name = "URL")]
    add_feed: Option<String>,

    /// Display name for --add-feed (default: the URL)
    #[arg(long, requires = "add_feed")]
    name: Option<String>,

    /// Owning account for --add-feed
    #[arg(long, default_value = "local")]
    owner: String,

    /// List subscribed feeds and exit
    #[arg(long, conflicts_with = "add_feed")]
    list: bool,

    /// Run a single tick and exit
    #[arg(long, conflicts_with_all = ["add_feed", "list"])]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));

    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    if let Some(interval) = args.interval {
        config.fetch_interval_secs = interval;
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    config.validate().context("Invalid configuration")?;

    let db_path = args
        .database
        .clone()
        .unwrap_or_else(|| config.database_path_in(&config_dir));
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory {}", parent.display())
            })?;
        }
    }

    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::Locked) => {
            eprintln!(
                "Error: {} is locked. Is another gleaner instance running?",
                db_path.display()
            );
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    if let Some(url) = &args.add_feed {
        let url = validate_feed_url(url).with_context(|| format!("Rejected feed URL {}", url))?;
        let name = args.name.as_deref().unwrap_or(url.as_str());
        let id = db
            .insert_feed(url.as_str(), name, &args.owner)
            .await
            .context("Failed to add feed")?;
        println!("Subscribed feed {} ({})", id, url);
        return Ok(());
    }

    if args.list {
        let feeds = db.get_feeds().await.context("Failed to load feeds")?;
        if feeds.is_empty() {
            println!("No feeds. Add one with: gleaner --add-feed URL [--name NAME]");
        }
        for feed in feeds {
            let posts = db
                .count_posts_for_feed(feed.id)
                .await
                .with_context(|| format!("Failed to count posts for feed {}", feed.id))?;
            let fetched = feed
                .last_fetched()
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_else(|| "never".to_string());
            println!(
                "{:>5}  {:<30}  {:>6} posts  last fetched {}  {}",
                feed.id, feed.name, posts, fetched, feed.url
            );
        }
        return Ok(());
    }

    let fetcher =
        HttpFetcher::new(config.request_timeout()).context("Failed to build HTTP client")?;
    let scheduler = Scheduler::new(
        Arc::new(db),
        Arc::new(fetcher),
        config.scheduler_config()?,
    );

    if args.once {
        let report = scheduler.run_tick().await;
        if report.skipped {
            anyhow::bail!("Could not select feeds to fetch");
        }
        println!(
            "Fetched {} feeds ({} failed), {} new posts",
            report.dispatched(),
            report.failed(),
            report.posts_created()
        );
        return Ok(());
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c, shutting down");
        }
        tracing::info!("Shutdown requested, waiting for the current batch to finish");
    };

    match scheduler
        .spawn()
        .run_until(shutdown)
        .await
        .context("Scheduler task panicked")?
    {
        SchedulerExit::Stopped => Ok(()),
        SchedulerExit::Exited => anyhow::bail!("Scheduler exited unexpectedly"),
    }
}
