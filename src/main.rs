//! Trawl main entry point
//!
//! This is the command-line interface for the Trawl crawler.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use trawl::config::{load_config_with_hash, validate, CrawlConfig};
use trawl::output::print_statistics;
use trawl::url::normalize_absolute;
use trawl::{CrawlRequest, CrawlResult, Crawler};
use tracing_subscriber::EnvFilter;

/// Trawl: a bounded-depth web crawler with media acquisition
///
/// Trawl crawls breadth-first from a seed URL, extracts text, metadata,
/// links, images and videos, and can download media and render pages in a
/// headless browser.
#[derive(Parser, Debug)]
#[command(name = "trawl")]
#[command(version = "1.0.0")]
#[command(about = "A bounded-depth web crawler with media acquisition", long_about = None)]
struct Cli {
    /// Seed URL to start crawling from
    #[arg(value_name = "URL")]
    url: String,

    /// Path to TOML configuration file (defaults are used when omitted)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Crawl depth (clamped to the configured max-depth)
    #[arg(short, long, default_value_t = 1)]
    depth: u32,

    /// Crawl the second layer with concurrent workers
    #[arg(long)]
    parallel: bool,

    /// Number of workers for --parallel
    #[arg(short, long, default_value_t = 4, requires = "parallel")]
    workers: usize,

    /// Write the crawl result as JSON to this file
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Fetch pages through a headless browser
    #[arg(long)]
    headless_browser: bool,

    /// Download images into the configured image directory
    #[arg(long)]
    download_images: bool,

    /// Download videos into the configured video directory
    #[arg(long)]
    download_videos: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the effective settings without crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => CrawlConfig::default(),
    };

    apply_overrides(&mut config, &cli);

    if cli.dry_run {
        handle_dry_run(&config, &cli);
        return Ok(());
    }

    let result = handle_crawl(config, &cli).await?;
    print_statistics(&result);

    if let Some(path) = &cli.output {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("\nResult written to: {}", path.display());
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("trawl=info,warn"),
            1 => EnvFilter::new("trawl=debug,info"),
            2 => EnvFilter::new("trawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Command-line flags only ever switch features on
fn apply_overrides(config: &mut CrawlConfig, cli: &Cli) {
    config.use_headless_browser |= cli.headless_browser;
    config.download_images |= cli.download_images;
    config.download_videos |= cli.download_videos;
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &CrawlConfig, cli: &Cli) {
    println!("=== Trawl Dry Run ===\n");

    println!("Seed: {}", cli.url);
    println!(
        "Depth: {} (max-depth {})",
        cli.depth.min(config.max_depth),
        config.max_depth
    );
    if cli.parallel {
        println!("Mode: parallel, {} workers", cli.workers);
    } else {
        println!("Mode: sequential");
    }

    println!("\nLimits:");
    println!("  Max pages: {}", config.max_pages);
    println!("  Timeout: {:.1}s", config.timeout.as_secs_f64());
    println!("  Delay: {:.1}s", config.delay.as_secs_f64());
    println!("  User agent: {}", config.user_agent);

    println!("\nFetching:");
    println!("  Headless browser: {}", config.use_headless_browser);
    if config.use_headless_browser {
        println!("  Headless mode: {}", config.headless);
        println!("  Wait policies: {}", config.wait_policies.len());
    }
    println!("  Follow links: {}", config.follow_links);

    println!("\nDomains:");
    println!("  Allow: {:?}", config.allow_domains);
    println!("  Deny: {:?}", config.deny_domains);

    println!("\nMedia:");
    if config.download_images {
        println!("  Images -> {}", config.image_dir.display());
    }
    if config.download_videos {
        println!("  Videos -> {}", config.video_dir.display());
    }
    println!("  Platform probes: {}", config.probe_platforms);

    match dry_run_verdict(config, &cli.url) {
        Ok(seed) => println!("\n✓ Would start crawling at {}", seed),
        Err(problem) => println!("\n✗ {}", problem),
    }
}

/// Checks the effective configuration, then the seed, as a crawl would
fn dry_run_verdict(config: &CrawlConfig, seed: &str) -> Result<url::Url, String> {
    validate(config).map_err(|e| format!("Configuration is invalid: {}", e))?;
    normalize_absolute(seed).map_err(|e| format!("Seed URL is invalid: {}", e))
}

/// Handles the main crawl operation
async fn handle_crawl(config: CrawlConfig, cli: &Cli) -> anyhow::Result<CrawlResult> {
    let mut crawler = Crawler::new(config).context("invalid crawler configuration")?;
    let request = CrawlRequest::new(cli.url.clone()).depth(cli.depth);

    let result = if cli.parallel {
        crawler.crawl_parallel(request, cli.workers).await?
    } else {
        crawler.crawl(request).await?
    };

    if let Some(error) = &result.error {
        tracing::error!("Crawl ended early: {}", error);
    }

    Ok(result)
}
