use anyhow::{Context, Result};
use clap::Parser;
use feedtoot::feed::HttpFeedSource;
use feedtoot::publish::{MastodonTransport, Visibility};
use feedtoot::{pipeline, PartialConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Upper bound for any single HTTP request, body included
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Command-line flags, each backed by an environment variable.
///
/// No `Debug` derive: the token must not end up in logs.
#[derive(Parser)]
#[command(
    name = "feedtoot",
    version,
    about = "Post new RSS/Atom feed entries to a Mastodon account"
)]
struct Args {
    /// Feed URL (http, https, file) or local path
    #[arg(long, env = "RSS_FEED", value_name = "URL|PATH")]
    rss_feed: Option<String>,

    /// Base URL of the Mastodon server
    #[arg(long, env = "API_ENDPOINT", value_name = "URL")]
    api_endpoint: Option<String>,

    /// Access token with write:statuses scope
    #[arg(long, env = "API_TOKEN", hide_env_values = true, value_name = "TOKEN")]
    api_token: Option<String>,

    /// JSON file remembering already-posted entries
    #[arg(long, env = "CACHE_FILE", value_name = "FILE")]
    cache_file: Option<PathBuf>,

    /// Maximum number of entries remembered in the cache file
    #[arg(long, env = "CACHE_LIMIT", value_name = "N")]
    cache_limit: Option<usize>,

    /// Visibility of posted statuses: public, unlisted, private or direct
    #[arg(long, env = "VISIBILITY")]
    visibility: Option<Visibility>,

    /// Optional TOML file providing defaults for the settings above
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log debug output (feed contents, server responses)
    #[arg(long, short = 'v')]
    verbose: bool,
}

impl Args {
    fn settings(&self) -> PartialConfig {
        PartialConfig {
            rss_feed: self.rss_feed.clone(),
            api_endpoint: self.api_endpoint.clone(),
            api_token: self.api_token.clone(),
            cache_file: self.cache_file.clone(),
            cache_limit: self.cache_limit,
            visibility: self.visibility,
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("feedtoot=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("feedtoot=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let file_settings = match &args.config {
        Some(path) => PartialConfig::load(path)
            .with_context(|| format!("Failed to load config file '{}'", path.display()))?,
        None => PartialConfig::default(),
    };
    let config = args
        .settings()
        .merge(file_settings)
        .into_config()
        .context("Invalid configuration")?;

    tracing::debug!(
        feed = %config.feed_location,
        endpoint = %config.api_endpoint,
        cache_file = %config.cache_file.display(),
        cache_limit = config.cache_limit,
        visibility = %config.visibility,
        "Configuration loaded"
    );

    let client = reqwest::Client::builder()
        .user_agent(concat!("feedtoot/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(10))
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;

    let source = HttpFeedSource::new(client.clone());
    let transport = MastodonTransport::new(client);

    let report = pipeline::run(&config, &source, &transport).await;
    report.log_summary();

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
