mod state;

use analyze_client::{AnalyzeClient, ClientConfig};
use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use dom::{HtmlPage, Page};
use engine::{spawn_engine, Command, FilterEngine, Reply};
use platforms::{FetcherConfig, HtmlFetcher, HttpFetcher, PlatformRegistry};
use state::StateFile;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use url::Url;

/// listing-filter - Natural-language filters for marketplace listings
#[derive(Parser)]
#[command(name = "listing-filter")]
#[command(about = "Filter marketplace search results with natural-language criteria", long_about = None)]
struct Cli {
    /// Base URL of the analysis API
    #[arg(long, env = "ANALYZE_API_URL", default_value = "http://localhost:8000")]
    api_url: String,

    /// API key sent as X-API-Key
    #[arg(long, env = "ANALYZE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Where the last session of each site is kept
    #[arg(long, default_value = ".listing-filter.json")]
    state_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply filters to a search results page
    Apply {
        /// Address of the search results page
        #[arg(long)]
        page_url: Url,

        /// Read the page from this file instead of downloading it
        #[arg(long)]
        html: Option<PathBuf>,

        /// Filter description (repeat for several filters)
        #[arg(long = "filter", required = true)]
        filters: Vec<String>,

        /// Minimum number of matching filters to keep an item
        #[arg(long, default_value = "1")]
        min_match: usize,

        /// Maximum number of items to analyse
        #[arg(long, default_value = "20")]
        max_items: usize,
    },

    /// Show the stored session of a site
    Status {
        /// Host of the site, e.g. www.vinted.fr
        #[arg(long)]
        site: String,

        /// Recount the stored results under another threshold
        #[arg(long)]
        min_match: Option<usize>,
    },

    /// Forget the stored session of a site
    Reset {
        #[arg(long)]
        site: String,
    },

    /// Show which platform handles a page
    Vendor {
        #[arg(long)]
        page_url: Url,
    },

    /// Check that the analysis API is reachable
    Health,

    /// Check that the API key is accepted
    AuthCheck,

    /// Clear the analysis API cache
    ClearCache,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let client_config = ClientConfig {
        endpoint: cli.api_url.clone(),
        api_key: cli.api_key.clone(),
        ..ClientConfig::default()
    };

    // Dispatch to appropriate command handler
    match cli.command {
        Commands::Apply {
            page_url,
            html,
            filters,
            min_match,
            max_items,
        } => {
            handle_apply(
                client_config,
                &cli.state_file,
                page_url,
                html,
                filters,
                min_match,
                max_items,
            )
            .await?
        }
        Commands::Status { site, min_match } => handle_status(&cli.state_file, &site, min_match)?,
        Commands::Reset { site } => handle_reset(&cli.state_file, &site)?,
        Commands::Vendor { page_url } => handle_vendor(page_url).await?,
        Commands::Health => handle_health(client_config).await?,
        Commands::AuthCheck => handle_auth_check(client_config).await?,
        Commands::ClearCache => handle_clear_cache(client_config).await?,
    }

    Ok(())
}

/// Handle the 'apply' command
async fn handle_apply(
    client_config: ClientConfig,
    state_file: &Path,
    page_url: Url,
    html: Option<PathBuf>,
    filters: Vec<String>,
    min_match: usize,
    max_items: usize,
) -> Result<()> {
    let fetcher = Arc::new(HttpFetcher::new(FetcherConfig::default())?);
    let source = match html {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read page file: {}", path.display()))?,
        None => fetcher.fetch_html(&page_url).await?,
    };
    let page = HtmlPage::new(page_url.clone(), source);

    let client = AnalyzeClient::new(client_config)?;
    let engine = FilterEngine::new(PlatformRegistry::builtin()?, Arc::new(client), fetcher);
    let (handle, task) = spawn_engine(engine, page);

    let start = Instant::now();
    let reply = handle
        .send(Command::ApplyFilters {
            active_filters: filters,
            min_match,
            max_items,
        })
        .await?
        .ok_or_else(|| anyhow!("No reply to APPLY_FILTERS"))?;
    drop(handle);
    let (engine, page) = task.await.context("Engine task failed")?;

    let (matched, total) = match reply {
        Reply::Applied { matched, total, .. } => (matched, total),
        other => bail!(other.error().unwrap_or("Filtering failed").to_string()),
    };
    info!("Filtering took {:.2?}", start.elapsed());

    if let Some(session) = engine.session() {
        println!("{}", format!("{} results on {}:", session.platform, page.url()).bold().blue());
        for (rank, item) in session.items.iter().enumerate() {
            let status = if page.is_hidden(item.element) {
                "hidden".red()
            } else {
                "kept".green()
            };
            println!("{}. [{}] {}", (rank + 1).to_string().green(), status, item.url);

            let badges = item.anchor.map(|anchor| page.badges(anchor)).unwrap_or_default();
            for badge in badges {
                let line = badge.to_string();
                if badge.matched {
                    println!("     {}", line.green());
                } else {
                    println!("     {}", line.red());
                }
            }
        }
    }
    println!(
        "{} {} of {} items match at least {} filter(s)",
        "✓".green(),
        matched,
        total,
        min_match
    );

    if let Some(snapshot) = engine.session_snapshot() {
        let host = page_url
            .host_str()
            .ok_or_else(|| anyhow!("Page URL has no host: {}", page_url))?;
        let mut state = StateFile::load(state_file)?;
        state.insert(host, snapshot);
        state.save(state_file)?;
    }
    Ok(())
}

/// Handle the 'status' command
fn handle_status(state_file: &Path, site: &str, min_match: Option<usize>) -> Result<()> {
    let state = StateFile::load(state_file)?;
    let Some(snapshot) = state.get(site) else {
        println!("{} No filters applied on {}", "•".yellow(), site);
        return Ok(());
    };

    let threshold = min_match.unwrap_or(snapshot.threshold);
    let summary = snapshot.summary_at(threshold);
    println!("{}", format!("{} ({})", site, snapshot.platform).bold().blue());
    println!("{}Page: {}", "• ".green(), snapshot.page_url);
    println!("{}Filters: {}", "• ".green(), snapshot.filters.join(", "));
    println!("{}Min match: {}", "• ".cyan(), threshold);
    println!("{}Matched: {} of {}", "• ".cyan(), summary.matched, summary.total);
    Ok(())
}

/// Handle the 'reset' command
fn handle_reset(state_file: &Path, site: &str) -> Result<()> {
    let mut state = StateFile::load(state_file)?;
    if state.remove(site).is_some() {
        state.save(state_file)?;
        println!("{} Forgot the session of {}", "✓".green(), site);
    } else {
        println!("{} No session stored for {}", "•".yellow(), site);
    }
    Ok(())
}

/// Handle the 'vendor' command
async fn handle_vendor(page_url: Url) -> Result<()> {
    let fetcher = Arc::new(HttpFetcher::new(FetcherConfig::default())?);
    let client = AnalyzeClient::new(ClientConfig::default())?;
    let engine = FilterEngine::new(PlatformRegistry::builtin()?, Arc::new(client), fetcher);
    let (handle, _task) = spawn_engine(engine, HtmlPage::new(page_url.clone(), ""));

    match handle.send(Command::GetVendorInfo).await? {
        Some(Reply::Vendor { vendor, .. }) => {
            println!("{} {} ({:?} page)", "✓".green(), vendor.name.bold(), vendor.page_type);
        }
        _ => println!("{} {} is not a supported site", "✗".red(), page_url),
    }
    Ok(())
}

/// Handle the 'health' command
async fn handle_health(client_config: ClientConfig) -> Result<()> {
    let client = AnalyzeClient::new(client_config)?;
    if client.health().await? {
        println!("{} {} is reachable", "✓".green(), client.endpoint());
    } else {
        println!("{} {} is not healthy", "✗".red(), client.endpoint());
    }
    Ok(())
}

/// Handle the 'auth-check' command
async fn handle_auth_check(client_config: ClientConfig) -> Result<()> {
    let client = AnalyzeClient::new(client_config)?;
    if client.auth_check().await? {
        println!("{} API key accepted", "✓".green());
    } else {
        println!("{} API key rejected", "✗".red());
    }
    Ok(())
}

/// Handle the 'clear-cache' command
async fn handle_clear_cache(client_config: ClientConfig) -> Result<()> {
    let client = AnalyzeClient::new(client_config)?;
    let cleared = client.clear_cache().await?;
    println!("{} Cleared {} cache entries", "✓".green(), cleared);
    Ok(())
}
