//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use url::Url;

use storyfeed_core::{
    DEFAULT_PER_PAGE, Moderation, SweepProgress, discover_topics, enrich_tasks, scan_feeds,
};
use storyfeed_crawler::{BrowsingAgent, Fetcher, WebDriverFactory};
use storyfeed_shared::{
    AppConfig, TaskStatus, init_config, load_config, load_config_from, login_credentials,
    resolve_db_path,
};
use storyfeed_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// storyfeed: collect highly upvoted Q&A answers for editorial review.
#[derive(Parser)]
#[command(
    name = "storyfeed",
    version,
    about = "Discover, collect, and moderate highly upvoted Q&A answers.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.storyfeed/storyfeed.toml).
    #[arg(long, global = true, env = "STORYFEED_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Discover topics from the site's topic index.
    Initialize,

    /// Scroll every stored topic's feed and collect candidate answers.
    Scan {
        /// Scroll cycles per topic (defaults to `browser.scroll_cycles`).
        #[arg(long)]
        pages: Option<u32>,
    },

    /// Fetch full answer pages for collected candidates.
    Crawl {
        /// Maximum number of tasks to enrich in this run.
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Editorial review.
    Review {
        #[command(subcommand)]
        action: ReviewAction,
    },

    /// Publish approved stories.
    Publish {
        /// Task id to publish.
        #[arg(conflicts_with_all = ["from", "to"], required_unless_present = "from")]
        id: Option<String>,

        /// Start of the date range (inclusive), RFC 3339 or YYYY-MM-DD.
        #[arg(long, requires = "to")]
        from: Option<String>,

        /// End of the date range (exclusive), RFC 3339 or YYYY-MM-DD.
        #[arg(long, requires = "from")]
        to: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Review subcommands.
#[derive(Subcommand)]
pub(crate) enum ReviewAction {
    /// List tasks with a given status.
    List {
        /// default, pass, denial (or 0, 1, -1).
        #[arg(long, default_value = "default", allow_hyphen_values = true)]
        status: String,

        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = DEFAULT_PER_PAGE)]
        per_page: u32,
    },
    /// Set a task's moderation status.
    Set {
        id: String,
        /// default, pass, denial (or 0, 1, -1).
        #[arg(allow_hyphen_values = true)]
        status: String,
    },
    /// Show the story a task publishes as.
    Show { id: String },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "storyfeed=info",
        1 => "storyfeed=debug",
        _ => "storyfeed=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    if let Command::Config { action } = &cli.command {
        return match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&resolve_config(&cli)?),
        };
    }

    let config = resolve_config(&cli)?;
    match cli.command {
        Command::Initialize => cmd_initialize(&config).await,
        Command::Scan { pages } => cmd_scan(&config, pages).await,
        Command::Crawl { limit } => cmd_crawl(&config, limit).await,
        Command::Review { action } => match action {
            ReviewAction::List {
                status,
                page,
                per_page,
            } => cmd_review_list(&config, &status, page, per_page).await,
            ReviewAction::Set { id, status } => cmd_review_set(&config, &id, &status).await,
            ReviewAction::Show { id } => cmd_review_show(&config, &id).await,
        },
        Command::Publish { id, from, to } => match (id, from, to) {
            (Some(id), _, _) => cmd_publish(&config, &id).await,
            (None, Some(from), Some(to)) => cmd_publish_range(&config, &from, &to).await,
            _ => Err(eyre!("publish needs a task id or both --from and --to")),
        },
        Command::Config { .. } => Ok(()),
    }
}

fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

async fn open_storage(config: &AppConfig) -> Result<Storage> {
    let path = resolve_db_path(config)?;
    Ok(Storage::open(&path).await?)
}

async fn open_storage_readonly(config: &AppConfig) -> Result<Storage> {
    let path = resolve_db_path(config)?;
    Ok(Storage::open_readonly(&path).await?)
}

fn build_agent(config: &AppConfig) -> Result<BrowsingAgent> {
    let fetcher = Arc::new(Fetcher::new(&config.fetch)?);
    let factory = Arc::new(WebDriverFactory::new(
        &config.browser,
        &config.fetch.user_agent,
    )?);
    Ok(BrowsingAgent::new(
        factory,
        fetcher,
        &config.site,
        &config.browser,
    )?)
}

// ---------------------------------------------------------------------------
// Sweeps
// ---------------------------------------------------------------------------

async fn cmd_initialize(config: &AppConfig) -> Result<()> {
    let storage = open_storage(config).await?;
    let mut agent = build_agent(config)?;
    info!(base_url = %config.site.base_url, "discovering topics");

    let progress = CliProgress::new();
    let result = discover_topics(&agent, &storage, &progress).await;
    agent.close().await?;
    let report = result?;

    println!();
    println!("  Topics found: {}", report.topics_found);
    println!("  New topics:   {}", report.topics_inserted);
    println!("  Time:         {:.1}s", report.elapsed.as_secs_f64());
    println!();
    Ok(())
}

async fn cmd_scan(config: &AppConfig, pages: Option<u32>) -> Result<()> {
    let storage = open_storage(config).await?;
    let mut agent = build_agent(config)?;
    let pages = pages.unwrap_or(config.browser.scroll_cycles);
    let credentials = login_credentials(&config.browser);
    info!(pages, login = credentials.is_some(), "scanning topic feeds");

    let progress = CliProgress::new();
    let result = async {
        if let Some(credentials) = &credentials {
            progress.phase("Logging in");
            agent.login(credentials).await?;
        }
        scan_feeds(&mut agent, &storage, pages, &progress).await
    }
    .await;
    agent.close().await?;
    let report = result?;

    println!();
    println!("  Topics scanned: {}", report.topics_scanned);
    println!("  Topics failed:  {}", report.topics_failed);
    println!("  Items seen:     {}", report.items_seen);
    println!("  Skipped:        {}", report.items_skipped);
    println!("  New tasks:      {}", report.tasks_inserted);
    println!("  Updated tasks:  {}", report.tasks_updated);
    println!("  To enrich:      {}", report.awaiting_enrichment);
    println!("  Time:           {:.1}s", report.elapsed.as_secs_f64());
    println!();
    Ok(())
}

async fn cmd_crawl(config: &AppConfig, limit: Option<u32>) -> Result<()> {
    let storage = open_storage(config).await?;
    let fetcher = Fetcher::new(&config.fetch)?;
    let base = Url::parse(&config.site.base_url)
        .map_err(|e| eyre!("invalid base_url '{}': {e}", config.site.base_url))?;

    let progress = CliProgress::new();
    let report = enrich_tasks(
        &fetcher,
        &storage,
        &base,
        limit.unwrap_or(u32::MAX),
        &progress,
    )
    .await?;

    println!();
    println!("  Selected: {}", report.selected);
    println!("  Enriched: {}", report.enriched);
    println!("  Failed:   {}", report.failed);
    println!("  Time:     {:.1}s", report.elapsed.as_secs_f64());
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Review and publish
// ---------------------------------------------------------------------------

async fn cmd_review_list(config: &AppConfig, status: &str, page: u32, per_page: u32) -> Result<()> {
    let status: TaskStatus = status.parse()?;
    let storage = open_storage_readonly(config).await?;
    let listing = Moderation::new(&storage)
        .list(status, page, per_page)
        .await?;

    if listing.tasks.is_empty() {
        println!("No {status} tasks on page {page}.");
        return Ok(());
    }

    println!(
        "{status} tasks: page {}/{} ({} total)",
        listing.page,
        listing.page_count(),
        listing.total
    );
    println!();
    for task in &listing.tasks {
        let enriched = if task.content_html.is_some() { "*" } else { " " };
        println!(
            "{enriched} {}  {:>6}  {}  {}",
            task.id,
            task.upvote_count,
            task.date.format("%Y-%m-%d %H:%M"),
            task.question_text
        );
    }
    Ok(())
}

async fn cmd_review_set(config: &AppConfig, id: &str, status: &str) -> Result<()> {
    let status: TaskStatus = status.parse()?;
    let storage = open_storage(config).await?;
    let status = Moderation::new(&storage)
        .set_status(id, status.code())
        .await?;
    println!("Task {id} is now {status}.");
    Ok(())
}

async fn cmd_review_show(config: &AppConfig, id: &str) -> Result<()> {
    let storage = open_storage_readonly(config).await?;
    let story = Moderation::new(&storage).preview(id).await?;
    println!("{}", serde_json::to_string_pretty(&story)?);
    Ok(())
}

async fn cmd_publish(config: &AppConfig, id: &str) -> Result<()> {
    let storage = open_storage(config).await?;
    let story = Moderation::new(&storage).publish(id).await?;
    println!("Published: {}", story.title);
    Ok(())
}

async fn cmd_publish_range(config: &AppConfig, from: &str, to: &str) -> Result<()> {
    let begin = parse_date(from)?;
    let end = parse_date(to)?;
    let storage = open_storage(config).await?;
    let report = Moderation::new(&storage).publish_range(begin, end).await?;

    println!("Published {} stories.", report.published.len());
    for (id, error) in &report.failed {
        println!("  failed {id}: {error}");
    }
    if !report.failed.is_empty() {
        return Err(eyre!("{} approved tasks could not be published", report.failed.len()));
    }
    Ok(())
}

/// RFC 3339 timestamp, or a bare `YYYY-MM-DD` meaning midnight UTC.
fn parse_date(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    let day = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| eyre!("invalid date '{value}': {e}"))?;
    day.and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| eyre!("invalid date '{value}'"))
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl SweepProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn item(&self, detail: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("[{current}/{total}] {detail}"));
    }

    fn done(&self, summary: &str) {
        self.spinner.finish_and_clear();
        info!("{summary}");
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}
