//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use pagesmith_core::{
    BatchReport, ConnectorOutcome, DraftStore, Driver, ProgressReporter, Stages,
};
use pagesmith_generator::ContentGenerator;
use pagesmith_publisher::{CmsClient, Publisher, Taxonomies};
use pagesmith_research::SearchClient;
use pagesmith_shared::{
    AppConfig, PublishAction, Stage, init_config, load_config, resolve_config_path,
    resolve_services,
};
use pagesmith_storage::{Registry, RegistryStatus};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Pagesmith — generate and publish SEO integration pages.
#[derive(Parser)]
#[command(
    name = "pagesmith",
    version,
    about = "Generate SEO integration pages for connectors and publish them to the CMS.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ./pagesmith.toml, then ~/.pagesmith/pagesmith.toml).
    #[arg(long, global = true, env = "PAGESMITH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

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
    /// Generate and publish the next pending connector.
    Next,

    /// Generate and publish up to COUNT pending connectors, one at a time.
    Batch {
        /// Number of connectors to process.
        count: usize,

        /// Seconds to wait between connectors (defaults to `batch.delay_secs`).
        #[arg(long)]
        delay: Option<u64>,
    },

    /// Show published / remaining counts.
    Status {
        /// Print the status as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
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
        0 => "pagesmith=info",
        1 => "pagesmith=debug",
        _ => "pagesmith=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Next => cmd_run(config_path, 1, None).await,
        Command::Batch { count, delay } => cmd_run(config_path, count, delay).await,
        Command::Status { json } => cmd_status(config_path, json),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(config_path),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

// ---------------------------------------------------------------------------
// next / batch
// ---------------------------------------------------------------------------

async fn cmd_run(config_path: Option<&Path>, count: usize, delay: Option<u64>) -> Result<()> {
    let config = load_config(config_path)?;
    // Fail on missing credentials before any stage runs.
    let services = resolve_services(&config)?;

    let mut registry = open_registry(&config)?;

    let researcher = SearchClient::new(&config.search, &services.search)?;
    let generator = ContentGenerator::new(&config.llm, &services.llm, &config.brand)?;
    let taxonomies = Taxonomies::load(
        config.paths.categories.as_deref().map(Path::new),
        config.paths.tags.as_deref().map(Path::new),
    )?;
    let publisher = Publisher::new(
        CmsClient::new(&config.cms, &services.cms)?,
        config.brand.clone(),
        taxonomies,
    );

    let stages = Stages {
        researcher: &researcher,
        generator: &generator,
        publisher: &publisher,
    };
    let delay = Duration::from_secs(delay.unwrap_or(config.batch.delay_secs));
    let driver = Driver::new(
        stages,
        DraftStore::new(&config.paths.drafts_dir),
        config.pricing.clone(),
    )
    .with_delay(delay);

    info!(
        count,
        model = generator.model(),
        delay_secs = delay.as_secs(),
        "starting run"
    );

    let reporter = CliProgress::new();
    let report = driver.run_batch(&mut registry, count, &reporter).await?;

    print_report(&report);
    print_status(&registry.status());

    if report.has_failures() {
        return Err(eyre!(
            "{} of {} connector(s) failed; they remain pending",
            report.failed(),
            report.outcomes.len()
        ));
    }

    Ok(())
}

fn open_registry(config: &AppConfig) -> Result<Registry> {
    let registry = Registry::open(
        Path::new(&config.paths.dataset),
        Path::new(&config.paths.ledger),
    )?;
    Ok(registry)
}

fn print_report(report: &BatchReport) {
    println!();
    for outcome in &report.outcomes {
        match outcome {
            ConnectorOutcome::Published {
                name,
                page_id,
                action,
            } => {
                let verb = match action {
                    PublishAction::Created => "created",
                    PublishAction::Updated => "updated",
                };
                println!("  ✓ {name}: {verb} (id {page_id})");
            }
            ConnectorOutcome::Failed {
                name,
                stage,
                reason,
            } => println!("  ✗ {name}: {stage} failed: {reason}"),
        }
    }

    if report.exhausted {
        println!("  No pending connectors left.");
    }

    println!();
    println!("  Published: {}", report.published());
    println!("  Failed:    {}", report.failed());
    println!("  Cost:      {}", report.cost);
    println!("  Time:      {:.1}s", report.elapsed.as_secs_f64());
}

// ---------------------------------------------------------------------------
// status
// ---------------------------------------------------------------------------

fn cmd_status(config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let registry = open_registry(&config)?;
    let status = registry.status();

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&status);
    }
    Ok(())
}

fn print_status(status: &RegistryStatus) {
    println!();
    println!("  Total:     {}", status.total);
    println!("  Published: {}", status.published);
    println!("  Remaining: {}", status.remaining);
    if status.failed > 0 {
        println!("  Failing:   {}", status.failed);
    }
    match &status.next {
        Some(name) => println!("  Next:      {name}"),
        None => println!("  Next:      (none, all connectors published)"),
    }
    println!();
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config_init(config_path: Option<&Path>) -> Result<()> {
    let path = init_config(config_path)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    match resolve_config_path(config_path)? {
        Some(path) => println!("# {}", path.display()),
        None => println!("# no config file found, showing defaults"),
    }
    let config: AppConfig = load_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
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
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, connector: &str, stage: Stage) {
        let label = match stage {
            Stage::Research => "Researching",
            Stage::Generation => "Generating",
            Stage::Publish => "Publishing",
        };
        self.spinner.set_message(format!("{label} {connector}"));
    }

    fn connector_started(&self, connector: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("[{current}/{total}] {connector}"));
    }

    fn connector_finished(&self, outcome: &ConnectorOutcome) {
        let line = match outcome {
            ConnectorOutcome::Published { name, .. } => format!("✓ {name}"),
            ConnectorOutcome::Failed { name, stage, .. } => format!("✗ {name} ({stage})"),
        };
        self.spinner.println(line);
    }

    fn waiting(&self, delay: Duration) {
        self.spinner
            .set_message(format!("Waiting {}s", delay.as_secs()));
    }

    fn done(&self, _report: &BatchReport) {
        self.spinner.finish_and_clear();
    }
}
