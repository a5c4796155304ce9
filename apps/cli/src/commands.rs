//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use robotscheck_core::{AnnotateSummary, ProgressReporter};
use robotscheck_robots::{RobotsMatcher, TextingRobotsMatcher, select_user_agent};
use robotscheck_shared::{
    AnnotateConfig, AppConfig, Decision, OutputMode, RobotsCheckError, init_config, load_config,
    load_config_from,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// robotscheck: annotate crawl ledgers with robots.txt permission.
#[derive(Parser)]
#[command(
    name = "robotscheck",
    version,
    about = "Annotate a crawl's success ledger with whether each fetch was allowed by robots.txt.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.robotscheck/robotscheck.toml.
    #[arg(long, global = true, env = "ROBOTSCHECK_CONFIG")]
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
    /// Annotate a success ledger with robots.txt decisions.
    Annotate(AnnotateArgs),

    /// Evaluate one robots.txt file against a URL.
    Check {
        /// Path to the robots.txt file.
        robots_file: PathBuf,

        /// URL to evaluate.
        url: String,

        /// User-agent token (repeatable, most specific first).
        #[arg(short = 'a', long = "user-agent")]
        user_agents: Vec<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Arguments for `annotate`.
#[derive(clap::Args)]
pub(crate) struct AnnotateArgs {
    /// Crawl run directory holding the success ledger and robots/ folder.
    #[arg(long)]
    pub run_dir: Option<PathBuf>,

    /// Input success ledger (overrides the run directory's).
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Output ledger (overrides the run directory's).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Directory of `<id>.<extension>` robots.txt files (overrides the run directory's).
    #[arg(long)]
    pub robots_dir: Option<PathBuf>,

    /// User-agent token (repeatable, most specific first).
    #[arg(short = 'a', long = "user-agent")]
    pub user_agents: Vec<String>,

    /// Artifact file extension.
    #[arg(long)]
    pub extension: Option<String>,

    /// Rows evaluated concurrently.
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Truncate the output ledger instead of appending to it.
    #[arg(long)]
    pub truncate: bool,

    /// Literal written for rows without a robots.txt artifact.
    #[arg(long)]
    pub no_policy_label: Option<String>,

    /// Literal written for rows whose robots.txt is not UTF-8.
    #[arg(long)]
    pub decode_error_label: Option<String>,

    /// Print the run summary as JSON.
    #[arg(long)]
    pub json: bool,
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
        0 => "robotscheck=info",
        1 => "robotscheck=debug",
        _ => "robotscheck=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

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
    let app_config = resolve_config(cli.config.as_deref())?;
    match cli.command {
        Command::Annotate(args) => cmd_annotate(&app_config, args).await,
        Command::Check {
            robots_file,
            url,
            user_agents,
        } => cmd_check(&app_config, &robots_file, &url, user_agents).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(&app_config).await,
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// annotate
// ---------------------------------------------------------------------------

/// Merge run directory, explicit paths, and flag overrides into a runtime config.
fn build_annotate_config(app: &AppConfig, args: &AnnotateArgs) -> Result<AnnotateConfig> {
    let mut config = match (&args.run_dir, &args.input, &args.output, &args.robots_dir) {
        (Some(run_dir), ..) => AnnotateConfig::for_run_dir(app, run_dir),
        (None, Some(input), Some(output), Some(robots_dir)) => {
            AnnotateConfig::new(app, input, output, robots_dir)
        }
        _ => {
            return Err(eyre!(
                "either --run-dir or all of --input, --output and --robots-dir are required"
            ));
        }
    };

    if let Some(input) = &args.input {
        config.input_path = input.clone();
    }
    if let Some(output) = &args.output {
        config.output_path = output.clone();
    }
    if let Some(robots_dir) = &args.robots_dir {
        config.robots_dir = robots_dir.clone();
    }
    if !args.user_agents.is_empty() {
        config.user_agents = args.user_agents.clone();
    }
    if let Some(extension) = &args.extension {
        config.artifact_extension = extension.clone();
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(label) = &args.no_policy_label {
        config.labels.no_policy = label.clone();
    }
    if let Some(label) = &args.decode_error_label {
        config.labels.decode_error = label.clone();
    }
    if args.truncate {
        config.output_mode = OutputMode::Truncate;
    }

    config.validate()?;
    Ok(config)
}

async fn cmd_annotate(app: &AppConfig, args: AnnotateArgs) -> Result<()> {
    let config = build_annotate_config(app, &args)?;

    info!(
        input = %config.input_path.display(),
        output = %config.output_path.display(),
        robots_dir = %config.robots_dir.display(),
        user_agents = ?config.user_agents,
        concurrency = config.concurrency,
        "annotating ledger"
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing current rows");
            on_signal.cancel();
        }
    });

    let reporter = CliProgress::new(args.json);
    let summary = robotscheck_core::annotate(
        &config,
        Arc::new(TextingRobotsMatcher),
        &reporter,
        &cancel,
    )
    .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    if summary.cancelled {
        return Err(RobotsCheckError::Cancelled { rows: summary.rows }.into());
    }
    Ok(())
}

fn print_summary(summary: &AnnotateSummary) {
    println!();
    println!("  Ledger annotated!");
    println!("  Rows:          {}", summary.rows);
    println!("  Allowed:       {}", summary.allowed);
    println!("  Disallowed:    {}", summary.disallowed);
    println!("  No policy:     {}", summary.no_policy);
    println!("  Decode errors: {}", summary.decode_errors);
    println!(
        "  Time:          {:.1}s",
        summary.elapsed.as_secs_f64()
    );
    for diagnostic in &summary.diagnostics {
        println!("  error: {diagnostic}");
    }
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new(hidden: bool) -> Self {
        if hidden {
            return Self {
                spinner: ProgressBar::hidden(),
            };
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn started(&self, input: &Path, _output: &Path) {
        self.spinner
            .set_message(format!("Checking robots.txt of URLs from {}", input.display()));
    }

    fn row_annotated(&self, id: &str, decision: Decision, current: u64) {
        self.spinner
            .set_message(format!("Annotated [{current}] id {id}: {decision:?}"));
    }

    fn done(&self, _summary: &AnnotateSummary) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

/// Outcome of evaluating one robots.txt file against one URL.
#[derive(Debug)]
struct CheckReport {
    /// `User-agent` value of the governing group, or `*`.
    group: String,
    allowed: bool,
}

async fn cmd_check(
    app: &AppConfig,
    robots_file: &Path,
    url: &str,
    user_agents: Vec<String>,
) -> Result<()> {
    let user_agents = if user_agents.is_empty() {
        app.annotate.user_agents.clone()
    } else {
        user_agents
    };

    let report = check_robots_file(robots_file, &user_agents, url).await?;
    info!(url, group = %report.group, allowed = report.allowed, "checked robots.txt");

    println!("  URL:        {url}");
    println!("  Agents:     {}", user_agents.join(", "));
    println!("  Group:      {}", report.group);
    println!(
        "  Decision:   {}",
        if report.allowed { "allowed" } else { "disallowed" }
    );

    Ok(())
}

async fn check_robots_file(
    robots_file: &Path,
    user_agents: &[String],
    url: &str,
) -> Result<CheckReport> {
    if user_agents.is_empty() {
        return Err(eyre!("at least one --user-agent is required"));
    }

    let bytes = tokio::fs::read(robots_file)
        .await
        .map_err(|e| RobotsCheckError::io(robots_file, e))?;
    let robots_txt = String::from_utf8(bytes)
        .map_err(|e| eyre!("{} is not UTF-8 encoded: {e}", robots_file.display()))?;

    let matcher = TextingRobotsMatcher;
    let allowed = matcher
        .is_allowed(&robots_txt, user_agents, url)
        .map_err(|e| eyre!("failed to evaluate {}: {e}", robots_file.display()))?;
    let group = select_user_agent(&robots_txt, user_agents)
        .unwrap_or("*")
        .to_string();

    Ok(CheckReport { group, allowed })
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}
