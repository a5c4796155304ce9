//! Application configuration for robotscheck.
//!
//! User config lives at `~/.robotscheck/robotscheck.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, RobotsCheckError};
use crate::types::{DecisionLabels, LedgerLayout, OutputMode};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "robotscheck.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".robotscheck";

// ---------------------------------------------------------------------------
// Config structs (matching robotscheck.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Annotation defaults.
    #[serde(default)]
    pub annotate: AnnotateDefaults,

    /// File names inside a crawl run directory.
    #[serde(default)]
    pub run: RunLayoutConfig,
}

/// `[annotate]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotateDefaults {
    /// User-agent product tokens, most specific first.
    #[serde(default = "default_user_agents")]
    pub user_agents: Vec<String>,

    /// Extension of stored robots.txt artifacts, without the dot.
    #[serde(default = "default_artifact_extension")]
    pub artifact_extension: String,

    /// Header label for the inserted column.
    #[serde(default = "default_header_label")]
    pub header_label: String,

    /// Rows evaluated concurrently. 1 keeps the run fully sequential.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Ledger field positions.
    #[serde(default)]
    pub layout: LedgerLayout,

    /// Literals written for each decision.
    #[serde(default)]
    pub labels: DecisionLabels,
}

impl Default for AnnotateDefaults {
    fn default() -> Self {
        Self {
            user_agents: default_user_agents(),
            artifact_extension: default_artifact_extension(),
            header_label: default_header_label(),
            concurrency: default_concurrency(),
            layout: LedgerLayout::default(),
            labels: DecisionLabels::default(),
        }
    }
}

fn default_user_agents() -> Vec<String> {
    vec!["SiteimproveBot".into(), "SiteimproveBot-Crawler".into()]
}
fn default_artifact_extension() -> String {
    "rob".into()
}
fn default_header_label() -> String {
    "Robots.txt OK".into()
}
fn default_concurrency() -> usize {
    1
}

/// `[run]` section: where the crawler leaves its outputs inside a run directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLayoutConfig {
    /// Success ledger written by the crawl stage.
    #[serde(default = "default_input_file")]
    pub input_file: String,

    /// Annotated ledger produced by this tool.
    #[serde(default = "default_output_file")]
    pub output_file: String,

    /// Directory of downloaded robots.txt files.
    #[serde(default = "default_robots_dir")]
    pub robots_dir: String,
}

impl Default for RunLayoutConfig {
    fn default() -> Self {
        Self {
            input_file: default_input_file(),
            output_file: default_output_file(),
            robots_dir: default_robots_dir(),
        }
    }
}

fn default_input_file() -> String {
    "success.csv".into()
}
fn default_output_file() -> String {
    "success_robots.csv".into()
}
fn default_robots_dir() -> String {
    "robots".into()
}

// ---------------------------------------------------------------------------
// Annotate config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime annotation configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct AnnotateConfig {
    /// Input success ledger.
    pub input_path: PathBuf,
    /// Annotated output ledger.
    pub output_path: PathBuf,
    /// Directory holding `<id>.<extension>` robots.txt artifacts.
    pub robots_dir: PathBuf,
    /// Artifact extension, without the dot.
    pub artifact_extension: String,
    /// User-agent tokens, tried in order.
    pub user_agents: Vec<String>,
    /// Label inserted into the header row.
    pub header_label: String,
    /// Field positions.
    pub layout: LedgerLayout,
    /// Decision literals.
    pub labels: DecisionLabels,
    /// Maximum rows evaluated at once.
    pub concurrency: usize,
    /// Append to or truncate the output ledger.
    pub output_mode: OutputMode,
}

impl AnnotateConfig {
    /// Build a runtime config from explicit paths and the loaded app config.
    pub fn new(
        config: &AppConfig,
        input_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        robots_dir: impl Into<PathBuf>,
    ) -> Self {
        let defaults = &config.annotate;
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            robots_dir: robots_dir.into(),
            artifact_extension: defaults.artifact_extension.clone(),
            user_agents: defaults.user_agents.clone(),
            header_label: defaults.header_label.clone(),
            layout: defaults.layout,
            labels: defaults.labels.clone(),
            concurrency: defaults.concurrency,
            output_mode: OutputMode::default(),
        }
    }

    /// Build a runtime config for a crawl run directory using the `[run]` file names.
    pub fn for_run_dir(config: &AppConfig, run_dir: &Path) -> Self {
        Self::new(
            config,
            run_dir.join(&config.run.input_file),
            run_dir.join(&config.run.output_file),
            run_dir.join(&config.run.robots_dir),
        )
    }

    /// Reject settings the annotator cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.user_agents.is_empty() {
            return Err(RobotsCheckError::validation(
                "at least one user-agent token is required",
            ));
        }
        if self.user_agents.iter().any(|ua| ua.trim().is_empty()) {
            return Err(RobotsCheckError::validation("user-agent tokens must not be blank"));
        }
        if self.concurrency == 0 {
            return Err(RobotsCheckError::validation("concurrency must be at least 1"));
        }
        if self.artifact_extension.trim_start_matches('.').is_empty() {
            return Err(RobotsCheckError::validation("artifact extension must not be empty"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.robotscheck/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| RobotsCheckError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.robotscheck/robotscheck.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| RobotsCheckError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        RobotsCheckError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| RobotsCheckError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| RobotsCheckError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| RobotsCheckError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
