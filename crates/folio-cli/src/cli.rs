//! CLI command definitions and argument parsing.

use clap::{ArgGroup, Parser, Subcommand};
use folio_dedup::{DedupConfig, PrefilterMode};

/// Folio CLI - Find duplicate archives by comparing page embeddings.
#[derive(Debug, Parser)]
#[command(name = "folio")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "FOLIO_CONFIG")]
    pub config: Option<String>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Quiet format (removable archive IDs only)
    Quiet,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a dedup job and print the report
    Run(RunArgs),

    /// Load a JSON corpus into a SQLite database
    Import(ImportArgs),

    /// Manage the configuration file
    Config(ConfigArgs),
}

/// Arguments for the run command.
#[derive(Debug, Parser)]
#[command(group(ArgGroup::new("source").required(true).args(["corpus", "db"])))]
pub struct RunArgs {
    /// JSON corpus file
    #[arg(long)]
    pub corpus: Option<String>,

    /// SQLite database
    #[arg(long)]
    pub db: Option<String>,

    /// Archive IDs to examine (default: every archive in the source)
    #[arg(long, value_delimiter = ',')]
    pub ids: Vec<String>,

    /// Start from a named preset instead of the configured values
    #[arg(long, value_enum)]
    pub preset: Option<PresetArg>,

    /// Minimum page similarity (0.0 exclusive to 1.0)
    #[arg(short, long)]
    pub threshold: Option<f64>,

    /// Scoring criteria, best first (e.g. file_size:desc,favorites)
    #[arg(long, value_delimiter = ',')]
    pub criteria: Vec<String>,

    /// Number of comparison workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Stop scheduling comparisons after this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Only compare archives of the same language
    #[arg(long)]
    pub separate_languages: bool,

    /// Candidate prefilter
    #[arg(long, value_enum)]
    pub prefilter: Option<PrefilterArg>,
}

/// Arguments for the import command.
#[derive(Debug, Parser)]
pub struct ImportArgs {
    /// JSON corpus file to read
    #[arg(long)]
    pub corpus: String,

    /// SQLite database to create or extend
    #[arg(long)]
    pub db: String,
}

/// Arguments for configuration management.
#[derive(Debug, Parser)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the configuration file path
    Path,
}

/// Preset argument.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum PresetArg {
    /// Balanced defaults
    Default,
    /// High threshold, transitive reduction
    Strict,
    /// Lower threshold, languages kept apart
    Lenient,
}

/// Prefilter argument.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum PrefilterArg {
    /// Compare every pair
    Off,
    /// Cheap first/last page window check
    Exact,
    /// HNSW nearest-neighbour lookup (may miss pairs)
    Approximate,
}

impl From<CliFormat> for crate::config::OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => crate::config::OutputFormat::Table,
            CliFormat::Json => crate::config::OutputFormat::Json,
            CliFormat::Quiet => crate::config::OutputFormat::Quiet,
        }
    }
}

impl From<PresetArg> for DedupConfig {
    fn from(preset: PresetArg) -> Self {
        match preset {
            PresetArg::Default => DedupConfig::default(),
            PresetArg::Strict => DedupConfig::strict(),
            PresetArg::Lenient => DedupConfig::lenient(),
        }
    }
}

impl From<PrefilterArg> for PrefilterMode {
    fn from(prefilter: PrefilterArg) -> Self {
        match prefilter {
            PrefilterArg::Off => PrefilterMode::Off,
            PrefilterArg::Exact => PrefilterMode::Exact,
            PrefilterArg::Approximate => PrefilterMode::approximate(),
        }
    }
}
