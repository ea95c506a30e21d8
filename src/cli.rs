use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use edgeplan::domain::{DependencyPolicy, OperationKind};
use std::path::PathBuf;
use url::Url;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "edgeward")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(
    about = "Install, update and uninstall edge components with journaling and rollback",
    long_about = None
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file (defaults to edgeward.toml in the config directory)
    #[arg(long, global = true, env = "EDGEWARD_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Install components (default-enabled ones when none are named)
    Install(OperationArgs),

    /// Update installed components to the manifest version
    Update(OperationArgs),

    /// Uninstall components (all installed ones when none are named)
    Uninstall {
        #[command(flatten)]
        args: OperationArgs,

        /// Also delete install directories
        #[arg(long)]
        purge_data: bool,
    },

    /// Build and print a plan without running it
    Plan {
        /// Operation to plan
        #[arg(value_enum)]
        operation: OperationArg,

        #[command(flatten)]
        request: RequestArgs,

        /// Plan directory removal for uninstall
        #[arg(long)]
        purge_data: bool,
    },

    /// Print the persisted host state
    State {
        /// State file to read
        #[arg(long, env = "EDGEWARD_STATE_FILE")]
        state_file: Option<PathBuf>,
    },

    /// Print journal entries
    Journal {
        /// Only entries of this run
        #[arg(long)]
        run: Option<Uuid>,

        /// Show only the last N entries
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Journal file to read
        #[arg(long, env = "EDGEWARD_JOURNAL_FILE")]
        journal_file: Option<PathBuf>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OperationArg {
    Install,
    Update,
    Uninstall,
}

impl From<OperationArg> for OperationKind {
    fn from(arg: OperationArg) -> Self {
        match arg {
            OperationArg::Install => Self::Install,
            OperationArg::Update => Self::Update,
            OperationArg::Uninstall => Self::Uninstall,
        }
    }
}

// ============================================================================
// Shared request arguments
// ============================================================================

#[derive(Args, Debug, Default, Clone)]
pub struct RequestArgs {
    /// Component ids to act on
    #[arg(value_name = "COMPONENT")]
    pub targets: Vec<String>,

    /// Base URI of the distribution service
    #[arg(long, env = "EDGEWARD_API_BASE_URI")]
    pub api_base_uri: Option<String>,

    /// Release channel [default: stable]
    #[arg(long, env = "EDGEWARD_CHANNEL")]
    pub channel: Option<String>,

    /// Artifact cache directory
    #[arg(long, env = "EDGEWARD_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// State file
    #[arg(long, env = "EDGEWARD_STATE_FILE")]
    pub state_file: Option<PathBuf>,

    /// Journal file
    #[arg(long, env = "EDGEWARD_JOURNAL_FILE")]
    pub journal_file: Option<PathBuf>,

    /// Override a dependency policy (repeatable)
    #[arg(long = "dependency-policy", value_name = "ID=managed|external", value_parser = parse_policy)]
    pub dependency_policies: Vec<(String, DependencyPolicy)>,

    /// Endpoint of an externally provided dependency (repeatable)
    #[arg(long = "external-endpoint", value_name = "ID=URI", value_parser = parse_endpoint)]
    pub external_endpoints: Vec<(String, Url)>,

    /// Bearer token for the distribution service
    #[arg(long, env = "EDGEWARD_BEARER_TOKEN", hide_env_values = true)]
    pub bearer_token: Option<String>,

    /// File holding the bearer token
    #[arg(long)]
    pub bearer_token_file: Option<PathBuf>,

    /// Client certificate (PEM)
    #[arg(long, requires = "client_key")]
    pub client_cert: Option<PathBuf>,

    /// Client certificate private key (PEM)
    #[arg(long, requires = "client_cert")]
    pub client_key: Option<PathBuf>,

    /// Accept any server certificate
    #[arg(long)]
    pub insecure: bool,

    /// Extra CA certificate (PEM)
    #[arg(long)]
    pub ca_cert: Option<PathBuf>,
}

#[derive(Args, Debug, Default, Clone)]
pub struct OperationArgs {
    #[command(flatten)]
    pub request: RequestArgs,

    /// Show what would change without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Never prompt; proceed without confirmation
    #[arg(long)]
    pub non_interactive: bool,
}

fn split_pair(value: &str) -> Result<(&str, &str), String> {
    let (id, rest) = value
        .split_once('=')
        .ok_or_else(|| format!("expected ID=VALUE, got '{value}'"))?;
    let id = id.trim();
    if id.is_empty() {
        return Err(format!("missing dependency id in '{value}'"));
    }
    Ok((id, rest.trim()))
}

fn parse_policy(value: &str) -> Result<(String, DependencyPolicy), String> {
    let (id, policy) = split_pair(value)?;
    Ok((id.to_string(), policy.parse()?))
}

fn parse_endpoint(value: &str) -> Result<(String, Url), String> {
    let (id, uri) = split_pair(value)?;
    let url = Url::parse(uri).map_err(|e| format!("invalid endpoint '{uri}': {e}"))?;
    Ok((id.to_string(), url))
}
