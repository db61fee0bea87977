use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use fls_store::{NodeStatus, Stage};

#[derive(Parser)]
#[command(
    name = "fls",
    about = "FrameLeap artifact store: inspect, validate and fork pipeline versions",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Store root (holds `projects/`). Overrides the config file.
    #[arg(long, global = true, env = "FLS_ROOT")]
    pub root: Option<PathBuf>,

    /// TOML config file.
    #[arg(long, global = true, env = "FLS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Project id.
    #[arg(short, long, global = true, env = "FLS_PROJECT")]
    pub project: Option<String>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a project (or update its name and description)
    Init(InitArgs),
    /// List projects under the store root
    Projects,
    /// Show project summary and HEAD
    Status,
    /// Record a new stage run
    Node(NodeArgs),
    /// Store a stage output on a node
    Save(SaveArgs),
    /// Mark an unsettled node pending, generating or failed
    Mark(MarkArgs),
    /// Settle a node by reusing a matching earlier run
    Reuse(ReuseArgs),
    /// List branches, or fork a new one
    Branch(BranchArgs),
    /// Move HEAD to a branch head
    Switch(SwitchArgs),
    /// Show history from the root
    Log(LogArgs),
    /// Show one node
    Show(ShowArgs),
    /// Print an artifact's data
    Artifact(ArtifactArgs),
    /// Show the branch operation log
    Ops,
    /// Check the project for damage
    Validate,
    /// Print the effective configuration
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct InitArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Args)]
pub struct NodeArgs {
    #[arg(short, long)]
    pub stage: Stage,
    /// Parent node (defaults to HEAD).
    #[arg(long)]
    pub parent: Option<String>,
    #[arg(short, long)]
    pub branch: Option<String>,
    #[arg(short, long)]
    pub message: Option<String>,
    /// Stage inputs as JSON; their hash becomes the cache key.
    #[arg(long)]
    pub inputs: Option<String>,
}

#[derive(Args)]
pub struct SaveArgs {
    pub node: String,
    #[arg(short = 't', long = "type")]
    pub artifact_type: String,
    /// Inline JSON data.
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    pub data: Option<String>,
    /// Read JSON data from a file.
    #[arg(long)]
    pub file: Option<PathBuf>,
    #[arg(long)]
    pub summary: Option<String>,
    /// Preview blob file.
    #[arg(long)]
    pub preview: Option<PathBuf>,
}

#[derive(Args)]
pub struct MarkArgs {
    pub node: String,
    pub status: NodeStatus,
    #[arg(long)]
    pub error: Option<String>,
}

#[derive(Args)]
pub struct ReuseArgs {
    pub node: String,
    /// Source node (defaults to the latest cache hit on the node's branch).
    #[arg(long)]
    pub from: Option<String>,
}

#[derive(Args)]
pub struct BranchArgs {
    /// New branch name; lists branches when absent.
    pub name: Option<String>,
    /// Node to fork from (defaults to HEAD).
    #[arg(long)]
    pub from: Option<String>,
    #[arg(short, long)]
    pub message: Option<String>,
}

#[derive(Args)]
pub struct SwitchArgs {
    pub branch: String,
}

#[derive(Args)]
pub struct LogArgs {
    /// Branch to show (defaults to HEAD).
    pub branch: Option<String>,
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
    #[arg(long)]
    pub oneline: bool,
}

#[derive(Args)]
pub struct ShowArgs {
    pub node: String,
}

#[derive(Args)]
pub struct ArtifactArgs {
    pub id: String,
    /// Write the preview blob here.
    #[arg(long)]
    pub preview_out: Option<PathBuf>,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Save the effective configuration to this file.
    #[arg(long)]
    pub write: Option<PathBuf>,
}
