//! CLI argument parsing for the conversion pipeline.
//!
//! The CLI is intentionally thin: it assembles a `BridgeConfig` and walks
//! the phases in order, so the same core logic can be embedded elsewhere.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "tpbdd",
    version,
    about = "Convert test-management plans into Gherkin features and runner stubs",
    after_help = "Examples:\n  tpbdd features --org-url https://dev.example.com/org --project Proj --plan-id 42 --out-dir features\n  tpbdd runners --out-dir features\n  tpbdd validate --out-dir features --fixtures tests/fixtures\n  tpbdd graph --org-url https://dev.example.com/org --project Proj --plan-id 42\n\nThe access token is read from the TPBDD_TOKEN environment variable.",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level pipeline commands, in phase order.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Populate the plan and write one feature document per suite
    Features(FeaturesArgs),
    /// Generate runner stubs from the persisted feature documents
    Runners(RunnersArgs),
    /// Validate persisted runners against a fixtures directory
    Validate(ValidateArgs),
    /// Populate the plan and emit its usage graph as DOT
    Graph(GraphArgs),
}

/// Connection settings shared by the commands that fetch from the service.
#[derive(Parser, Debug)]
pub struct ConnectionArgs {
    /// Base URL of the test-management organization
    #[arg(long, value_name = "URL")]
    pub org_url: String,

    /// Project scoping the plan and shared repositories
    #[arg(long, value_name = "NAME")]
    pub project: String,

    /// Plan to convert
    #[arg(long, value_name = "ID")]
    pub plan_id: u32,
}

#[derive(Parser, Debug)]
#[command(about = "Populate a plan and write feature documents")]
pub struct FeaturesArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Directory receiving the feature documents
    #[arg(long, value_name = "DIR", default_value = "features")]
    pub out_dir: PathBuf,
}

#[derive(Parser, Debug)]
#[command(about = "Generate runner stubs from persisted feature documents")]
pub struct RunnersArgs {
    /// Directory holding the feature documents
    #[arg(long, value_name = "DIR", default_value = "features")]
    pub out_dir: PathBuf,
}

#[derive(Parser, Debug)]
#[command(about = "Validate persisted runners against a fixture registry")]
pub struct ValidateArgs {
    /// Directory holding the runner stubs
    #[arg(long, value_name = "DIR", default_value = "features")]
    pub out_dir: PathBuf,

    /// Directory holding fixture binding files
    #[arg(long, value_name = "DIR")]
    pub fixtures: PathBuf,
}

#[derive(Parser, Debug)]
#[command(about = "Populate a plan and emit its usage graph as DOT")]
pub struct GraphArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Write the DOT listing here instead of stdout
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}
