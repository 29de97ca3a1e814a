use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub const DEFAULT_SESSION_DIR: &str = ".intention";

#[derive(Parser, Debug)]
#[command(name = "intention", author, version, about = "Gherkin and Jest tests from a GitHub repository")]
pub struct Cli {
    /// RON configuration file; environment variables override its values
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP API
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Analyze a repository locally and store the Gherkin in a session
    Analyze {
        /// owner/repo, owner/repo#branch or a GitHub URL
        repo: String,
        #[arg(long)]
        branch: Option<String>,
        #[arg(long, default_value = DEFAULT_SESSION_DIR)]
        session: PathBuf,
    },
    /// Work with the features and tests of a stored session
    Workbench {
        #[arg(long, default_value = DEFAULT_SESSION_DIR)]
        session: PathBuf,
        #[command(subcommand)]
        action: WorkbenchAction,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum WorkbenchAction {
    /// Replace the session's features with the Gherkin in FILE
    Load { file: PathBuf },
    /// List features and whether they have tests
    Features,
    /// Replace the text of feature INDEX with the contents of FILE
    Edit { index: usize, file: PathBuf },
    /// Generate Jest tests for feature INDEX
    Generate { index: usize },
    /// List the steps of feature INDEX
    Steps { index: usize },
    /// Show the source of one step and its scenario
    Select { index: usize, step: u32 },
    /// Replace one step's code with the contents of FILE
    Apply {
        index: usize,
        step: u32,
        file: PathBuf,
    },
    /// Write all generated tests to one spec file
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Forget the stored session
    Clear,
}
