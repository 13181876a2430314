use std::path::PathBuf;

use clap::Parser;

/// Codeweave completion client
#[derive(Debug, Parser)]
#[command(name = "codeweave", version, about = "Streaming completions with provider failover")]
pub struct Args {
    /// Path to configuration file (YAML or JSON)
    #[arg(short, long, default_value = "codeweave.yaml", env = "CODEWEAVE_CONFIG")]
    pub config: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Request structured file edits instead of a chat message
    #[arg(long)]
    pub structured: bool,

    /// System instruction sent ahead of the conversation
    #[arg(long)]
    pub system: Option<String>,

    /// Project file to include as context (repeatable)
    #[arg(long = "file", value_name = "PATH")]
    pub files: Vec<PathBuf>,

    /// Write structured edits back to disk
    #[arg(long, requires = "structured")]
    pub apply: bool,

    /// Ask for deterministic sampling
    #[arg(long)]
    pub deterministic: bool,

    /// The prompt to send
    pub prompt: String,
}

impl Args {
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "codeweave_core=info,codeweave=info",
            1 => "codeweave_core=debug,codeweave=debug",
            _ => "codeweave_core=trace,codeweave=trace",
        }
    }
}
