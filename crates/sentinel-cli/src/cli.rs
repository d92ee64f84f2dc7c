use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "sentinel", about = "Message-fabric ingestion, classification, and sink fan-out")]
pub struct Cli {
    /// Path to the TOML config file. Defaults to $HOME/.sentinel/sentinel.toml.
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate reachability of every external dependency without processing messages.
    Test,
    /// Bounded back-fill: runs one fetch cycle per channel capped at --limit, then exits.
    Historical {
        #[arg(long)]
        limit: u32,
    },
    /// Start the scheduler and task bus workers and run until shutdown.
    Monitor,
}
