use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "citywalk", version, about = "citywalk - walk a small city and talk to its locals")]
pub struct CliArgs {
    /// Subcommand (play, simulate, chat, inspect)
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Directory to start searching for citywalk.yaml from
    #[arg(long, default_value = ".")]
    pub project: String,

    /// Disable hot reload of citywalk.yaml and input bindings
    #[arg(long, global = true)]
    pub no_watch: bool,

    /// Append every game event to this file as JSON lines
    #[arg(long, global = true)]
    pub event_log: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open a window and play (the default)
    Play,
    /// Drive the game headlessly from a YAML input script
    Simulate {
        /// Script path, relative to the project root
        script: String,
    },
    /// Talk to the project's NPC from the terminal
    Chat,
    /// Print what the loader sees in a model file
    Inspect {
        /// Model path, relative to the project root
        model: String,
    },
}
