use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vocalis")]
#[command(author, version, about = "Voice assistant with gated, audited tool calling", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a single message to the assistant
    Chat {
        prompt: String,

        /// Write the spoken reply to this file
        #[arg(long)]
        speak: Option<PathBuf>,

        /// Approve a requested tool call without asking
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Start an interactive session (use /confirm to approve a pending tool call)
    Interactive,

    /// List the enabled tools
    Tools,

    /// Execute a tool directly and print the result document
    Exec {
        tool_id: String,

        /// Parameters as a JSON object
        #[arg(short, long, default_value = "{}")]
        params: String,

        /// Pass the confirmation gate
        #[arg(short, long)]
        confirm: bool,
    },

    /// Show recorded tool executions
    Audit {
        /// Only the most recent N entries
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Synthesize speech for a piece of text
    Speak {
        text: String,

        #[arg(short, long, default_value = "speech.pcm")]
        out: PathBuf,
    },
}
