use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "inbox-sync", about = "Realtime conversation sync client for an inbox API")]
pub struct Cli {
    /// Path to config file (default: ./config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Follow the push stream and keep the conversation list in sync
    Listen,
    /// Print the conversation list
    List {
        /// Only conversations of this inbox
        #[arg(long)]
        inbox: Option<i64>,
    },
    /// Print a conversation's messages and mark it as read
    Read {
        conversation_id: i64,
    },
    /// Send a text message to a conversation
    Send {
        conversation_id: i64,
        text: String,
    },
    /// Delete a conversation on the server
    Delete {
        conversation_id: i64,
    },
    /// Delete every conversation of an inbox on the server
    ClearInbox {
        inbox_id: i64,
    },
}

impl Cli {
    pub fn command_or_default(&self) -> Command {
        self.command.clone().unwrap_or(Command::Listen)
    }
}
