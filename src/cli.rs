// ABOUTME: Command-line arguments for the parley client.
// ABOUTME: Flags override values loaded from the config file and environment.

use clap::{Parser, Subcommand};
use parley_core::config::Config;

/// Terminal client for a parley chat relay
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Relay endpoint (overrides BACKEND_URL and the config file)
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Connect as this user on startup
    #[arg(short, long, global = true)]
    pub username: Option<String>,

    /// Model used for /ask
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Print logs to stderr instead of the log file
    #[arg(long, global = true)]
    pub print_logs: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Interactive chat session (default)
    Chat,
    /// Check whether the relay is up and exit
    Health,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Chat)
    }

    /// Fold flag values into `config`
    pub fn apply(&self, config: &mut Config) {
        if let Some(endpoint) = &self.endpoint {
            config.relay.endpoint = endpoint.clone();
        }
        if let Some(username) = &self.username {
            config.chat.username = Some(username.clone());
        }
        if let Some(model) = &self.model {
            config.chat.default_model = model.clone();
        }
    }
}
