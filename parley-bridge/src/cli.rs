//! Command-line argument parsing for the console bridge

use clap::Parser;
use std::path::PathBuf;

/// parley-bridge - chat console for a remote MCP server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file
    ///
    /// Defaults to $XDG_CONFIG_HOME/parley/config.toml.
    #[arg(long, short = 'c', env = "PARLEY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Server URL (ws://, wss:// or tcp://host:port)
    ///
    /// Overrides `server.url` from the configuration file.
    #[arg(long, short = 'u')]
    pub url: Option<String>,

    /// Connect on startup
    #[arg(long, default_value_t = false)]
    pub connect: bool,

    /// Room the console posts into
    #[arg(long, short = 'r', default_value = "console")]
    pub room: String,

    /// Sender name for console input
    #[arg(long, default_value = "operator")]
    pub user: String,

    /// Log to stderr instead of the log file
    #[arg(long, default_value_t = false)]
    pub log_stderr: bool,

    /// Print the default configuration and exit
    #[arg(long, default_value_t = false)]
    pub print_config: bool,
}

impl Args {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
