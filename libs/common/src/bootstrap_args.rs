//! Common command-line arguments for the relay services

use std::path::PathBuf;

use clap::Parser;

/// Common service startup arguments
#[derive(Debug, Clone, Parser)]
#[command(author, version, about)]
pub struct ServiceArgs {
    /// Configuration file
    #[arg(short = 'c', long, default_value = "/etc/house/relays.json", env = "RELAYSRV_CONFIG")]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    pub log_level: String,

    /// Directory for rolling log files (console only when omitted)
    #[arg(long, env = "RELAYSRV_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Disable colored output (useful for log files)
    #[arg(long)]
    pub no_color: bool,

    /// Only validate configuration without starting service
    #[arg(long)]
    pub validate: bool,
}
