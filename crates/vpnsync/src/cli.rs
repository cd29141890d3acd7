use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "vpnsync",
    version,
    about = "Keeps OpenVPN client certificates in sync with an IAM group"
)]
pub struct Cli {
    /// Environment name, used as the upload prefix and in notification mails
    #[arg(long = "env", env = "VPNSYNC_ENV", value_name = "NAME")]
    pub environment: String,

    /// Settings file
    #[arg(long, env = "VPNSYNC_CONFIG", value_name = "PATH", default_value = "config.toml")]
    pub config: PathBuf,

    /// Debug logging (same as -v)
    #[arg(long)]
    pub debug: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "VPNSYNC_LOG", default_value = "info")]
    pub log_level: String,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Write logs to file (in addition to stderr)
    #[arg(long, env = "VPNSYNC_LOG_FILE", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Run a single cycle and exit
    #[arg(long)]
    pub once: bool,

    /// Print the cycle report as JSON (with --once)
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Filter directive for the tracing subscriber.
    pub fn log_filter(&self) -> &str {
        match (self.verbose, self.debug) {
            (0, false) => self.log_level.as_str(),
            (0 | 1, _) => "debug",
            _ => "trace",
        }
    }
}
