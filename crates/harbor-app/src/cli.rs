use clap::Parser;

/// Harbor — a multiplexing terminal session manager with shell integration.
#[derive(Parser, Debug)]
#[command(name = "harbor", version, about)]
pub struct Args {
    /// Target to open a session against ("local" or a shell binary path).
    #[arg(short = 't', long, default_value = "local")]
    pub target: String,

    /// Config file path override.
    #[arg(long)]
    pub config: Option<String>,

    /// Log level override (debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// List resolvable targets and exit.
    #[arg(long)]
    pub list: bool,
}

pub fn parse() -> Args {
    Args::parse()
}
