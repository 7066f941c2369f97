use clap::Parser;

/// Named-counter HTTP service
#[derive(Debug, Parser)]
#[command(name = "stats_server", version, about)]
pub struct Args {
    /// Port to listen on (default 9080)
    pub port: Option<u16>,

    /// Number of worker threads (default 2)
    pub threads: Option<usize>,

    /// Configuration file, without extension
    #[arg(short, long, default_value = "config")]
    pub config: String,
}
