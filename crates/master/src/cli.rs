use clap::Parser;

/// Reads JSON values from stdin, one per line, submits them as a single job
/// set, and prints each result as a JSON line on stdout as it arrives.
#[derive(Parser, Debug)]
#[command(name = "dispatch-master", version, about)]
pub struct Cli {
    /// Address to bind the worker-facing TCP listener to.
    #[arg(long, env = "DISPATCH_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind the worker-facing TCP listener to.
    #[arg(long, env = "DISPATCH_PORT", default_value_t = dispatch_net::DEFAULT_PORT)]
    pub port: u16,

    /// Log filter directive, e.g. "info" or "dispatch_net=debug,info".
    #[arg(long, env = "DISPATCH_LOG", default_value = "info")]
    pub log: String,
}
