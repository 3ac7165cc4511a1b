use clap::Parser;
use pdnd_client::token_cache::DEFAULT_CACHE_PATH;
use std::path::PathBuf;

/// Obtain a PDND access token and call an e-service.
#[derive(Parser, Debug)]
#[command(name = "pdnd-client", version, about)]
pub struct Args {
    /// Path to the JSON configuration file
    #[arg(long, default_value = "configs/sample.json")]
    pub config: PathBuf,

    /// Environment (produzione/collaudo)
    #[arg(long, default_value = "produzione")]
    pub env: String,

    /// URL used to verify the token
    #[arg(long)]
    pub status_url: Option<String>,

    /// API URL to call
    #[arg(long)]
    pub api_url: Option<String>,

    /// Query string appended to the API URL (e.g. id=123)
    #[arg(long, default_value = "")]
    pub api_url_filters: String,

    /// Token cache file
    #[arg(long, default_value = DEFAULT_CACHE_PATH)]
    pub token_file: PathBuf,

    /// Verbose logging and status codes
    #[arg(long)]
    pub debug: bool,

    /// Disable TLS certificate verification
    #[arg(long)]
    pub no_verify_ssl: bool,

    /// Save newly obtained tokens to the token file
    #[arg(long)]
    pub save: bool,
}

impl Args {
    /// Default tracing directive when `RUST_LOG` is unset.
    pub fn log_directive(&self) -> &'static str {
        if self.debug {
            "pdnd=debug"
        } else {
            "pdnd=warn"
        }
    }
}
