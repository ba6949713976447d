use std::path::PathBuf;

use clap::Parser;

use publabels_core::Address;

/// publabels: permissioned address label registry with contributor review.
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// Address granted the admin role when a new registry is created.
    /// Ignored when an existing journal is replayed.
    #[arg(long, env = "PUBLABELS_ADMIN")]
    pub admin: Address,

    /// JSONL journal used to persist and replay registry events.
    /// If omitted, the registry is in-memory only.
    #[arg(long, env = "PUBLABELS_JOURNAL")]
    pub journal: Option<PathBuf>,

    /// Address to bind the web server to.
    #[arg(long, default_value = "127.0.0.1", env = "PUBLABELS_BIND")]
    pub bind: String,

    /// Port to listen on.
    #[arg(long, default_value = "3090", env = "PUBLABELS_PORT")]
    pub port: u16,

    /// Largest page a client may request from paginated endpoints.
    #[arg(long, default_value = "500")]
    pub max_page_size: usize,

    /// Allow verifiers (not only admins) to approve and reject changes.
    #[arg(long)]
    pub verifiers_review: bool,
}
