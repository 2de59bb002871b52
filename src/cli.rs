use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "nim-proxy", version, about = "OpenAI-compatible proxy for the NVIDIA NIM API")]
pub struct Cli {
    /// Path to a .env file with proxy settings
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Port to listen on (overrides PORT)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Enable trace logging, including request and response payloads
    #[arg(short, long)]
    pub verbose: bool,
}
