//! luci-rpc: command-line client for OpenWrt's LuCI JSON-RPC API
//!
//! - Generic `call` into the sys/uci/fs namespaces
//! - `demo` walk-through (uptime, network devices, NTP toggle)
//! - Device profiles from the luci-rpc config file

mod cli;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::Cli;

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so results on stdout stay pipeable
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "luci_rpc=info,luci_rpc_cli=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Cli::parse().run()
}
