//! Argument parsing and command dispatch

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use luci_rpc::protocol::{NS_FS, NS_SYS, NS_UCI};
use luci_rpc::{Client, Config, Credentials, DeviceConfig, ServerEndpoint};

#[derive(Parser)]
#[command(name = "luci-rpc")]
#[command(about = "Call the JSON-RPC API of an OpenWrt router")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Configuration file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

/// How to reach the router
#[derive(Args, Debug, Default)]
pub struct ConnectionArgs {
    /// Device profile from the config file
    #[arg(long, short = 'd', global = true, conflicts_with = "host")]
    pub device: Option<String>,

    /// Router hostname or IP address
    #[arg(long, short = 'H', global = true)]
    pub host: Option<String>,

    /// Port (0 = scheme default)
    #[arg(long, short = 'p', global = true)]
    pub port: Option<u16>,

    /// Use HTTPS
    #[arg(long, global = true)]
    pub tls: bool,

    /// Verify the router's TLS certificate
    #[arg(long, global = true)]
    pub verify_tls: bool,

    #[arg(long, short = 'u', global = true)]
    pub username: Option<String>,

    #[arg(long, global = true, env = "LUCI_RPC_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Connect/keep-alive timeout in seconds
    #[arg(long, short = 't', global = true)]
    pub timeout: Option<u64>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Namespace {
    Sys,
    Uci,
    Fs,
}

impl Namespace {
    fn as_str(self) -> &'static str {
        match self {
            Namespace::Sys => NS_SYS,
            Namespace::Uci => NS_UCI,
            Namespace::Fs => NS_FS,
        }
    }
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Call a method and print its result
    Call {
        #[arg(value_enum)]
        namespace: Namespace,

        method: String,

        /// String parameters, passed in order
        params: Vec<String>,
    },

    /// Show uptime and network devices, then flip system.ntp.enabled
    Demo,

    /// Save the connection flags as a device profile
    Remember {
        name: String,

        /// Also store the password in the config file
        #[arg(long)]
        store_password: bool,

        /// Make this the default device
        #[arg(long)]
        default: bool,
    },
}

impl Cli {
    /// Run the CLI command
    pub fn run(self) -> Result<()> {
        let config = match self.config {
            Some(ref path) => Config::load(Some(path))
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => Config::load(None).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config: {}, using defaults", e);
                Config::default()
            }),
        };

        match self.command {
            Commands::Call {
                namespace,
                ref method,
                ref params,
            } => {
                let client = connect(&self.connection, &config)?;
                let params: Vec<&str> = params.iter().map(String::as_str).collect();
                let result = client
                    .invoke(namespace.as_str(), method, &params)
                    .with_context(|| format!("{}.{} failed", namespace.as_str(), method))?;
                println!("{}", result);
                Ok(())
            }

            Commands::Demo => {
                let client = connect(&self.connection, &config)?;
                demo(&client, &mut std::io::stdout().lock())
            }

            Commands::Remember {
                ref name,
                store_password,
                default,
            } => {
                let mut config = config;
                let device = profile(name, &self.connection, store_password)?;
                config.upsert_device(device);
                if default {
                    config.default_device = Some(name.clone());
                }
                let path = config.save(self.config.as_deref())?;
                println!("Saved device {} to {}", name, path.display());
                Ok(())
            }
        }
    }
}

/// Resolve endpoint and credentials from flags or a stored profile
fn resolve(args: &ConnectionArgs, config: &Config) -> Result<(ServerEndpoint, Credentials)> {
    let device = match (&args.device, &args.host) {
        (Some(name), _) => Some(
            config
                .get_device(name)
                .with_context(|| format!("unknown device {}", name))?,
        ),
        (None, Some(_)) => None,
        (None, None) => config.default_device(),
    };

    let (mut endpoint, mut credentials) = match device {
        Some(device) => (device.endpoint(), device.credentials(args.password.as_deref())),
        None => {
            let Some(ref host) = args.host else {
                bail!("no router given: pass --host or --device, or set a default device");
            };
            (
                ServerEndpoint::new(host.clone()),
                Credentials::new("root", args.password.clone().unwrap_or_default()),
            )
        }
    };

    if let Some(port) = args.port {
        endpoint.port = port;
    }
    endpoint.use_tls |= args.tls;
    endpoint.verify_tls |= args.verify_tls;
    if let Some(ref username) = args.username {
        credentials.username = username.clone();
    }
    if let Some(timeout) = args.timeout {
        credentials.timeout = timeout;
    }

    Ok((endpoint, credentials))
}

fn connect(args: &ConnectionArgs, config: &Config) -> Result<Client> {
    let (endpoint, credentials) = resolve(args, config)?;
    let base_url = endpoint.base_url();
    Client::new(endpoint, credentials).with_context(|| format!("login to {} failed", base_url))
}

fn profile(name: &str, args: &ConnectionArgs, store_password: bool) -> Result<DeviceConfig> {
    let Some(ref host) = args.host else {
        bail!("--host is required to save a device");
    };

    let mut device = DeviceConfig::new(name, host.clone());
    device.port = args.port.unwrap_or_default();
    device.tls = args.tls;
    device.verify_tls = args.verify_tls;
    if let Some(ref username) = args.username {
        device.username = username.clone();
    }
    if let Some(timeout) = args.timeout {
        device.timeout = timeout;
    }
    if store_password {
        device.password = args.password.clone();
    }
    Ok(device)
}

/// Opposite of a UCI boolean; anything but "1" counts as off
fn flipped(enabled: &str) -> &'static str {
    if enabled == "1" { "0" } else { "1" }
}

fn demo(client: &Client, out: &mut impl Write) -> Result<()> {
    writeln!(out, "{}", client.sys_rpc("uptime", &[])?)?;
    writeln!(out, "{}", client.sys_rpc("net.devices", &[])?)?;

    let enabled = client.uci_rpc("get", &["system", "ntp", "enabled"])?;
    writeln!(out, "{}", enabled)?;

    client.uci_rpc("set", &["system", "ntp", "enabled", flipped(&enabled)])?;
    client.uci_rpc("commit", &["system"])?;

    writeln!(out, "{}", client.uci_rpc("get", &["system", "ntp", "enabled"])?)?;
    Ok(())
}
