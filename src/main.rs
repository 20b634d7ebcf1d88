//! Dynamic forward proxy.
//!
//! An HTTP/HTTPS forward proxy that decides, per outbound connection,
//! whether to reach the origin directly or through an upstream proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌──────────────────────────────────────────────┐
//!                          │               DYNAMIC PROXY                  │
//!     Client Request       │  ┌─────────┐    ┌─────────┐    ┌─────────┐   │
//!     ─────────────────────┼─▶│   net   │───▶│  http   │───▶│  hook   │   │
//!                          │  │listener │    │ server  │    └────┬────┘   │
//!                          │  └─────────┘    └─────────┘         │        │
//!                          │                                     ▼        │
//!                          │                          ┌──────────────────┐│
//!                          │                          │ routing::policy  ││
//!                          │                          │ exceptions first ││
//!                          │                          └───────┬──────────┘│
//!                          │                   Direct ┌───────┴───────┐ ViaUpstream
//!                          │                          ▼               ▼   │
//!                          │                     origin host    upstream proxy
//!                          └──────────────────────────────────────────────┘
//! ```

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use dynamic_proxy::config::loader::normalize_listen_addr;
use dynamic_proxy::config::validation::validate_config;
use dynamic_proxy::config::{load_config, ConfigError};
use dynamic_proxy::lifecycle::signals;
use dynamic_proxy::net::Listener;
use dynamic_proxy::observability::logging;
use dynamic_proxy::{ProxyConfig, ProxyServer, RoutingPolicy, Shutdown};

#[derive(Parser)]
#[command(name = "dynamic-proxy")]
#[command(about = "Forward proxy with per-host upstream routing", long_about = None)]
struct Cli {
    /// TOML configuration file. Environment variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, e.g. `127.0.0.1:8080` or `:8080`.
    #[arg(short, long)]
    listen: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the proxy (default)
    Serve,
    /// Validate the configuration and print the routing setup
    Check,
    /// Print the routing decision for each host
    Route {
        #[arg(required = true)]
        hosts: Vec<String>,

        /// Emit one JSON object per host
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let loaded = load_config(cli.config.as_deref())?;
    let mut config = loaded.config;
    if let Some(listen) = &cli.listen {
        config.listener.bind_address = normalize_listen_addr(listen);
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            logging::init(&config.observability);
            for warning in &loaded.warnings {
                tracing::warn!("{}", warning);
            }
            serve(config).await
        }
        Commands::Check => {
            for warning in &loaded.warnings {
                eprintln!("warning: {}", warning);
            }
            let policy = RoutingPolicy::from_config(&config.routing)?;
            print_setup(&config, &policy);
            Ok(())
        }
        Commands::Route { hosts, json } => {
            let policy = RoutingPolicy::from_config(&config.routing)?;
            for host in hosts {
                let decision = policy.decide(&host);
                if json {
                    let mut value = serde_json::to_value(&decision)?;
                    value["host"] = serde_json::Value::String(host);
                    println!("{}", value);
                } else {
                    match decision {
                        dynamic_proxy::RoutingDecision::Direct => println!("{host} -> direct"),
                        dynamic_proxy::RoutingDecision::ViaUpstream { host: up, port } => {
                            println!("{host} -> via {}", format_authority(&up, port))
                        }
                    }
                }
            }
            Ok(())
        }
    }
}

async fn serve(config: ProxyConfig) -> Result<(), Box<dyn Error>> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "dynamic-proxy starting");

    let server = ProxyServer::new(config.clone())?;
    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    signals::trigger_on_signal(shutdown);

    server.run(listener, receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn print_setup(config: &ProxyConfig, policy: &RoutingPolicy) {
    println!("listen:      {}", config.listener.bind_address);
    match policy.upstream() {
        Some(upstream) => println!("upstream:    {}", upstream),
        None => println!("upstream:    none (all traffic direct)"),
    }
    if policy.exceptions().is_empty() {
        println!("exceptions:  none");
    } else {
        println!("exceptions:");
        for suffix in policy.exceptions().iter() {
            println!("  - {}", suffix);
        }
    }
    println!(
        "proxy auth:  {}",
        if config.auth.credentials.is_some() { "required" } else { "off" }
    );
}

fn format_authority(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}
