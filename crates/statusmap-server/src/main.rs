use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use statusmap_core::{Credentials, MonitoringBackend, NagiosClient, ServiceConfig, StatusService};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod routes;

#[derive(Debug, Parser)]
#[command(name = "statusmapd")]
#[command(about = "Site status aggregation service for the map dashboard")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, default_value = "./data/locations.csv")]
    locations_file: PathBuf,

    #[arg(long, default_value = "./data/hosts.csv")]
    hosts_file: PathBuf,

    #[arg(long)]
    nagios_url: Option<String>,

    #[arg(long)]
    nagios_user: Option<String>,

    #[arg(long)]
    nagios_pass: Option<String>,

    #[arg(long, default_value_t = 10)]
    cache_ttl_secs: u64,

    #[arg(long, default_value_t = 8)]
    probe_timeout_secs: u64,

    #[arg(long, default_value_t = 8)]
    probe_concurrency: usize,
}

#[derive(Debug, Subcommand)]
enum Command {
    Serve {
        #[arg(long, default_value = "0.0.0.0:8080")]
        listen: String,
        #[arg(long, default_value = "./static")]
        static_dir: PathBuf,
    },
    Probe {
        #[arg(long)]
        host: String,
    },
    Sites,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let config = ServiceConfig {
        freshness_window: Duration::from_secs(cli.cache_ttl_secs),
        probe_timeout: Duration::from_secs(cli.probe_timeout_secs),
        probe_concurrency: cli.probe_concurrency,
    };

    match &cli.command {
        Command::Serve { listen, static_dir } => {
            let client = nagios_client(&cli, config.probe_timeout)?;
            let service =
                StatusService::new(client, config, &cli.locations_file, &cli.hosts_file)?;
            serve(service, listen, static_dir).await?;
        }
        Command::Probe { host } => {
            let client = nagios_client(&cli, config.probe_timeout)?;
            let status = client.query(host).await?;
            let out = serde_json::json!({ "host": host, "status": status });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Command::Sites => {
            let sites = statusmap_core::load_sites(&cli.locations_file, &cli.hosts_file)?;
            println!("{}", serde_json::to_string_pretty(&sites)?);
        }
    }

    Ok(())
}

fn nagios_client(cli: &Cli, timeout: Duration) -> Result<NagiosClient> {
    let base_url = resolve(cli.nagios_url.clone(), "NAGIOS_URL")
        .context("nagios url missing: pass --nagios-url or set NAGIOS_URL")?;
    let username = resolve(cli.nagios_user.clone(), "NAGIOS_USER")
        .context("nagios user missing: pass --nagios-user or set NAGIOS_USER")?;
    let password = resolve(cli.nagios_pass.clone(), "NAGIOS_PASS")
        .context("nagios password missing: pass --nagios-pass or set NAGIOS_PASS")?;

    NagiosClient::new(base_url, Credentials { username, password }, timeout)
        .context("failed to build monitoring http client")
}

fn resolve(flag: Option<String>, env_var: &str) -> Option<String> {
    flag.or_else(|| env::var(env_var).ok().filter(|v| !v.is_empty()))
}

async fn serve(
    service: StatusService<NagiosClient>,
    listen: &str,
    static_dir: &Path,
) -> Result<()> {
    let state = routes::AppState {
        service: Arc::new(service),
    };
    let app = routes::build_router(state, static_dir);

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("failed to bind {listen}"))?;
    info!(addr = %listen, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    warn!("received ctrl-c, stopping");
}
