use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

mod api;
mod external_ip;
mod hosts;
mod server;
mod settings;
mod updater;

use hosts::HostsFile;
use settings::Settings;
use updater::Updater;

/// Dynamic DNS updater for the netcup CCP DNS API.
#[derive(Parser, Debug)]
#[command(name = "netcup-ddns", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Synchronize zone ttl and records with the hosts file, once.
    ///
    /// Hosts without an explicit destination get the current external
    /// IP. Entries are not sanity-checked, review the hosts file before
    /// applying.
    Run {
        /// Settings file with the api credentials.
        conf: PathBuf,
        /// Hosts file declaring the desired records per zone.
        hosts: PathBuf,
        /// Write pending changes instead of only reporting them.
        #[arg(short, long)]
        update: bool,
        /// Debugging output.
        #[arg(short, long)]
        verbose: bool,
        /// Change every zone's ttl to this value.
        #[arg(short, long)]
        ttl: Option<u32>,
    },
    /// Serve the keyed per-host update route over http.
    Serve {
        /// Settings file with the api credentials and subdomain mapping.
        conf: PathBuf,
        /// Port to listen on.
        #[arg(short, long, default_value_t = 8081, env = "DYNDNS_PORT")]
        port: u16,
    },
}

fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {
        Command::Run {
            conf,
            hosts,
            update,
            verbose,
            ttl,
        } => run(conf, hosts, update, verbose, ttl).await,
        Command::Serve { conf, port } => serve(conf, port).await,
    }
}

async fn run(
    conf: PathBuf,
    hosts: PathBuf,
    update: bool,
    verbose: bool,
    ttl: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    init_tracing(if verbose { "debug" } else { "info" });

    let settings = Settings::load(&conf)?;
    let hosts = HostsFile::load(&hosts)?;

    let ip = external_ip::resolve(&settings).await?;
    info!(%ip, "found external ip");

    let session = api::NcClient::new(&settings)?.login().await?;
    let result = Updater::new(&session)
        .apply(update)
        .ttl_override(ttl)
        .run(&hosts, ip)
        .await;
    // close the session even when a zone failed mid-run
    if let Err(e) = session.logout().await {
        warn!(error = %e, "logout failed");
    }

    result?;
    Ok(())
}

async fn serve(conf: PathBuf, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load(&conf)?;
    init_tracing(settings.log_level.as_deref().unwrap_or("info"));

    server::run(settings, &conf, port).await?;
    Ok(())
}
