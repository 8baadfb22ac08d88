//! pls - Entry Point
//!
//! Command-line front end for creating, listing and pruning sandboxes.

use std::io::Write;
use std::sync::Arc;

use bollard::models::ContainerSummary;
use clap::{Args, Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use pls::docker::BollardClient;
use pls::{Kind, Provisioner, ProxySpec, SandboxSpec, system};

/// pls - Provision Docker-in-Docker sandboxes behind an optional mitmproxy.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Skip daemon preflight checks
    #[arg(long, global = true, default_value = "false")]
    skip_checks: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage dind sandboxes
    Dind {
        #[command(subcommand)]
        action: DindAction,
    },
    /// Manage mitmproxy environments
    Mitm {
        #[command(subcommand)]
        action: MitmAction,
    },
}

#[derive(Subcommand, Debug)]
enum DindAction {
    /// Create a dind container
    Create(DindCreate),
    /// List all dind containers
    #[command(visible_alias = "ls")]
    List(ListArgs),
    /// Remove all dind containers
    Prune,
}

#[derive(Subcommand, Debug)]
enum MitmAction {
    /// Create a mitmproxy container
    Create {
        /// Name for the container, network and volume
        #[arg(long)]
        name: Option<String>,
    },
    /// List all mitmproxy containers
    #[command(visible_alias = "ls")]
    List(ListArgs),
    /// Remove all mitmproxy containers and their networks
    Prune,
}

#[derive(Args, Debug)]
struct DindCreate {
    /// Name for the container
    #[arg(long)]
    name: Option<String>,

    /// Route through an existing mitmproxy container
    #[arg(long, value_name = "NAME")]
    mitm: Option<String>,

    /// Registry to trust and log in to
    #[arg(long, value_name = "ADDRESS")]
    registry: Option<String>,

    /// Registry username
    #[arg(long, requires = "password")]
    username: Option<String>,

    /// Registry password
    #[arg(long, requires = "username")]
    password: Option<String>,
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Print as JSON instead of a table
    #[arg(long, default_value = "false")]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries listings and endpoints.
    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let client = Arc::new(
        BollardClient::connect_with_local_defaults().map_err(pls::Error::DaemonUnreachable)?,
    );

    if cli.skip_checks {
        warn!("Skipping daemon preflight checks (--skip-checks)");
    } else {
        match system::check_all(client.as_ref()).await {
            Ok(info) => {
                info!(
                    "Docker {} (API {}) on {}",
                    info.version, info.api_version, info.platform
                );
            }
            Err(e) => {
                error!("Daemon preflight failed");
                return Err(e.into());
            }
        }
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping after the current step");
                cancel.cancel();
            }
        }
    });

    let provisioner = Provisioner::new(client).with_cancel(cancel);

    match cli.command {
        Command::Dind { action } => match action {
            DindAction::Create(args) => create_dind(&provisioner, args).await,
            DindAction::List(args) => list(&provisioner, Kind::Dind, &args).await,
            DindAction::Prune => prune(&provisioner, Kind::Dind).await,
        },
        Command::Mitm { action } => match action {
            MitmAction::Create { name } => {
                let mut spec = ProxySpec::new();
                if let Some(name) = name {
                    spec = spec.with_name(name);
                }
                let proxy = provisioner.create_proxy(spec).await?;
                info!("Created mitmproxy container '{}'", proxy.name);
                println!("{}", proxy.name);
                Ok(())
            }
            MitmAction::List(args) => list(&provisioner, Kind::Mitm, &args).await,
            MitmAction::Prune => prune(&provisioner, Kind::Mitm).await,
        },
    }
}

async fn create_dind(provisioner: &Provisioner, args: DindCreate) -> Result<()> {
    let spec = SandboxSpec {
        name: args.name,
        proxy_name: args.mitm,
        registry_address: args.registry,
        registry_username: args.username,
        registry_password: args.password,
    };

    let sandbox = provisioner.create_sandbox(spec).await?;
    info!("Created dind container '{}'", sandbox.name);
    if let Some(err) = sandbox.login_error() {
        warn!("Registry login failed: {err}");
    }

    println!("DOCKER_HOST={}", sandbox.endpoint());
    Ok(())
}

async fn list(provisioner: &Provisioner, kind: Kind, args: &ListArgs) -> Result<()> {
    let containers = provisioner.list(kind).await?;

    let mut stdout = std::io::stdout().lock();
    if args.json {
        let json = serde_json::to_string_pretty(&containers).map_err(pls::Error::from)?;
        writeln!(stdout, "{json}").into_diagnostic()?;
    } else {
        write_table(&mut stdout, &containers).into_diagnostic()?;
    }
    Ok(())
}

async fn prune(provisioner: &Provisioner, kind: Kind) -> Result<()> {
    let report = provisioner.prune(kind).await?;
    info!(
        containers = report.containers.len(),
        networks = report.networks.len(),
        "Pruned {}",
        kind.label_value()
    );
    Ok(())
}

fn write_table(out: &mut impl Write, containers: &[ContainerSummary]) -> std::io::Result<()> {
    let rows: Vec<[String; 4]> = containers
        .iter()
        .map(|c| {
            let id = c.id.as_deref().unwrap_or_default();
            let names = c
                .names
                .iter()
                .flatten()
                .map(|n| n.trim_start_matches('/'))
                .collect::<Vec<_>>()
                .join(",");
            [
                id.chars().take(12).collect(),
                c.image.clone().unwrap_or_default(),
                c.status.clone().unwrap_or_default(),
                names,
            ]
        })
        .collect();

    let header = ["CONTAINER ID", "IMAGE", "STATUS", "NAMES"].map(String::from);
    let mut widths = header.clone().map(|h| h.len());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    for row in std::iter::once(&header).chain(&rows) {
        writeln!(
            out,
            "{:<w0$}   {:<w1$}   {:<w2$}   {}",
            row[0],
            row[1],
            row[2],
            row[3],
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2],
        )?;
    }
    Ok(())
}
