use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};
use pyramid::camera::types::PowerState;
use pyramid::configuration::{Config, Overrides};
use pyramid::dashboard::{poller, DashboardContext, PollIntervals};
use pyramid::web_interface::WebServer;
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "pyramid")]
#[command(version = "0.1.0")]
#[command(about = "Operator dashboard for the Pyramid security controller")]
struct Args {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(long, short)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Follow telemetry and keep polling until interrupted
    Monitor,
    /// Print the controller status once
    Status,
    Arm,
    Disarm,
    /// Capture a still from a camera into the local vault
    Snapshot { cam: i64 },
    /// Switch a camera on or off
    Power { cam: i64, state: Switch },
    #[command(subcommand)]
    Vault(VaultCommand),
    /// Print the controller log
    Logs,
}

#[derive(Subcommand)]
enum VaultCommand {
    List,
    Purge,
}

#[derive(Clone, Copy, ValueEnum)]
enum Switch {
    On,
    Off,
}

impl From<Switch> for PowerState {
    fn from(switch: Switch) -> Self {
        match switch {
            Switch::On => PowerState::On,
            Switch::Off => PowerState::Off,
        }
    }
}

fn fail(context: &str, e: impl std::fmt::Display) -> ! {
    error!("{}: {}", context, e);
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    println!(
        "
==============================================================================
                        PYRAMID  -  security dashboard
==============================================================================
"
    );

    let args = Args::parse();

    info!("Importing configuration");
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .unwrap_or_else(|e| fail("Unable to import configuration from file", e)),
        None => Config::default(),
    };
    if let Err(e) = config.apply(&args.overrides) {
        fail("Invalid command-line override", e);
    }
    info!("Configuration imported successfully");

    let ctx = Arc::new(
        DashboardContext::from_config(&config)
            .await
            .unwrap_or_else(|e| fail("Unable to start the dashboard", e)),
    );

    match args.command {
        Command::Monitor => monitor(ctx, &config).await,
        Command::Status => {
            if let Some(tiles) = ctx.refresh_status().await {
                println!("System:   {}", tiles.system);
                println!("Alert:    {}", tiles.alert);
                println!("Activity: {}", tiles.activity);
            }
        }
        Command::Arm => {
            if let Err(e) = ctx.arm().await {
                fail("Arm failed", e);
            }
            info!("System armed");
        }
        Command::Disarm => {
            if let Err(e) = ctx.disarm().await {
                fail("Disarm failed", e);
            }
            info!("System disarmed");
        }
        Command::Snapshot { cam } => match ctx.take_snapshot(cam).await {
            Ok(Some(record)) => println!("Saved snapshot #{} ({} bytes)", record.id, record.size()),
            Ok(None) => println!("Captured, but the vault is offline"),
            Err(e) => fail("Snapshot failed", e),
        },
        Command::Power { cam, state } => match ctx.set_power(cam, state.into()).await {
            Ok(power) => println!("Camera {} power {:?}", cam, power),
            Err(e) => fail("Power change failed", e),
        },
        Command::Vault(VaultCommand::List) => {
            let records = ctx
                .vault
                .list_all()
                .await
                .unwrap_or_else(|e| fail("Vault offline", e));
            for record in records {
                let when = record
                    .captured_at()
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| record.timestamp.to_string());
                println!("#{:<6} cam {}  {}  {} bytes", record.id, record.cam_id, when, record.size());
            }
        }
        Command::Vault(VaultCommand::Purge) => match ctx.vault.purge().await {
            Ok(removed) => println!("Removed {} snapshot(s)", removed),
            Err(e) => fail("Purge failed", e),
        },
        Command::Logs => match ctx.refresh_logs().await {
            Ok(lines) => lines.iter().for_each(|line| println!("{}", line)),
            Err(e) => fail("No connection to main controller", e),
        },
    }
}

async fn monitor(ctx: Arc<DashboardContext>, config: &Config) {
    let (stop, shutdown) = watch::channel(false);
    let intervals = PollIntervals {
        status: config.status_interval(),
        gallery: config.gallery_interval(),
    };

    info!("Spawning the dashboard poller");
    let poller = tokio::spawn(poller::run(ctx.clone(), intervals, shutdown));

    let web = config.web.enabled.then(|| {
        let server = WebServer::new(ctx.clone());
        let port = config.web.port;
        tokio::spawn(async move { server.start(port).await })
    });

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");

    let _ = stop.send(true);
    if let Err(e) = poller.await {
        error!("Error joining the poller: {:?}", e);
    }
    if let Some(web) = web {
        web.abort();
    }
}
