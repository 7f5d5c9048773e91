use crate::engine::process::SystemRunner;
use crate::engine::Sequencer;
use crate::model::{ControlConfig, DeviceAddress};
use crate::orchestrator::spawn_controller;
use anyhow::{Context, Result};
use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "ps3-remote",
    version,
    about = "HTTP remote control for a console driven through a controller-emulation process"
)]
pub struct Cli {
    /// Bluetooth address of the console to pair with
    pub device_address: DeviceAddress,

    /// HTTP port to listen on
    #[arg(default_value_t = 9090)]
    pub port: u16,

    /// Address to bind the HTTP listener to
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,

    /// Controller-emulation binary (also the process name looked up for liveness)
    #[arg(long, default_value = "gimx")]
    pub emulator: String,

    /// Controller type the emulator impersonates
    #[arg(long, default_value = "Sixaxis")]
    pub emulator_type: String,

    /// Loopback endpoint between the emulator and the event client
    #[arg(long, default_value = "127.0.0.1:51914")]
    pub endpoint: String,

    /// Process lookup command, invoked as `<cmd> -x <name>`
    #[arg(long, default_value = "pgrep")]
    pub probe_command: String,

    /// Wait after starting the emulator before the activation PS press
    #[arg(long, default_value = "35s")]
    pub boot_delay: humantime::Duration,

    /// Hold time of a regular key press
    #[arg(long, default_value = "100ms")]
    pub press_duration: humantime::Duration,

    /// How long PS is held to open the power menu
    #[arg(long, default_value = "3s")]
    pub power_off_hold: humantime::Duration,

    /// Pause between the two power-off confirmations
    #[arg(long, default_value = "500ms")]
    pub confirm_gap: humantime::Duration,

    /// Interval for re-checking power state against the process table (0s disables)
    #[arg(long, default_value = "30s")]
    pub reconcile_interval: humantime::Duration,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    pub dump_config: bool,
}

/// Build a `ControlConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> ControlConfig {
    let mut cfg = ControlConfig::with_address(args.device_address.clone());
    cfg.emulator = args.emulator.clone();
    cfg.emulator_type = args.emulator_type.clone();
    cfg.endpoint = args.endpoint.clone();
    cfg.probe_command = args.probe_command.clone();
    cfg.boot_delay = Duration::from(args.boot_delay);
    cfg.press_duration = Duration::from(args.press_duration);
    cfg.power_off_hold = Duration::from(args.power_off_hold);
    cfg.confirm_gap = Duration::from(args.confirm_gap);
    let reconcile = Duration::from(args.reconcile_interval);
    cfg.reconcile_interval = (!reconcile.is_zero()).then_some(reconcile);
    cfg
}

pub async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    if args.dump_config {
        println!("{}", serde_json::to_string_pretty(&cfg)?);
        return Ok(());
    }

    let cfg = Arc::new(cfg);
    let sequencer = Sequencer::new(Arc::new(SystemRunner), cfg.clone());
    let (controller, worker) = spawn_controller(sequencer, cfg.clone());

    let addr = SocketAddr::new(args.bind, args.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    log::info!(
        "listening on http://{addr}, controlling {} via {}",
        cfg.device_address,
        cfg.emulator
    );

    crate::server::serve(listener, controller.clone(), shutdown_signal()).await?;

    log::info!(
        "shutting down, last known power state {:?}",
        controller.power_state()
    );
    // Let queued commands finish before exiting.
    drop(controller);
    let _ = worker.await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("failed to listen for ctrl-c: {e}");
        futures::future::pending::<()>().await;
    }
}
