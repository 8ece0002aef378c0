mod config;
mod manager;
mod report;

use clap::{Parser, Subcommand};
use config::DaemonConfig;
use manager::{Mode, SessionManager};
use report::Reporter;
use std::path::PathBuf;
use std::sync::Arc;
use tether_boot::DirStorage;
use tether_usb::{SCAN_INTERVAL, UsbEvent, UsbWatcher};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tether")]
#[command(about = "Boot and bridge USB-attached BeagleBone-class devices")]
struct Cli {
    /// JSON config file; flags given on the command line take precedence
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve BOOTP/ARP/TFTP to a device in its boot ROM or SPL stage
    Boot {
        /// Directory holding the boot images
        #[arg(long)]
        bin_dir: Option<PathBuf>,

        /// Image served to the boot ROM
        #[arg(long)]
        rom_image: Option<String>,

        /// Image served to SPL
        #[arg(long)]
        spl_image: Option<String>,
    },
    /// Give a booted Linux device network access through this host's LAN
    Bridge {
        /// LAN interface to bridge onto; defaults to the default-route interface
        #[arg(long)]
        interface: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = DaemonConfig::load(cli.config.as_deref())?;

    let mode = match cli.command {
        Commands::Boot {
            bin_dir,
            rom_image,
            spl_image,
        } => {
            if let Some(dir) = bin_dir {
                config.bin_dir = dir;
            }
            if let Some(name) = rom_image {
                config.boot.rom_image = name;
            }
            if let Some(name) = spl_image {
                config.boot.spl_image = name;
            }
            tracing::info!(
                bin_dir = %config.bin_dir.display(),
                server_ip = %config.boot.server_ip,
                device_ip = %config.boot.device_ip,
                "Boot server"
            );
            Mode::Boot {
                config: Arc::new(config.boot),
                storage: Arc::new(DirStorage::new(&config.bin_dir)),
            }
        }
        Commands::Bridge { interface } => {
            if interface.is_some() {
                config.bridge.interface = interface;
            }
            Mode::Bridge {
                settings: config.bridge,
            }
        }
    };

    run(mode).await
}

async fn run(mode: Mode) -> Result<(), Box<dyn std::error::Error>> {
    let (watcher, mut usb_events) = UsbWatcher::start(SCAN_INTERVAL)?;
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let mut reporter = Reporter::new(mode.stages(), std::io::stdout());
    let mut manager = SessionManager::new(mode, events_tx);

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    tracing::info!("Waiting for devices");
    loop {
        tokio::select! {
            event = usb_events.recv() => match event {
                Some(UsbEvent::Attached(device)) => manager.attach(device),
                Some(UsbEvent::Detached { bus, address, class }) => {
                    manager.detach((bus, address), class).await
                }
                None => break,
            },
            Some(event) = events.recv() => reporter.handle(&event)?,
            line = stdin.next_line(), if stdin_open => match line? {
                Some(line) if reporter.console_active() => {
                    manager.console(&format!("{}\n", line)).await
                }
                Some(_) => tracing::debug!("No console yet, input dropped"),
                None => stdin_open = false,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    manager.shutdown().await;
    drop(watcher);
    Ok(())
}
