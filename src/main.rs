// Net Status Monitor - Main Entry Point
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! # Net Status Monitor
//!
//! Watches NetworkManager on the system bus and reports whether the network
//! is reachable, honouring the local managed-network policy.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::LocalSet;

mod dbus_client;
mod models;
mod services;
mod storage;

use models::{BusKind, Error, Result, StatusSnapshot};
use services::{DbusProvider, NetMonitor};
use storage::SettingsStore;

/// Human-readable application name.
pub const APP_NAME: &str = "Net Status Monitor";

/// Application version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How long `--once` waits for NetworkManager to answer.
const ONCE_TIMEOUT: Duration = Duration::from_secs(5);

/// Command-line options.
#[derive(Debug, Default, PartialEq, Eq)]
struct Options {
    debug: bool,
    once: bool,
    json: bool,
    unmanaged: bool,
    config: Option<PathBuf>,
}

/// What to do after parsing arguments.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Run(Options),
    Help,
    Version,
}

/// Print version information and exit.
fn print_version() {
    println!("{} {}", APP_NAME, VERSION);
    println!("Copyright (C) 2026 Christos A. Daggas");
    println!("License: MIT");
}

/// Print help information and exit.
fn print_help() {
    println!(
        "Usage: {} [OPTIONS]",
        env::args().next().unwrap_or_else(|| "net-status-monitor".to_string())
    );
    println!();
    println!("Reports whether the network is reachable according to NetworkManager.");
    println!();
    println!("Options:");
    println!("  -h, --help         Show this help message and exit");
    println!("  -v, --version      Show version information and exit");
    println!("  -d, --debug        Enable debug logging");
    println!("  -c, --config PATH  Use PATH as the settings file");
    println!("  -o, --once         Print the current status and exit");
    println!("  -j, --json         Print status as JSON");
    println!("      --unmanaged    Ignore NetworkManager for this session");
    println!();
    println!("Environment variables:");
    println!("  RUST_LOG           Set log level (trace, debug, info, warn, error)");
}

fn parse_args<I>(args: I) -> Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut options = Options::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "-v" | "--version" => return Ok(Command::Version),
            "-d" | "--debug" => options.debug = true,
            "-o" | "--once" => options.once = true,
            "-j" | "--json" => options.json = true,
            "--unmanaged" => options.unmanaged = true,
            "-c" | "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| Error::InvalidArgument(format!("{} requires a path", arg)))?;
                options.config = Some(PathBuf::from(path));
            }
            _ => return Err(Error::InvalidArgument(format!("Unknown option: {}", arg))),
        }
    }

    Ok(Command::Run(options))
}

fn init_logging(options: &Options) {
    let level = if options.debug {
        "debug".to_string()
    } else {
        SettingsStore::load_config(options.config.as_deref())
            .map(|config| config.log_level)
            .unwrap_or_else(|| "info".to_string())
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_status(snapshot: &StatusSnapshot, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(snapshot)?);
    } else {
        println!(
            "{} (observed {}, managed {}, {})",
            if snapshot.online { "online" } else { "offline" },
            snapshot.observed.as_str(),
            if snapshot.managed { "yes" } else { "no" },
            if snapshot.attached { "attached" } else { "detached" },
        );
    }
    Ok(())
}

async fn run(options: Options, store: Rc<SettingsStore>) -> Result<()> {
    let settings = store.settings();
    let provider = Rc::new(DbusProvider::new());

    if let Err(e) = provider.connect(BusKind::System).await {
        tracing::warn!("Network assumed up: {}", e);
    }

    let monitor = NetMonitor::new(provider.clone(), store.clone());
    let (status_tx, mut status_rx) = watch::channel(monitor.get_status());
    monitor.on_status_changed(move |online| {
        status_tx.send_replace(online);
    });

    let supervisor = tokio::task::spawn_local(provider.clone().supervise(
        BusKind::System,
        settings.bus_check_interval(),
        settings.bus_failure_threshold(),
    ));

    monitor.startup();

    let result = if options.once {
        if monitor.is_attached()
            && tokio::time::timeout(ONCE_TIMEOUT, status_rx.changed())
                .await
                .is_err()
        {
            tracing::warn!("NetworkManager did not answer within {:?}", ONCE_TIMEOUT);
        }
        print_status(&monitor.snapshot(), options.json)
    } else {
        print_status(&monitor.snapshot(), options.json)?;
        loop {
            tokio::select! {
                changed = status_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    print_status(&monitor.snapshot(), options.json)?;
                }
                signal = tokio::signal::ctrl_c() => {
                    if let Err(e) = signal {
                        tracing::error!("Failed to listen for Ctrl-C: {}", e);
                    }
                    break;
                }
            }
        }
        Ok(())
    };

    monitor.shutdown();
    supervisor.abort();
    result
}

fn main() -> ExitCode {
    let options = match parse_args(env::args().skip(1)) {
        Ok(Command::Help) => {
            print_help();
            return ExitCode::SUCCESS;
        }
        Ok(Command::Version) => {
            print_version();
            return ExitCode::SUCCESS;
        }
        Ok(Command::Run(options)) => options,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("Try '--help' for more information.");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&options);
    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let store = Rc::new(match &options.config {
        Some(path) => SettingsStore::with_settings_file(path.clone()),
        None => SettingsStore::new(),
    });
    if options.unmanaged {
        store.override_managed_network(false);
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to create runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let local = LocalSet::new();
    match local.block_on(&runtime, run(options, store)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
