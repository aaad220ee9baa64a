// src/main.rs
mod config;
mod drivers;
mod engine;
mod recorder;
mod types;
use std::path::PathBuf;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::SyncConfig;
use engine::{open_serial, run_sync, unify, SyncEngine};
use types::RemoteFileRef;
/// Pull sensor CSV logs off a device's SPIFFS over its serial console.
#[derive(Parser, Debug)]
#[command(name = "spiffs-sync", version, about)]
struct Cli {
    /// JSON config file; flags below override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Serial port, e.g. /dev/ttyUSB0 or COM4
    #[arg(short, long, global = true)]
    port: Option<String>,
    #[arg(short, long, global = true)]
    baud: Option<u32>,
    /// Where local files and the unified file are written
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,
    /// Only lines starting with this are data rows
    #[arg(long, global = true, conflicts_with = "any_row")]
    row_prefix: Option<String>,
    /// Accept every line as a candidate data row
    #[arg(long, global = true)]
    any_row: bool,
    /// -v for debug, -vv for trace
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Option<Command>,
}
#[derive(Subcommand, Debug)]
enum Command {
    /// Download every CSV from the device and unify them (default)
    Sync,
    /// List CSV files on the device
    Ls,
    /// Delete one file from the device
    Rm { path: String },
    /// Unify the local CSV files only, without touching the device
    Unify,
}
impl Cli {
    fn resolve_config(&self) -> Result<SyncConfig> {
        let mut config = match &self.config {
            Some(path) => SyncConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => SyncConfig::default(),
        };
        if let Some(port) = &self.port {
            config.port = port.clone();
        }
        if let Some(baud) = self.baud {
            config.baud_rate = baud;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if self.any_row {
            config.row_prefix = None;
        } else if let Some(prefix) = &self.row_prefix {
            config.row_prefix = Some(prefix.clone());
        }
        config.validate()?;
        Ok(config)
    }
}
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}
// 入口函数
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = cli.resolve_config()?;
    match cli.command.as_ref().unwrap_or(&Command::Sync) {
        Command::Sync => {
            let transport = open_serial(&config).context("connecting to device")?;
            let report = run_sync(transport, &config).context("synchronization aborted")?;
            for outcome in &report.outcomes {
                println!(
                    "{} -> {}: {}",
                    outcome.remote,
                    outcome.local.display(),
                    outcome.status
                );
            }
            if !report.no_files() {
                println!("{}", report.summary());
            }
        }
        Command::Ls => {
            let transport = open_serial(&config).context("connecting to device")?;
            let mut engine = SyncEngine::new(transport, &config);
            let files = engine.list().context("listing device files")?;
            engine.close();
            for file in files {
                println!("{file}");
            }
        }
        Command::Rm { path } => {
            let transport = open_serial(&config).context("connecting to device")?;
            let mut engine = SyncEngine::new(transport, &config);
            let reply = engine
                .remove(&RemoteFileRef::new(path.as_str()))
                .with_context(|| format!("removing {path}"))?;
            engine.close();
            if !reply.is_empty() {
                println!("{reply}");
            }
        }
        Command::Unify => {
            let report = unify(&config).context("unifying local files")?;
            println!(
                "{} files unified into {} ({} rows)",
                report.files,
                report.output.display(),
                report.rows
            );
        }
    }
    Ok(())
}
