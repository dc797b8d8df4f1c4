use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use log::{LevelFilter, info};

mod bluetooth;
mod client;
mod command;
mod config;
mod dispatcher;
mod error;
mod messages;
mod payload;
mod radio;
mod scanner;
mod serial;
#[cfg(test)]
mod testing;

use command::Command;
use config::{AppConfig, ControllerConfig, DispatcherConfig};

#[derive(Parser, Debug)]
#[command(version, about = "Set every nearby light to one color on a serial command")]
struct Cli {
    /// Path to the TOML config file; missing file means defaults.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Serial device, overriding the config file.
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate, overriding the config file.
    #[arg(short, long)]
    baud: Option<u32>,

    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Wait for commands on the serial link and drive the lights (default).
    Listen,
    /// Send one command over the serial link and print the first reply.
    Send {
        #[arg(value_enum)]
        color: Command,
    },
}

fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if !path.exists() {
        info!("No config at {}, using defaults", path.display());
        return Ok(AppConfig::default());
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    toml::de::from_str(&contents).with_context(|| format!("Parsing {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::formatted_timed_builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let port = cli.port.as_deref().unwrap_or(config.serial_path());
    let baud = cli.baud.unwrap_or(config.baud_rate());

    match cli.mode.unwrap_or(Mode::Listen) {
        Mode::Listen => listen(&config, port, baud).await,
        Mode::Send { color } => send(port, baud, color).await,
    }
}

async fn listen(config: &AppConfig, port: &str, baud: u32) -> anyhow::Result<()> {
    let transport = serial::open(port, baud)?;
    let radio = bluetooth::BtleRadio::open(config.adapter_index()).await?;
    info!("Listening on {port} at {baud} baud");

    let scanner = scanner::Scanner::new(ControllerConfig::default());
    let mut dispatcher =
        dispatcher::Dispatcher::new(transport, radio, scanner, DispatcherConfig::default());

    tokio::select! {
        result = dispatcher.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            Ok(())
        }
    }
}

async fn send(port: &str, baud: u32, color: Command) -> anyhow::Result<()> {
    let mut transport = serial::open(port, baud)?;
    let response = client::send_command(&mut transport, color)
        .await
        .with_context(|| format!("Talking to {port}"))?;

    println!("Command sent: {color}\n\nResponse:");
    match response {
        Some(line) => println!("{line}"),
        None => println!("No response received from peripheral device"),
    }
    Ok(())
}
