// Copyright (C) 2026 Brian Johnson
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.


// Receipt printer link over RS-232
mod charset;
mod config;
mod error;
mod frame;
mod printer;
mod protocol;
mod serial;
mod session;

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use clap::{Parser, Subcommand};
use log::warn;
use config::{CutMode, JobConfig, Preset};
use printer::Printer;
use serial::SystemPorts;

#[derive(Parser)]
#[command(name = "receipt-link")]
#[command(about = "Print text on a serial receipt printer using framed packets or raw ESC/POS", long_about = None)]
#[command(disable_help_subcommand = true)]
struct Cli {
    /// Serial port to use (e.g., /dev/ttyUSB0 or COM4)
    #[arg(short, long)]
    port: Option<String>,

    /// Transport preset: baud rate, timing and protocol
    #[arg(long, value_enum, default_value = "packet")]
    preset: Preset,

    /// Override the preset's baud rate
    #[arg(short, long)]
    baud: Option<u32>,

    /// Override the acknowledgment deadline per frame
    #[arg(long, value_name = "MS")]
    ack_timeout_ms: Option<u64>,

    /// Resend a frame this many times after a NAK or timeout
    #[arg(long, value_name = "N")]
    retries: Option<u8>,

    /// Character set to try, in order (repeatable; replaces the Korean defaults)
    #[arg(long = "charset", value_name = "LABEL")]
    charsets: Vec<String>,

    /// Paper cut to finish with
    #[arg(long, value_enum)]
    cut: Option<CutMode>,

    /// Enable debug output
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print text (from the argument, a file, or stdin)
    Print {
        /// Text to print
        text: Option<String>,

        /// Read the text from a file
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },
    /// Feed five blank lines and cut, to check the link and cutter
    Test,
    /// List available serial ports
    Ports,
}

fn job_config(cli: &Cli) -> JobConfig {
    let mut config = JobConfig::from_preset(cli.preset);

    if let Some(baud) = cli.baud {
        config.link.baud_rate = baud;
    }
    if let Some(ms) = cli.ack_timeout_ms {
        config.link.ack_timeout = Duration::from_millis(ms);
    }
    if let Some(retries) = cli.retries {
        config.link.retries = retries;
    }
    if !cli.charsets.is_empty() {
        config.charsets = cli.charsets.clone();
    }
    if let Some(cut) = cli.cut {
        config.cut = cut;
    }

    config
}

fn read_text(text: Option<String>, file: Option<PathBuf>) -> std::io::Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }
    if let Some(file) = file {
        return std::fs::read_to_string(file);
    }
    let mut text = String::new();
    std::io::stdin().read_to_string(&mut text)?;
    Ok(text)
}

fn require_port(port: Option<String>) -> String {
    match port {
        Some(port) => port,
        None => {
            eprintln!("Error: --port is required");
            std::process::exit(1);
        }
    }
}

fn open_printer(port: &str, config: JobConfig) -> Printer<SystemPorts> {
    println!("Opening serial port: {}", port);
    println!("Settings: {} baud, 8N1, {:?} transport", config.link.baud_rate, config.mode);

    let abort = Arc::new(AtomicBool::new(false));
    let flag = abort.clone();
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        warn!("Ctrl-C handler not installed: {}", e);
    }

    Printer::new(SystemPorts, config).with_abort(abort)
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = job_config(&cli);

    match cli.command {
        Commands::Ports => {
            match serial::available_ports() {
                Ok(ports) if ports.is_empty() => println!("No serial ports found"),
                Ok(ports) => ports.iter().for_each(|p| println!("{}", p)),
                Err(e) => {
                    eprintln!("Failed to list serial ports: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Test => {
            let port = require_port(cli.port);
            let printer = open_printer(&port, config);
            if let Err(e) = printer.self_test(&port) {
                eprintln!("Self test failed: {}", e);
                std::process::exit(1);
            }
            println!("Self test passed!");
        }
        Commands::Print { text, file } => {
            let port = require_port(cli.port);

            let text = match read_text(text, file) {
                Ok(t) => t,
                Err(e) => {
                    eprintln!("Failed to read text: {}", e);
                    std::process::exit(1);
                }
            };

            let printer = open_printer(&port, config);
            match printer.print(&port, &text) {
                Ok(report) => {
                    if report.retries > 0 {
                        println!("Printed with {} resent frames", report.retries);
                    }
                    println!("Receipt printed successfully!");
                }
                Err(e) => {
                    eprintln!("Print failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}
