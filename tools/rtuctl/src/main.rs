//! rtuctl - operator tool for RTU field-bus links
//!
//! Issues master requests against a serial line, runs a register-bank slave
//! simulator, and computes frame checksums offline.

mod logging;
mod simulator;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use rtu_link::{
    checksum, load_config, serial, Master, RtuConfig, RtuError, SerialTransport, SlaveResponder,
};

use crate::simulator::RegisterBank;

#[derive(Parser)]
#[command(name = "rtuctl")]
#[command(about = "RTU field-bus master, slave simulator and checksum utility")]
#[command(version)]
struct Cli {
    /// Configuration file (toml, yaml or json)
    #[arg(short, long, global = true, env = "RTU_CONFIG")]
    config: Option<PathBuf>,

    /// Serial device, overrides serial.port
    #[arg(short, long, global = true)]
    port: Option<String>,

    /// Baud rate, overrides serial.baud_rate
    #[arg(short, long, global = true)]
    baud: Option<u32>,

    /// Transmit/receive timeout in milliseconds (0 selects the default)
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Extra attempts after a timeout or checksum failure
    #[arg(long, global = true)]
    retries: Option<u8>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read holding registers (FC03)
    Read {
        /// Slave address (1-247)
        #[arg(short, long)]
        slave: u8,
        /// First register address
        #[arg(long, value_parser = parse_u16)]
        start: u16,
        /// Number of registers (1-125)
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u16,
    },

    /// Write a single holding register (FC06)
    Write {
        #[arg(short, long)]
        slave: u8,
        #[arg(short, long, value_parser = parse_u16)]
        address: u16,
        #[arg(long, value_parser = parse_u16)]
        value: u16,
    },

    /// Write consecutive holding registers (FC16)
    WriteMulti {
        #[arg(short, long)]
        slave: u8,
        #[arg(long, value_parser = parse_u16)]
        start: u16,
        /// Comma separated values, e.g. `10,0x20,30`
        #[arg(long, value_delimiter = ',', value_parser = parse_u16, required = true)]
        values: Vec<u16>,
    },

    /// Answer requests from an in-memory register bank
    Serve {
        /// Slave address, overrides slave.address
        #[arg(short, long)]
        address: Option<u8>,
        /// Number of holding registers
        #[arg(long, default_value_t = 100)]
        size: usize,
        /// Initial register value
        #[arg(long, default_value = "0", value_parser = parse_u16)]
        init: u16,
        /// Stop after this many answered requests
        #[arg(long)]
        max_requests: Option<u64>,
    },

    /// Print the checksum of a hex-encoded frame body
    Crc {
        /// Frame bytes without checksum, e.g. `01 03 00 00 00 02`
        #[arg(required = true, num_args = 1..)]
        hex: Vec<String>,
    },

    /// List serial ports
    Ports,
}

/// Decimal or `0x`-prefixed hexadecimal register value
fn parse_u16(s: &str) -> std::result::Result<u16, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse::<u16>(),
    };
    parsed.map_err(|e| format!("invalid register value '{s}': {e}"))
}

/// Hex arguments joined into bytes; whitespace is ignored
fn parse_hex_bytes(parts: &[String]) -> Result<Vec<u8>> {
    let joined: String = parts
        .iter()
        .flat_map(|p| p.chars())
        .filter(|c| !c.is_whitespace())
        .collect();
    let joined = joined
        .strip_prefix("0x")
        .or_else(|| joined.strip_prefix("0X"))
        .unwrap_or(&joined);
    hex::decode(joined).with_context(|| format!("invalid hex input '{joined}'"))
}

fn format_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn apply_overrides(config: &mut RtuConfig, cli: &Cli) {
    if let Some(port) = &cli.port {
        config.serial.port = port.clone();
    }
    if let Some(baud) = cli.baud {
        config.serial.baud_rate = baud;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.master.timeout_ms = timeout_ms;
        config.slave.timeout_ms = timeout_ms;
    }
    if let Some(retries) = cli.retries {
        config.master.retry_count = retries;
        config.slave.retry_count = retries;
    }
}

/// Open the configured port with stale input discarded
fn open_port(config: &RtuConfig) -> Result<SerialTransport> {
    let mut transport = SerialTransport::open(&config.serial)
        .with_context(|| format!("failed to open {}", config.serial.port))?;
    transport
        .clear_input()
        .with_context(|| format!("failed to flush {}", transport.name()))?;
    Ok(transport)
}

fn open_master(config: &RtuConfig) -> Result<Master<SerialTransport>> {
    Ok(Master::with_config(open_port(config)?, config.master.clone()))
}

/// Protocol error code carried anywhere in the chain, e.g. `RTU_TIMEOUT`
fn protocol_error_code(err: &anyhow::Error) -> Option<&'static str> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<RtuError>())
        .map(RtuError::error_code)
}

fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Err(err) = run(cli) {
        match protocol_error_code(&err) {
            Some(code) => eprintln!("{} [{}] {:#}", "Error:".red().bold(), code, err),
            None => eprintln!("{} {:#}", "Error:".red().bold(), err),
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    logging::init(cli.verbose, cli.no_color)?;

    // Offline commands need no configuration
    match &cli.command {
        Commands::Crc { hex } => return cmd_crc(hex),
        Commands::Ports => return cmd_ports(),
        _ => {},
    }

    let mut config = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    apply_overrides(&mut config, &cli);

    match &cli.command {
        Commands::Read {
            slave,
            start,
            count,
        } => {
            let mut master = open_master(&config)?;
            let values = master
                .read_holding_registers(*slave, *start, *count)
                .with_context(|| format!("read from slave {slave} failed"))?;

            println!(
                "{} slave {} registers {}..{}",
                "✓".green(),
                slave,
                start,
                u32::from(*start) + values.len() as u32
            );
            for (offset, value) in values.iter().enumerate() {
                let address = u32::from(*start) + offset as u32;
                println!(
                    "  {:>5}  {:>5}  {}",
                    address.to_string().cyan(),
                    value,
                    format!("0x{value:04X}").dimmed()
                );
            }
        },
        Commands::Write {
            slave,
            address,
            value,
        } => {
            let mut master = open_master(&config)?;
            master
                .write_single_register(*slave, *address, *value)
                .with_context(|| format!("write to slave {slave} failed"))?;
            println!(
                "{} slave {} register {} = {}",
                "✓".green(),
                slave,
                address,
                value
            );
        },
        Commands::WriteMulti {
            slave,
            start,
            values,
        } => {
            let mut master = open_master(&config)?;
            master
                .write_multiple_registers(*slave, *start, values)
                .with_context(|| format!("write to slave {slave} failed"))?;
            println!(
                "{} slave {} wrote {} registers from {}",
                "✓".green(),
                slave,
                values.len(),
                start
            );
        },
        Commands::Serve {
            address,
            size,
            init,
            max_requests,
        } => {
            if *size == 0 || *size > usize::from(u16::MAX) + 1 {
                bail!("--size must be between 1 and 65536");
            }
            if let Some(address) = address {
                config.slave.address = *address;
            }
            let identity = config.slave.identity().context("invalid slave settings")?;
            let transport = open_port(&config)?;
            println!(
                "{} serving slave {} on {}",
                "→".cyan(),
                identity.address(),
                transport.name()
            );
            let mut responder = SlaveResponder::new(transport);
            let mut bank = RegisterBank::new(*size, *init);

            let stats = simulator::serve(&mut responder, &identity, &mut bank, *max_requests)
                .context("simulator stopped")?;
            println!(
                "{} served {} requests ({} exceptions, {} dropped)",
                "✓".green(),
                stats.requests,
                stats.exceptions,
                stats.dropped
            );
        },
        Commands::Crc { .. } | Commands::Ports => {},
    }

    Ok(())
}

fn cmd_crc(parts: &[String]) -> Result<()> {
    let body = parse_hex_bytes(parts)?;
    let crc = checksum(&body);

    let mut frame = body;
    frame.extend_from_slice(&crc.to_le_bytes());

    println!("{} 0x{:04X}", "CRC:".bold(), crc);
    println!("{} {}", "Frame:".bold(), format_bytes(&frame));
    Ok(())
}

fn cmd_ports() -> Result<()> {
    let ports = serial::available_ports();
    if ports.is_empty() {
        println!("{}", "No serial ports found".yellow());
        return Ok(());
    }
    for port in ports {
        println!("  {}", port);
    }
    Ok(())
}
