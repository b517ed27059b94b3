use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use log::{error, info};
use tokio::sync::mpsc;

use serial_wedge::prelude::*;
use serial_wedge::serial::{COMMON_BAUD_RATES, list_ports};

/// Types numeric readings from a serial instrument into the focused window.
#[derive(Debug, Parser)]
#[command(name = "serial_wedge", version, about)]
struct Cli {
    /// Serial port to read from, e.g. COM3 or /dev/ttyUSB0
    #[arg(short, long, required_unless_present = "list_ports")]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long, default_value_t = 9600)]
    baud: u32,

    /// Parity: none, odd, even, mark or space
    #[arg(long, default_value = "odd")]
    parity: Parity,

    /// Data bits per byte (5-9)
    #[arg(long, default_value_t = 8)]
    byte_size: u8,

    /// Stop bits: 1, 1.5 or 2
    #[arg(long, default_value = "1")]
    stop_bits: StopBits,

    /// Read timeout in milliseconds; also bounds how long a stop request waits
    #[arg(long, default_value_t = 2000)]
    timeout_ms: u64,

    /// List available serial ports and exit
    #[arg(long)]
    list_ports: bool,
}

impl Cli {
    fn config(&self) -> Result<SerialConfig> {
        SerialConfig::builder(self.port.clone().unwrap_or_default())
            .baud_rate(self.baud)
            .parity(self.parity)
            .byte_size(self.byte_size)
            .stop_bits(self.stop_bits)
            .read_timeout(Duration::from_millis(self.timeout_ms))
            .build()
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if cli.list_ports {
        return print_ports();
    }

    let config = match cli.config() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    if !COMMON_BAUD_RATES.contains(&config.baud_rate()) {
        info!("Using non-standard baud rate {}", config.baud_rate());
    }

    match run(config).await {
        Ok(WedgeSignal::Aborted) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Opens the port, runs the wedge until Ctrl-C or disconnect, and returns the
/// signal that ended it.
async fn run(config: SerialConfig) -> Result<WedgeSignal> {
    let connection = SerialConnection::open(&config)?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut session = Session::new(tx);
    session.start(connection, EnigoEmitter::new, config.read_timeout())?;
    info!("Typing readings from {}, press Ctrl-C to stop", config.port());

    loop {
        tokio::select! {
            Some(signal) = rx.recv() => {
                tokio::task::block_in_place(|| session.finish(&signal))?;
                return Ok(signal);
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                session.stop()?;
            }
        }
    }
}

fn print_ports() -> ExitCode {
    match list_ports() {
        Ok(ports) if ports.is_empty() => {
            println!("No serial ports found");
            ExitCode::SUCCESS
        }
        Ok(ports) => {
            for port in ports {
                println!("{port}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
