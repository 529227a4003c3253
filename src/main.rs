//! pc_meter - Host Metrics over Serial
//!
//! Finds the display board, connects, and streams a metrics line every
//! interval until interrupted.

use clap::{Args, Parser, Subcommand, ValueEnum};
use pc_meter::{
    serial::{find_device, list_ports, DEFAULT_KEYWORDS},
    MetricsProvider, Sample, StreamConfig, SystemCollector, SystemError, DEFAULT_BAUD_RATE,
    DEFAULT_INTERVAL_MS, DEFAULT_SETTLE_DELAY_MS,
};
use std::process::ExitCode;
use tracing::{error, Level};
use tracing_subscriber::{filter::LevelFilter, EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "pc_meter")]
#[command(about = "Stream host CPU, RAM, disk, temperature and GPU load to a serial display")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Austin Couch")]
#[command(
    long_about = "Samples host system metrics and sends them as `cpu,ram,disk,temp,gpu` lines \
                  to a microcontroller over USB serial"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    link: LinkArgs,

    /// Enable verbose logging (every sent line)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Args, Clone)]
struct LinkArgs {
    /// Serial port to use instead of auto-detection (e.g. /dev/ttyUSB0, COM3)
    #[arg(short, long, global = true)]
    port: Option<String>,

    /// Serial baud rate
    #[arg(short, long, global = true, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Delay between transmitted lines in milliseconds
    #[arg(short, long, global = true, default_value_t = DEFAULT_INTERVAL_MS)]
    interval: u64,

    /// Delay after connecting while the board resets, in milliseconds
    #[arg(long, global = true, default_value_t = DEFAULT_SETTLE_DELAY_MS)]
    settle: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover the board and stream metrics (default)
    Stream,

    /// List serial ports and show which one would be picked
    Ports,

    /// Collect a single sample, print it and exit
    Snapshot(SnapshotArgs),
}

#[derive(Args)]
struct SnapshotArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = SnapshotFormat::Pretty)]
    format: SnapshotFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum SnapshotFormat {
    /// The exact line that would be sent
    Line,
    Json,
    Pretty,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli) {
        eprintln!("failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    let result = match &cli.command {
        None | Some(Commands::Stream) => {
            print_banner();
            stream_command(&cli.link).await
        }
        Some(Commands::Ports) => ports_command(),
        Some(Commands::Snapshot(args)) => snapshot_command(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report_error(&e),
    }
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.debug {
        Level::TRACE
    } else if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::from(level).into())
                .from_env_lossy(),
        )
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

fn print_banner() {
    println!("pc_meter - host metrics over serial");
    println!("   Version: {}", env!("CARGO_PKG_VERSION"));
    println!();
}

fn stream_config(args: &LinkArgs) -> StreamConfig {
    StreamConfig::default()
        .with_port(args.port.clone())
        .with_baud_rate(args.baud)
        .with_interval(args.interval)
        .with_settle_delay(args.settle)
}

async fn stream_command(args: &LinkArgs) -> anyhow::Result<()> {
    pc_meter::run(stream_config(args)).await?;
    Ok(())
}

fn ports_command() -> anyhow::Result<()> {
    let ports = list_ports()?;
    if ports.is_empty() {
        println!("No serial ports found.");
        return Ok(());
    }

    let picked = find_device(&ports, DEFAULT_KEYWORDS);
    println!("Serial ports:");
    for port in &ports {
        let marker = if picked.as_deref() == Some(port.device.as_str()) {
            "*"
        } else {
            " "
        };
        println!(" {} {}", marker, port);
    }
    if picked.is_some() {
        println!();
        println!("* = port that would be used");
    }

    Ok(())
}

async fn snapshot_command(args: &SnapshotArgs) -> anyhow::Result<()> {
    let mut collector = SystemCollector::new()?;
    let sample = collector.collect_sample().await?;

    match args.format {
        SnapshotFormat::Line => print!("{}", sample.to_line()),
        SnapshotFormat::Json => println!("{}", serde_json::to_string_pretty(&sample)?),
        SnapshotFormat::Pretty => print_pretty_sample(&sample),
    }

    Ok(())
}

fn format_metric(value: f64, unit: &str) -> String {
    if pc_meter::metrics::data::is_available(value) {
        format!("{:.1}{}", value, unit)
    } else {
        "unavailable".to_string()
    }
}

fn print_pretty_sample(sample: &Sample) {
    println!(
        "System Sample ({})",
        chrono::DateTime::from_timestamp_millis(sample.timestamp as i64)
            .unwrap_or_default()
            .format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("==========================================");
    println!("  CPU:         {}", format_metric(sample.cpu_percent, "%"));
    println!("  RAM:         {}", format_metric(sample.ram_percent, "%"));
    println!("  Disk:        {}", format_metric(sample.disk_percent, "%"));
    println!("  Temperature: {}", format_metric(sample.temp_celsius, "°C"));
    println!("  GPU:         {}", format_metric(sample.gpu_percent, "%"));
    println!();
    println!("  Wire line:   {}", sample.to_line().trim_end());
}

/// Print guidance for the failure and pick the exit code.
fn report_error(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<SystemError>() {
        Some(SystemError::DeviceNotFound { available }) => {
            println!("Display board not found ({} serial port(s) available).", available);
            println!("  - Check that the board is plugged in with a data-capable USB cable");
            println!("  - Install the USB-UART driver (CP210x or CH340) if the port is missing");
            println!("  - Run `pc_meter ports` to list ports, then pass one with --port");
            ExitCode::SUCCESS
        }
        Some(SystemError::Connection { port, source }) => {
            error!(port = %port, error = %source, "could not open serial port");
            println!("Could not open {}: {}", port, source);
            println!("  - Close other programs using the port (Arduino IDE serial monitor, etc.)");
            if cfg!(unix) {
                println!("  - Make sure your user can access the port (e.g. the dialout group)");
            }
            println!("  - Unplug and replug the board, then try again");
            ExitCode::FAILURE
        }
        _ => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["pc_meter", "--port", "COM3", "--baud", "9600"]).unwrap();
        assert_eq!(cli.link.port.as_deref(), Some("COM3"));
        assert_eq!(cli.link.baud, 9600);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_default_values() {
        let cli = Cli::try_parse_from(["pc_meter"]).unwrap();
        let config = stream_config(&cli.link);
        assert!(config.port.is_none());
        assert_eq!(config.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(config.interval_ms, DEFAULT_INTERVAL_MS);
        assert_eq!(config.settle_delay_ms, DEFAULT_SETTLE_DELAY_MS);
    }

    #[test]
    fn test_snapshot_subcommand() {
        let cli = Cli::try_parse_from(["pc_meter", "snapshot", "--format", "json"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Snapshot(SnapshotArgs {
                format: SnapshotFormat::Json
            }))
        ));
    }

    #[test]
    fn test_device_not_found_exits_cleanly() {
        let err = anyhow::Error::from(SystemError::DeviceNotFound { available: 2 });
        assert_eq!(report_error(&err), ExitCode::SUCCESS);
    }
}
