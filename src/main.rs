use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use ax12_bus::config::{BRING_UP_ATTEMPTS, BusConfig, DEFAULT_SERVO_ID};
use ax12_bus::messages::{PingReport, ServoStatus};
use ax12_bus::runtime::{bring_up, sweep};
use ax12_bus::servo::{SerialTransport, ServoBus, StdDelay};

/// Command AX-12 servos on a half-duplex serial bus
#[derive(Debug, Parser)]
#[command(name = "ax12", version)]
struct Cli {
    /// Serial port (overrides the config file)
    #[arg(short, long)]
    port: Option<String>,

    /// Baudrate (overrides the config file)
    #[arg(short, long)]
    baud: Option<u32>,

    /// Adapter echoes transmitted bytes (overrides the config file)
    #[arg(long)]
    echo: bool,

    /// JSON file with port, baudrate and response timeouts
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Servo id
    #[arg(short, long, default_value_t = DEFAULT_SERVO_ID)]
    id: u8,

    /// Log every frame
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check that the servo answers
    Ping {
        #[arg(long)]
        json: bool,
    },
    /// Read torque limit, max speed, present speed and angle
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Move to an angle (0-300 degrees)
    SetAngle { degrees: f32 },
    /// Set max speed (0-1023, 0 disables velocity control)
    SetSpeed { value: u16 },
    /// Set torque limit (0-1023)
    SetTorque { value: u16 },
    /// Set the reply delay (0-510 microseconds)
    SetReturnDelay { micros: u16 },
    /// Ping, then configure return delay, blink and shutdown conditions
    BringUp {
        #[arg(long, default_value_t = BRING_UP_ATTEMPTS)]
        attempts: u32,
    },
    /// Swing between mirrored angles at increasing speed
    Sweep {
        #[arg(long, default_value_t = 5)]
        passes: u16,
    },
}

fn main() {
    let cli = Cli::parse();

    // Setup logging (RUST_LOG takes precedence over --verbose)
    let level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut config = match &cli.config {
        Some(path) => BusConfig::load(path)?,
        None => BusConfig::default(),
    };
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(baud) = cli.baud {
        config.baudrate = baud;
    }
    if cli.echo {
        config.echo = true;
    }

    info!("Opening servo bus on {} at {} baud", config.port, config.baudrate);
    let transport = SerialTransport::open_with_baudrate(&config.port, config.baudrate)?;
    let mut bus = ServoBus::new(transport, StdDelay)
        .with_timeouts(config.timeouts)
        .with_echo(config.echo);
    let id = cli.id;

    match cli.command {
        Command::Ping { json } => {
            let report = PingReport::from_result(id, &bus.ping(id));
            if json {
                println!("{}", serde_json::to_string(&report)?);
            } else {
                match &report.detail {
                    Some(detail) => println!("Servo {}: {:?} ({})", id, report.health, detail),
                    None => println!("Servo {}: {:?}", id, report.health),
                }
            }
            if !report.is_ok() {
                return Err(format!("servo {} did not answer the ping", id).into());
            }
        }
        Command::Status { json } => {
            let status = ServoStatus::read(&mut bus, id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("Servo {}", status.id);
                println!("  Torque limit:  {}", status.torque_limit);
                println!("  Max speed:     {}", status.max_speed);
                println!("  Present speed: {}", status.current_speed);
                println!("  Angle:         {:.1}°", status.angle_deg);
            }
        }
        Command::SetAngle { degrees } => {
            bus.set_goal_angle(id, degrees)?;
            println!("Servo {}: goal angle {:.1}°", id, degrees);
        }
        Command::SetSpeed { value } => {
            bus.set_max_speed(id, value)?;
            println!("Servo {}: max speed {}", id, value);
        }
        Command::SetTorque { value } => {
            bus.set_torque_limit(id, value)?;
            println!("Servo {}: torque limit {}", id, value);
        }
        Command::SetReturnDelay { micros } => {
            bus.set_return_delay_us(id, micros)?;
            println!("Servo {}: return delay {} µs", id, micros);
        }
        Command::BringUp { attempts } => {
            bring_up(&mut bus, id, attempts)?;
            println!("Servo {}: ready", id);
        }
        Command::Sweep { passes } => {
            let steps = sweep(&mut bus, id, passes)?;
            println!("Servo {}: {} moves done", id, steps.len());
        }
    }

    Ok(())
}
