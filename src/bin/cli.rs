//! Picolink CLI client
//!
//! Calls the device service over TCP or a serial device.

use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};

use picolink::client::{RpcClient, StreamEvent};

/// Picolink CLI
#[derive(Parser, Debug)]
#[command(name = "picolink-cli")]
#[command(about = "CLI for the picolink device service")]
#[command(version)]
struct Args {
    /// Device address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:8888")]
    tcp: String,

    /// Talk over this serial device instead of TCP
    #[arg(short, long)]
    serial: Option<PathBuf>,

    /// Reply timeout in milliseconds (TCP only)
    #[arg(long, default_value = "5000")]
    timeout_ms: u64,

    /// Print device log records to stderr
    #[arg(short, long)]
    logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Switch {
    On,
    Off,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Switch the status LED
    Led {
        state: Switch,
    },

    /// Echo a message back from the device
    Echo {
        message: String,
    },

    /// Read temperature and humidity once
    Sensor,

    /// Stream sensor samples
    Stream {
        /// Samples to print before stopping
        #[arg(short = 'n', long, default_value = "5")]
        count: u32,
    },

    /// Store new Wi-Fi credentials on the device
    Wifi {
        ssid: String,
        password: String,
    },
}

fn execute<S: Read + Write>(client: &mut RpcClient<S>, command: &Commands) -> Result<()> {
    match command {
        Commands::Led { state } => {
            client.set_led(matches!(state, Switch::On))?;
            println!("OK");
        }
        Commands::Echo { message } => {
            println!("{}", client.echo(message)?);
        }
        Commands::Sensor => {
            let s = client.get_sensor_data()?;
            println!("temperature={:.1}C humidity={:.1}%", s.temperature, s.humidity);
        }
        Commands::Stream { count } => {
            let call_id = client.start_sensor_stream()?;
            for _ in 0..*count {
                match client.next_sensor_sample(call_id)? {
                    StreamEvent::Item(s) => {
                        println!("temperature={:.1}C humidity={:.1}%", s.temperature, s.humidity);
                    }
                    StreamEvent::Finished(status) => bail!("stream ended by device: {status}"),
                }
            }
            client.stop_sensor_stream()?;
        }
        Commands::Wifi { ssid, password } => {
            client.configure_wifi(ssid, password)?;
            println!("OK");
        }
    }
    Ok(())
}

fn run<S: Read + Write>(stream: S, args: &Args) -> Result<()> {
    let mut client = RpcClient::new(stream);
    let result = execute(&mut client, &args.command);
    if args.logs {
        for record in client.drain_logs() {
            eprintln!("[{:<5} {}] {}", record.level().map_or("?", |l| l.as_str()), record.target, record.message);
        }
    }
    result
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(path) = &args.serial {
        let port = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("opening {}", path.display()))?;
        return run(port, &args);
    }

    let stream = TcpStream::connect(&args.tcp).with_context(|| format!("connecting to {}", args.tcp))?;
    stream.set_read_timeout(Some(Duration::from_millis(args.timeout_ms)).filter(|d| !d.is_zero()))?;
    stream.set_nodelay(true)?;
    run(stream, &args)
}
