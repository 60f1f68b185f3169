//! Binary entrypoint for the camcap CLI.
//!
//! Commands:
//! - `capture [--port <path>] [-b <baud>]` - extract JPEG frames from the camera's serial link
//! - `replay --input <file>` - extract frames from a recorded raw stream
//! - `log [--port <path>] [--output <file>]` - append raw serial bytes to a log file
//! - `init` - create a starter `config.toml`
//!
//! See the library crate docs for module‑level details: `camcap::`.
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use camcap::capture::{FrameSynchronizer, NamingPolicy, SavedFrame};
use camcap::config::Config;
use camcap::runner::{run_capture, run_passthrough, RunSummary};
use camcap::source::{ByteSource, ReaderSource};

#[derive(Parser)]
#[command(name = "camcap")]
#[command(about = "Capture JPEG frames from a serial camera module")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture frames from the serial port until Ctrl-C
    Capture {
        /// Camera serial port (e.g., /dev/ttyUSB0, COM5)
        #[arg(short, long)]
        port: Option<String>,
        /// Baud rate
        #[arg(short = 'b', long)]
        baud: Option<u32>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Extract frames from a recorded raw stream
    Replay {
        /// Raw capture file (e.g. one written by `camcap log`)
        #[arg(short, long)]
        input: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Append raw serial bytes to a log file, without framing
    Log {
        /// Camera serial port
        #[arg(short, long)]
        port: Option<String>,
        /// Baud rate
        #[arg(short = 'b', long)]
        baud: Option<u32>,
        /// Log file to append to
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write a default configuration file
    Init,
}

#[derive(clap::Args)]
struct OutputArgs {
    /// Directory for captured frames
    #[arg(short = 'o', long)]
    output_dir: Option<String>,
    /// Naming policy: overwrite, sequence or timestamp
    #[arg(short, long)]
    naming: Option<NamingPolicy>,
    /// Print one JSON object per saved frame instead of a text line
    #[arg(long)]
    json: bool,
}

impl OutputArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.output_dir {
            config.capture.output_dir = dir.clone();
        }
        if let Some(naming) = self.naming {
            config.capture.naming = naming;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            init_logging(&None, cli.verbose);
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
        Commands::Capture { port, baud, output } => {
            let mut config = load_or_default(&cli.config).await?;
            if let Some(port) = port {
                config.serial.port = port;
            }
            if let Some(baud) = baud {
                config.serial.baud_rate = baud;
            }
            output.apply(&mut config);
            init_logging(&Some(config.clone()), cli.verbose);
            config.validate()?;
            info!("Starting camcap v{}", env!("CARGO_PKG_VERSION"));
            let summary = capture_serial(config, output.json).await?;
            report_partial(&summary);
        }
        Commands::Replay { input, output } => {
            let mut config = load_or_default(&cli.config).await?;
            output.apply(&mut config);
            init_logging(&Some(config.clone()), cli.verbose);
            config.validate()?;
            let source = ReaderSource::open(&input)
                .map_err(|e| anyhow!("Failed to open {}: {}", input.display(), e))?;
            let summary = run_blocking_capture(config, source, output.json).await?;
            report_partial(&summary);
        }
        Commands::Log { port, baud, output } => {
            let mut config = load_or_default(&cli.config).await?;
            if let Some(port) = port {
                config.serial.port = port;
            }
            if let Some(baud) = baud {
                config.serial.baud_rate = baud;
            }
            init_logging(&Some(config.clone()), cli.verbose);
            config.validate()?;
            let out_path = output.unwrap_or_else(|| PathBuf::from(&config.capture.raw_log_file));
            log_serial(config, out_path).await?;
        }
    }

    Ok(())
}

/// A missing config file is fine; defaults plus CLI flags are enough to run.
async fn load_or_default(path: &str) -> Result<Config> {
    if !std::path::Path::new(path).exists() {
        return Ok(Config::default());
    }
    Config::load(path).await
}

#[cfg(feature = "serial")]
async fn capture_serial(config: Config, json: bool) -> Result<RunSummary> {
    let serial_cfg = config.serial.clone();
    let source = tokio::task::spawn_blocking(move || camcap::source::SerialSource::open(&serial_cfg))
        .await??;
    run_blocking_capture(config, source, json).await
}

#[cfg(not(feature = "serial"))]
async fn capture_serial(_config: Config, _json: bool) -> Result<RunSummary> {
    error!("Capture requires the 'serial' feature");
    std::process::exit(2);
}

#[cfg(feature = "serial")]
async fn log_serial(config: Config, out_path: PathBuf) -> Result<()> {
    let serial_cfg = config.serial.clone();
    let chunk_size = config.capture.chunk_size;
    let stop = stop_on_ctrl_c();
    let total = tokio::task::spawn_blocking(move || -> Result<u64> {
        let mut source = camcap::source::SerialSource::open(&serial_cfg)?;
        Ok(run_passthrough(&mut source, &out_path, chunk_size, &stop)?)
    })
    .await??;
    info!("Stopped. {} raw bytes logged", total);
    Ok(())
}

#[cfg(not(feature = "serial"))]
async fn log_serial(_config: Config, _out_path: PathBuf) -> Result<()> {
    error!("Log capture requires the 'serial' feature");
    std::process::exit(2);
}

/// Run the capture loop on a blocking thread until Ctrl-C or end of input.
async fn run_blocking_capture<S>(config: Config, mut source: S, json: bool) -> Result<RunSummary>
where
    S: ByteSource + Send + 'static,
{
    let stop = stop_on_ctrl_c();
    let chunk_size = config.capture.chunk_size;
    let mut sync = FrameSynchronizer::new(config.capture.guard(), config.capture.namer())?;
    let summary = tokio::task::spawn_blocking(move || {
        run_capture(&mut source, &mut sync, chunk_size, &stop, |frame| {
            announce(frame, json)
        })
    })
    .await?;
    summary.map_err(|e| {
        error!("Capture failed: {}", e);
        anyhow::Error::from(e)
    })
}

/// Flag raised by the first Ctrl-C.
fn stop_on_ctrl_c() -> Arc<AtomicBool> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            flag.store(true, Ordering::SeqCst);
        }
    });
    stop
}

fn announce(frame: &SavedFrame, json: bool) {
    if json {
        match serde_json::to_string(frame) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to encode completion notice: {}", e),
        }
    } else {
        println!("[Image saved: {} ({} bytes)]", frame.path.display(), frame.size);
    }
}

fn report_partial(summary: &RunSummary) {
    if let Some(partial) = &summary.partial {
        warn!(
            "{} is incomplete ({} bytes, no end marker)",
            partial.path.display(),
            partial.size
        );
    }
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .map(|c| c.logging.level_filter())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    let log_file = config.as_ref().and_then(|c| c.logging.file.clone());
    if let Some(file) = log_file {
        if let Ok(f) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file)
        {
            let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
            // Only echo to the console when someone is watching it
            let is_tty = atty::is(atty::Stream::Stderr);
            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());
                if let Ok(mut guard) = write_mutex.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
            let _ = builder.try_init();
            return;
        }
    }
    builder.format(|fmt, record| {
        let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
        writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
    });
    let _ = builder.try_init();
}
