//! # Bass Pitch Monitor
//!
//! Command-line front end for the bass pitch detection engine. It captures the
//! default input device, runs every analysis block through the selected
//! detector and prints the running statistics at a fixed interval.
//!
//! ## Architecture
//! - **Main Thread**: reads commands from stdin (`yin`, `fft`, `reset`, `quit`)
//! - **Analysis Thread**: owns the audio stream and the analyzer
//! - **Communication**: Crossbeam channels for blocks, commands and shutdown
//!
//! The audio stream is created on the analysis thread because CPAL streams
//! cannot be moved between threads on every platform.

mod report;

use std::io::BufRead;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use bass_pitch_core::{Algorithm, Analyzer, AnalyzerConfig, audio, config};
use clap::Parser;
use cpal::traits::StreamTrait;
use crossbeam_channel::{Receiver, Sender};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Blocks buffered between the audio callback and the analysis thread.
const BLOCK_QUEUE_DEPTH: usize = 8;

#[derive(Parser, Debug)]
#[command(name = "bass-pitch-monitor", version, about = "Live bass pitch detection statistics")]
struct Args {
    /// Pitch detection algorithm (yin or fft)
    #[arg(short, long)]
    algorithm: Option<Algorithm>,

    /// Samples per analysis block
    #[arg(short, long)]
    block_size: Option<usize>,

    /// JSON file with analyzer settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Milliseconds between statistics reports
    #[arg(long, default_value_t = 500)]
    report_interval_ms: u64,

    /// Print reports as JSON lines
    #[arg(long)]
    json: bool,

    /// Stop after this many seconds instead of waiting for `quit`
    #[arg(long)]
    seconds: Option<u64>,
}

impl Args {
    /// Config file (or defaults) with command-line overrides applied.
    fn resolve_config(&self) -> Result<AnalyzerConfig> {
        let mut config = match &self.config {
            Some(path) => config::load_config(path)?,
            None => AnalyzerConfig::default(),
        };
        if let Some(algorithm) = self.algorithm {
            config.algorithm = algorithm;
        }
        if let Some(block_size) = self.block_size {
            config.block_size = block_size;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Requests sent from the main thread to the analysis thread.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Command {
    SetAlgorithm(Algorithm),
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Input {
    Command(Command),
    Quit,
}

/// Parses one line typed by the user. Algorithms can be named or given by index.
fn parse_input(line: &str) -> Option<Input> {
    let line = line.trim();
    match line.to_ascii_lowercase().as_str() {
        "q" | "quit" | "exit" => Some(Input::Quit),
        "r" | "reset" => Some(Input::Command(Command::Reset)),
        other => {
            let algorithm = match other.parse::<usize>() {
                Ok(index) if index < Algorithm::ALL.len() => Algorithm::from_index(index),
                Ok(_) => return None,
                Err(_) => other.parse::<Algorithm>().ok()?,
            };
            Some(Input::Command(Command::SetAlgorithm(algorithm)))
        }
    }
}

/// Handle to the analysis thread.
struct AnalysisWorker {
    command_tx: Sender<Command>,
    shutdown_tx: Sender<()>,
    thread_handle: Option<JoinHandle<Result<()>>>,
}

impl AnalysisWorker {
    fn start(config: AnalyzerConfig, report_interval: Duration, json: bool) -> Self {
        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);

        let thread_handle = thread::spawn(move || {
            let result = run_analysis(config, report_interval, json, command_rx, shutdown_rx);
            if let Err(e) = &result {
                warn!("Analysis thread stopped: {:#}", e);
            }
            result
        });

        Self {
            command_tx,
            shutdown_tx,
            thread_handle: Some(thread_handle),
        }
    }

    fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn send(&self, command: Command) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|_| anyhow!("Analysis thread is no longer running"))
    }

    fn stop(mut self) -> Result<()> {
        let _ = self.shutdown_tx.send(());
        match self.thread_handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| anyhow!("Analysis thread panicked"))?,
            None => Ok(()),
        }
    }
}

fn run_analysis(
    mut config: AnalyzerConfig,
    report_interval: Duration,
    json: bool,
    command_rx: Receiver<Command>,
    shutdown_rx: Receiver<()>,
) -> Result<()> {
    let (block_tx, block_rx) = crossbeam_channel::bounded::<Vec<f32>>(BLOCK_QUEUE_DEPTH);
    let (stream, sample_rate) =
        audio::start_audio_capture(block_tx, config.block_size, config.sample_rate)
            .context("Failed to start audio capture")?;

    config.sample_rate = sample_rate;
    let mut analyzer = Analyzer::new(config);
    let ticker = crossbeam_channel::tick(report_interval);

    info!(algorithm = %analyzer.algorithm(), "entering analysis loop");

    loop {
        crossbeam_channel::select! {
            recv(block_rx) -> msg => match msg {
                Ok(block) => {
                    analyzer.process_block(&block);
                }
                Err(_) => {
                    warn!("Audio channel closed");
                    break;
                }
            },
            recv(command_rx) -> msg => match msg {
                Ok(Command::SetAlgorithm(algorithm)) => analyzer.set_algorithm(algorithm),
                Ok(Command::Reset) => analyzer.statistics_mut().reset(),
                Err(_) => break,
            },
            recv(ticker) -> _ => {
                println!("{}", report::render(&analyzer, json)?);
            },
            recv(shutdown_rx) -> _ => {
                info!("Received shutdown signal");
                break;
            },
        }
    }

    if let Err(e) = stream.pause() {
        warn!("Error pausing stream: {}", e);
    }
    drop(stream);
    println!("{}", report::render(&analyzer, json)?);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = args.resolve_config()?;
    info!(
        algorithms = ?Algorithm::names(),
        selected = %config.algorithm,
        block_size = config.block_size,
        "starting bass pitch monitor"
    );

    let worker = AnalysisWorker::start(
        config,
        Duration::from_millis(args.report_interval_ms.max(1)),
        args.json,
    );

    if let Some(seconds) = args.seconds {
        thread::sleep(Duration::from_secs(seconds));
        return worker.stop();
    }

    eprintln!("Commands: yin | fft | 0 | 1 | reset | quit");
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if !worker.is_running() {
            break;
        }
        match parse_input(&line) {
            Some(Input::Quit) => break,
            Some(Input::Command(command)) => {
                if let Err(e) = worker.send(command) {
                    warn!("{}", e);
                    break;
                }
            }
            None if line.trim().is_empty() => {}
            None => warn!("Unknown command: {}", line.trim()),
        }
    }

    worker.stop()
}
