//! trackdeck - Drives a transport session against the simulated engine.
//!
//! Records into a fresh project, feeds the transport a number of captured
//! block deliveries (optionally with dropouts), stops, prints every
//! notification the transport published, then plays the take back once.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- --blocks 8 --dropout 1.0:0.2 --dropout 3.0:0.1
//! RUST_LOG=debug cargo run   # with transport logging
//! ```

use anyhow::{bail, Context, Result};
use crossbeam_channel::Receiver;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use trackdeck::audio::simulated::BLOCK_SECS;
use trackdeck::notify::DropoutInterval;
use trackdeck::{
    AudioIo, Project, SimulatedEngine, StreamOwnership, TransportController, TransportEvent,
    TransportPreferences,
};

/// Command-line options for the demo.
struct CliOptions {
    /// Number of block deliveries to simulate while recording.
    blocks: usize,
    /// Dropouts reported by the engine during recording.
    dropouts: Vec<DropoutInterval>,
    /// Preferences file to load.
    prefs: Option<PathBuf>,
}

impl CliOptions {
    /// Parses command-line arguments.
    ///
    /// Supports:
    /// - `--blocks N` or `-b N`: Deliver N captured blocks (default 4)
    /// - `--dropout START:DURATION` or `-d START:DURATION`: Report a dropout;
    ///   may be repeated
    /// - `--prefs PATH`: Load transport preferences from a JSON file
    /// - `--help` or `-h`: Print help and exit
    fn parse() -> Result<Self> {
        let args: Vec<String> = std::env::args().collect();
        let mut blocks = 4;
        let mut dropouts = Vec::new();
        let mut prefs = None;
        let mut i = 1;

        while i < args.len() {
            match args[i].as_str() {
                "--blocks" | "-b" => {
                    i += 1;
                    let value = args.get(i).context("--blocks requires a number")?;
                    blocks = value
                        .parse()
                        .with_context(|| format!("Invalid block count: {}", value))?;
                }
                "--dropout" | "-d" => {
                    i += 1;
                    let value = args.get(i).context("--dropout requires START:DURATION")?;
                    dropouts.push(parse_dropout(value)?);
                }
                "--prefs" => {
                    i += 1;
                    let value = args.get(i).context("--prefs requires a path")?;
                    prefs = Some(PathBuf::from(value));
                }
                "--help" | "-h" => {
                    eprintln!("trackdeck - Transport session on a simulated audio engine");
                    eprintln!();
                    eprintln!(
                        "Usage: {} [OPTIONS]",
                        args.first().map(String::as_str).unwrap_or("trackdeck")
                    );
                    eprintln!();
                    eprintln!("Options:");
                    eprintln!("  -b, --blocks N                 Captured blocks to deliver (default 4)");
                    eprintln!("  -d, --dropout START:DURATION   Report a dropout, in seconds (repeatable)");
                    eprintln!("      --prefs PATH               Load preferences from a JSON file");
                    eprintln!("  -h, --help                     Print this help message");
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown option: {}", other);
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
            }
            i += 1;
        }

        Ok(Self {
            blocks,
            dropouts,
            prefs,
        })
    }
}

/// Parses `START:DURATION` in seconds.
fn parse_dropout(value: &str) -> Result<DropoutInterval> {
    let (start, duration) = value
        .split_once(':')
        .with_context(|| format!("Dropout must be START:DURATION, got {}", value))?;
    let start: f64 = start
        .parse()
        .with_context(|| format!("Invalid dropout start: {}", start))?;
    let duration: f64 = duration
        .parse()
        .with_context(|| format!("Invalid dropout duration: {}", duration))?;
    if start < 0.0 || duration <= 0.0 {
        bail!("Dropout needs a non-negative start and a positive duration");
    }
    Ok(DropoutInterval::new(start, duration))
}

fn print_events(events: &Receiver<TransportEvent>) {
    for event in events.try_iter() {
        match event {
            TransportEvent::RateChanged(rate) => println!("  rate changed: {} Hz", rate),
            TransportEvent::RecordingDropout(dropout) => {
                println!(
                    "  dropouts: {} interval(s), {:.3}s lost",
                    dropout.intervals().len(),
                    dropout.total_duration()
                );
                for interval in dropout.intervals() {
                    println!(
                        "    {:.3}s .. {:.3}s",
                        interval.start,
                        interval.end()
                    );
                }
            }
            TransportEvent::RecordingCommitted { tracks } => {
                println!("  recording committed into {} track(s)", tracks.len())
            }
            TransportEvent::CheckpointFailed(failure) => {
                println!("  checkpoint failed: {}", failure.message)
            }
        }
    }
}

/// Main entry point.
fn main() -> Result<()> {
    let cli = CliOptions::parse()?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let prefs = cli
        .prefs
        .as_ref()
        .map(TransportPreferences::load_or_default)
        .unwrap_or_default();

    let engine = Arc::new(SimulatedEngine::new());
    let ownership = Arc::new(StreamOwnership::new(engine.clone()));
    let project = Arc::new(Mutex::new(Project::new("Demo")));
    let transport = TransportController::new(project.clone(), ownership, prefs);
    let events = transport.subscribe();

    transport
        .on_record(false)
        .context("Failed to start recording")?;
    println!("Recording: {}", transport.phase());
    engine.confirm_recording_started();

    let mut dropouts = cli.dropouts;
    dropouts.sort_by(|a, b| a.start.total_cmp(&b.start));
    let mut dropouts = dropouts.into_iter().peekable();
    for block in 0..cli.blocks {
        let block_end = (block + 1) as f64 * BLOCK_SECS;
        let gap = dropouts.next_if(|d| d.start < block_end);
        engine.deliver_blocks(gap);
    }
    let skipped = dropouts.count();
    if skipped > 0 {
        tracing::warn!("{} dropouts fall after the last block and were not reported", skipped);
    }
    println!("{}", transport.rate_status_text());

    transport.stop(true);
    println!("Stopped: {}", transport.phase());
    print_events(&events);

    // The simulated engine does not store audio; extend the take by hand.
    let recorded = cli.blocks as f64 * BLOCK_SECS;
    {
        let mut project = project
            .lock()
            .map_err(|_| anyhow::anyhow!("Project lock poisoned"))?;
        for track in project.tracks_mut() {
            track.end_time = track.end_time.max(recorded);
        }
    }

    match transport.play_current_region(false, false) {
        Ok(token) => {
            println!("Playing back {:.1}s as stream {}", recorded, token);
            engine.set_stream_time(recorded);
            engine.finish();
            println!("Playback finished: {}", transport.phase());
        }
        Err(e) => println!("Nothing to play back: {}", e),
    }
    print_events(&events);

    if engine.is_busy() {
        bail!("Simulated engine still running after the session");
    }
    Ok(())
}
