// Satellite handoff tracker - Main Entry Point
// Licensed under AGPL v3

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use sat_handoff::config::Config;
use sat_handoff::control::ControlLoop;
use sat_handoff::feed::PositionFeed;
use sat_handoff::feedback::{ConsoleFeedback, Fanout, JsonLogFeedback, TonePlayer};
use sat_handoff::input::{spawn_ctrl_c, spawn_stdin_reader, Debounced, SharedKeys};
use sat_handoff::oracle::PositionOracle;
use sat_handoff::sim::SyntheticOracle;
use sat_handoff::tracking::Tracker;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command-line arguments
    let config = Config::parse();

    // Initialize logging
    init_logging(config.verbose);

    info!("Starting satellite handoff tracker");

    // Oracle construction failure is fatal before the loop starts
    let oracle: Arc<dyn PositionOracle> = match SyntheticOracle::new(&config.sim_params(), Utc::now()) {
        Ok(oracle) => Arc::new(oracle),
        Err(e) => {
            error!("Failed to build position oracle: {}", e);
            return Err(e.into());
        }
    };

    let (feed, slot) = PositionFeed::start(
        oracle.clone(),
        Duration::from_millis(config.feed_interval_ms),
    );

    // Feedback sinks
    let mut sinks = Fanout::new();
    let tones = if config.no_tones { None } else { Some(TonePlayer::spawn()) };
    sinks.add(Box::new(ConsoleFeedback::new(tones, config.threshold)));
    if let Some(path) = &config.write_json {
        info!("Writing handoff events to {}", path);
        sinks.add(Box::new(JsonLogFeedback::new(path)?));
    }

    // Keyboard: Enter or "s" switches, "q" or Ctrl-C exits
    let keys = SharedKeys::new();
    spawn_stdin_reader(keys.clone());
    spawn_ctrl_c(keys.clone());
    eprintln!("Press Enter to switch target, type q then Enter (or Ctrl-C) to exit.");

    let control = ControlLoop::new(
        Tracker::new(config.tracker_config()),
        slot,
        oracle,
        Box::new(Debounced::new(keys)),
        Box::new(sinks),
        Duration::from_millis(config.tick_ms),
    );
    let tracker = control.run().await;
    eprintln!();

    info!("Shutting down...");
    feed.shutdown().await;
    info!("Tracked {} objects this run", tracker.history().len());

    // stdin reader may still be parked on a read
    std::process::exit(0);
}

/// Initialize logging subsystem
fn init_logging(verbose: bool) {
    use tracing_subscriber::fmt::format::FmtSpan;

    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .with_span_events(if verbose {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        });

    if verbose {
        subscriber
            .with_max_level(tracing::Level::DEBUG)
            .init();
        info!("Verbose logging enabled (DEBUG level)");
    } else {
        subscriber
            .with_max_level(tracing::Level::INFO)
            .init();
    }
}
