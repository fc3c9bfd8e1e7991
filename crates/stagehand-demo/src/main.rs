#![forbid(unsafe_code)]

//! Stagehand demo binary entry point.

use std::io;
use std::process::ExitCode;

use stagehand_core::clock::{DeterministicClock, MonotonicClock};
use stagehand_demo::cli::{self, Opts};
use stagehand_demo::player::{Cue, Player, PlayerClock};
use stagehand_demo::walkthrough::{abuse_walkthrough, demo_layout};
use stagehand_runtime::{ConfigResult, EngineConfig, Orchestrator, Variant};
use tracing_subscriber::EnvFilter;

fn init_logging(opts: &Opts) {
    if opts.log_json {
        stagehand_core::logging::init_json();
        return;
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn load_config(opts: &Opts) -> ConfigResult<EngineConfig> {
    let base = match &opts.config {
        Some(path) => EngineConfig::load_json(path)?,
        None => EngineConfig::default(),
    };
    base.overlay(|key| std::env::var(key).ok())
}

fn other(variant: Variant) -> Variant {
    match variant {
        Variant::Detection => Variant::Prevention,
        Variant::Prevention => Variant::Detection,
    }
}

fn main() -> ExitCode {
    let opts = cli::Opts::parse();
    init_logging(&opts);

    let config = match load_config(&opts) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load engine config: {e}");
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!(?config, "engine config");

    let clock = if opts.realtime {
        PlayerClock::Realtime(MonotonicClock::new())
    } else {
        PlayerClock::Virtual(DeterministicClock::new())
    };
    let engine = Orchestrator::new(config, abuse_walkthrough(opts.completed));
    let mut player = Player::new(engine, demo_layout(), clock);
    player.cue(std::time::Duration::ZERO, Cue::Select(opts.variant));
    if let Some(at) = opts.switch_at {
        player.cue(at, Cue::Select(other(opts.variant)));
    }
    if let Some(at) = opts.continue_at {
        player.cue(at, Cue::ContinueToUnlock);
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match player.play(opts.duration, &mut out) {
        Ok(snapshot) => {
            tracing::info!(
                variant = ?snapshot.variant,
                pointer_visible = snapshot.pointer.visible,
                "playback finished"
            );
            ExitCode::SUCCESS
        }
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Output error: {e}");
            ExitCode::FAILURE
        }
    }
}
