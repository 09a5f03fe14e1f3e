//! modwire - modular signal-routing demo
//!
//! Builds a patch of detuned sine voices, sums them through an
//! auto-inserted mixer into a stereo output stage, and runs the engine
//! for a fixed duration.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use modwire_core::Sample;
use modwire_engine::{BlockDesc, EngineConfig, NativeEngine};
use modwire_graph::{Block, GraphRegistry};

/// Detuned sine voice demo
#[derive(Parser, Debug)]
#[command(name = "modwire")]
#[command(about = "Build and run a summed sine-voice patch", long_about = None)]
struct Args {
    /// Number of detuned voices to sum
    #[arg(short, long, default_value_t = 4)]
    voices: usize,

    /// Fundamental frequency in Hz
    #[arg(short, long, default_value_t = 110.0)]
    base_freq: Sample,

    /// How long to run the engine, in milliseconds
    #[arg(short, long, default_value_t = 2000)]
    duration_ms: u64,

    /// Build the patch and print a summary without starting audio
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "modwire=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    anyhow::ensure!(args.voices > 0, "at least one voice is required");

    let config = EngineConfig::default();
    tracing::info!("Engine config: {:?}", config);

    let mut registry = GraphRegistry::new(NativeEngine::new(config));
    let stage = build_patch(&mut registry, args.voices, args.base_freq)
        .context("Failed to build patch")?;

    tracing::info!(
        "Patch built: {} block(s), {} wire(s)",
        registry.block_count(),
        registry.wire_count()
    );

    if args.dry_run {
        println!(
            "dry run: {} voice(s) at {} Hz, {} block(s), {} wire(s)",
            args.voices,
            args.base_freq,
            registry.block_count(),
            registry.wire_count()
        );
        return Ok(());
    }

    registry.set_output(&stage.output("out")?)?;
    registry.start_audio();
    std::thread::sleep(Duration::from_millis(args.duration_ms));
    registry.stop_audio();

    tracing::info!(
        "Rendered {} frame(s)",
        registry.engine().frames_rendered()
    );
    Ok(())
}

/// Wire up N detuned sine voices, summed with equal gains into a stereo
/// output stage. Returns the stage block.
fn build_patch(
    registry: &mut GraphRegistry<NativeEngine>,
    voices: usize,
    base_freq: Sample,
) -> Result<Block> {
    let stage = registry.create_block(&BlockDesc::MonoToStereo {
        amp_db: -12.0,
        panning: 0.0,
    })?;

    // Slight upward detune per voice keeps the sum from phase-locking
    let gain = 1.0 / voices as Sample;
    let mut oscillators = Vec::with_capacity(voices);
    for voice in 0..voices {
        let detune = 1.0 + 0.003 * voice as Sample;
        let osc = registry.create_block(&BlockDesc::SineOsc {
            freq: base_freq * detune,
            amp: 1.0,
        })?;
        oscillators.push(osc);
    }

    let input = stage.input("input")?;
    if voices == 1 {
        let wire = (oscillators[0].output("out")? * gain).connect(registry, &input)?;
        tracing::debug!("Single voice wired directly as {}", wire);
    } else {
        let mut sum = oscillators[0].output("out")? * gain + oscillators[1].output("out")? * gain;
        for osc in &oscillators[2..] {
            sum = sum + osc.output("out")? * gain;
        }
        let mix = sum.connect(registry, &input)?;
        tracing::debug!(
            "{} voice(s) summed through a capacity-{} mixer",
            voices,
            mix.mixer
                .kind()
                .mixer_size()
                .map_or(0, modwire_engine::MixerSize::capacity)
        );
    }

    Ok(stage)
}
