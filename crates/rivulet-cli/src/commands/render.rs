//! Offline render of the comb-delay demo graph.
//!
//! A click train feeds a bank of feedback comb delays behind a [`Patch`]. A
//! worker thread builds the next bank and patches it in every `--swap-every`
//! seconds, alternating between the `--first` and `--second` delay sets. The
//! render loop holds each swap block until the worker has posted, so the
//! output does not depend on thread timing.

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use rivulet_config::EngineConfig;
use rivulet_core::{
    Biquad, CombFeedback, Control, Delay, Engine, Param, Patch, Rate, Unit, Variable, Worker,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::wav;

#[derive(Args)]
pub struct RenderArgs {
    /// Output WAV file
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Engine configuration file (TOML); defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Duration in seconds
    #[arg(long, default_value = "4.0")]
    duration: f32,

    /// Seconds between clicks
    #[arg(long, default_value = "0.5")]
    interval: f32,

    /// Comb delay times of the first setting, in seconds
    #[arg(long, value_delimiter = ',', default_value = "0.0297,0.0371")]
    first: Vec<f32>,

    /// Comb delay times of the second setting, in seconds
    #[arg(long, value_delimiter = ',', default_value = "0.0411,0.0437")]
    second: Vec<f32>,

    /// Comb feedback (-1 to 1)
    #[arg(long, default_value = "0.85")]
    feedback: f32,

    /// Seconds between patch swaps
    #[arg(long, default_value = "1.0")]
    swap_every: f32,

    /// Crossfade per swap in seconds (overrides the configuration)
    #[arg(long)]
    fade: Option<f32>,

    /// Low-pass cutoff in Hz
    #[arg(long, default_value = "4000.0")]
    cutoff: f32,

    /// Output bit depth (16, 24, or 32)
    #[arg(long, default_value = "32")]
    bit_depth: u16,
}

#[derive(Debug, Default)]
struct SwapState {
    requested: AtomicUsize,
    posted: AtomicUsize,
}

fn click_train(ctx: &rivulet_core::GraphContext, interval: f32) -> anyhow::Result<Unit> {
    let period = (f64::from(interval) * ctx.sample_rate()).round().max(1.0) as usize;
    let mut table = vec![0.0; period];
    table[0] = 1.0;
    Ok(Unit::samples(ctx, table)?)
}

fn comb_bank(clicks: &Unit, times: &[f32], feedback: f32, max_seconds: f32) -> rivulet_core::Result<Unit> {
    let ctx = clicks.context();
    let times = Unit::constants(ctx, times)?;
    let feedback = Unit::constant(ctx, feedback);
    Ok(Delay::<CombFeedback>::unit(clicks, &times, &feedback, max_seconds))
}

pub fn run(args: RenderArgs) -> anyhow::Result<()> {
    anyhow::ensure!(
        matches!(args.bit_depth, 16 | 24 | 32),
        "bit depth must be 16, 24 or 32 (got {})",
        args.bit_depth
    );
    anyhow::ensure!(
        !args.first.is_empty() && !args.second.is_empty(),
        "both delay settings need at least one time"
    );
    anyhow::ensure!(args.duration > 0.0, "duration must be positive");

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(fade) = args.fade {
        config.patch_fade_seconds = fade;
        config.validate()?;
    }
    let ctx = config.to_context()?;
    let block = ctx.block_size();
    let sample_rate = ctx.sample_rate();

    // Graph: clicks -> patched comb bank -> low-pass -> fade-in level.
    let clicks = click_train(&ctx, args.interval)?;
    let max_seconds = args
        .first
        .iter()
        .chain(&args.second)
        .fold(0.0f32, |a, &b| a.max(b));
    let (patch, handle) = Patch::unit(
        &comb_bank(&clicks, &args.first, args.feedback, max_seconds)?,
        config.patch_options(),
    );
    let cutoff = Variable::new(args.cutoff);
    let filtered = Biquad::lowpass(&patch, &Param::kr(&ctx, &cutoff), &Unit::constant(&ctx, 0.707));
    let (level, level_sender) = Control::unit(&ctx, 0.0, config.control_queue_capacity, Rate::Control);
    level_sender.ramp(0.5, 0.25)?;
    let mut engine = Engine::new(&ctx, &filtered * &level);

    tracing::info!(
        sample_rate,
        block_size = block,
        channels = config.channels,
        combs = patch.num_channels(),
        "render: graph built"
    );

    // Worker: builds and posts the next comb bank on request.
    let state = Arc::new(SwapState::default());
    let mut worker = Worker::new("rivulet-patcher");
    {
        let state = Arc::clone(&state);
        let handle = handle.clone();
        let settings = [args.first.clone(), args.second.clone()];
        let feedback = args.feedback;
        worker.start(move |wctx| {
            while !wctx.should_exit() {
                let requested = state.requested.load(Ordering::Acquire);
                if state.posted.load(Ordering::Acquire) < requested {
                    match comb_bank(&clicks, &settings[requested % 2], feedback, max_seconds) {
                        Ok(bank) => {
                            handle.set(bank);
                            tracing::debug!(swap = requested, "render: patched comb bank");
                        }
                        Err(err) => tracing::warn!(%err, "render: could not build comb bank"),
                    }
                    state.posted.store(requested, Ordering::Release);
                } else {
                    handle.collect_retired();
                    wctx.pause_with_timeout(Duration::from_millis(5));
                }
            }
        })?;
    }

    let total_samples = (f64::from(args.duration) * sample_rate).ceil() as usize;
    let total_blocks = total_samples.div_ceil(block);
    let swap_blocks = ((f64::from(args.swap_every) * sample_rate / block as f64).round() as usize).max(1);

    println!(
        "Rendering {:.2}s at {} Hz ({} block(s) of {})...",
        args.duration, sample_rate, total_blocks, block
    );
    let pb = ProgressBar::new(total_blocks as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("##-"),
    );

    let channels = config.channels;
    let mut buffers = vec![vec![0.0f32; block]; channels];
    let mut output = Vec::with_capacity(total_blocks * block * channels);
    for b in 0..total_blocks {
        let due = b / swap_blocks;
        if due > state.requested.load(Ordering::Acquire) {
            state.requested.store(due, Ordering::Release);
            worker.resume()?;
            while state.posted.load(Ordering::Acquire) < due && worker.is_running() {
                std::thread::yield_now();
            }
        }

        let mut outs: Vec<&mut [f32]> = buffers.iter_mut().map(Vec::as_mut_slice).collect();
        engine.process(&mut outs)?;
        for i in 0..block {
            output.extend(buffers.iter().map(|buffer| buffer[i]));
        }
        pb.inc(1);
    }
    pb.finish_with_message("done");

    worker.set_should_exit()?;
    worker.wait()?;
    let retired = handle.collect_retired();
    tracing::debug!(retired, "render: released retired sources");

    output.truncate(total_samples * channels);
    println!("\nStats:");
    println!(
        "  Output: RMS {:.1} dB, Peak {:.1} dB",
        linear_to_db(rms(&output)),
        linear_to_db(peak(&output))
    );

    let spec = wav::spec(channels as u16, sample_rate.round() as u32, args.bit_depth);
    println!("\nWriting {}...", args.output.display());
    wav::write_wav(&args.output, &output, spec)?;
    println!("Done!");

    Ok(())
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0, f32::max)
}

fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        -120.0
    } else {
        20.0 * linear.log10()
    }
}
