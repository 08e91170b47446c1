//! Offline harness for exercising the looper engine against a WAV file.
//!
//! Grounded in the teacher's `bin/beatbox_cli.rs`: a `clap`-derived
//! subcommand CLI, `anyhow::Context` for I/O errors, and JSON reports
//! printed to stdout or written to a file.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use loopcraft::audio::Quantize;
use loopcraft::engine::command::ScheduledOp;
use loopcraft::{Engine, EngineConfig};
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(name = "looper_cli", about = "Offline harness for the looper engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a WAV file through the engine, applying a script of commands, and
    /// write the resulting mixed-down audio plus a snapshot report.
    Run {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// JSON array of scripted commands; see `ScriptCommand`.
        #[arg(long)]
        script: Option<PathBuf>,
        #[arg(long, default_value_t = 120.0)]
        bpm: f64,
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Print the default engine configuration as JSON.
    DumpConfig,
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            input,
            output,
            script,
            bpm,
            report,
        } => run_session(&input, &output, script, bpm, report),
        Commands::DumpConfig => run_dump_config(),
    }
}

/// One scripted engine command, at a given sample offset into the input.
#[derive(Debug, Deserialize)]
struct ScriptCommand {
    at_sample: usize,
    #[serde(flatten)]
    action: ScriptAction,
    #[serde(default)]
    quantize: ScriptQuantize,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ScriptAction {
    Capture { loop_idx: usize, lookback_bars: u32 },
    Record { loop_idx: usize },
    StopRecord { loop_idx: usize },
    Mute { loop_idx: usize },
    Unmute { loop_idx: usize },
    StartOverdub { loop_idx: usize },
    StopOverdub { loop_idx: usize },
    ToggleReverse { loop_idx: usize },
    SetSpeed { loop_idx: usize, speed: f32 },
    Undo { loop_idx: usize },
    Redo { loop_idx: usize },
    Clear { loop_idx: usize },
    SetBpm { bpm: f64 },
}

#[derive(Debug, Deserialize, Default, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum ScriptQuantize {
    #[default]
    Free,
    Beat,
    Bar,
}

impl From<ScriptQuantize> for Quantize {
    fn from(q: ScriptQuantize) -> Self {
        match q {
            ScriptQuantize::Free => Quantize::Free,
            ScriptQuantize::Beat => Quantize::Beat,
            ScriptQuantize::Bar => Quantize::Bar,
        }
    }
}

fn run_session(
    input: &PathBuf,
    output: &PathBuf,
    script_path: Option<PathBuf>,
    bpm: f64,
    report_path: Option<PathBuf>,
) -> Result<ExitCode> {
    let mut reader =
        hound::WavReader::open(input).with_context(|| format!("opening {}", input.display()))?;
    let spec = reader.spec();
    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()?,
        hound::SampleFormat::Int => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / i32::MAX as f32))
            .collect::<std::result::Result<_, _>>()?,
    };

    let mut config = EngineConfig::default();
    config.sample_rate = spec.sample_rate;
    config.num_input_channels = 1;
    let mut engine = Engine::new(config).context("constructing engine")?;
    engine.set_bpm(bpm);

    let mut script: Vec<ScriptCommand> = match script_path {
        Some(path) => {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing script {}", path.display()))?
        }
        None => Vec::new(),
    };
    script.sort_by_key(|c| c.at_sample);

    let mut mixed = vec![0.0f32; samples.len()];
    let mut script_idx = 0;
    let block_size = 256usize;
    let mut pos = 0usize;

    while pos < samples.len() {
        let end = (pos + block_size).min(samples.len());
        while script_idx < script.len() && script[script_idx].at_sample < end {
            apply_script_command(&mut engine, &script[script_idx]);
            script_idx += 1;
        }
        let input_block = &samples[pos..end];
        let output_block = &mut mixed[pos..end];
        engine.process_block(&[input_block], output_block, end - pos);
        pos = end;
    }

    write_wav(output, &spec, &mixed)?;

    let snapshot = engine.snapshot_publisher().latest();
    let report_json = serde_json::to_string_pretty(&snapshot)?;
    if let Some(path) = report_path {
        fs::write(&path, &report_json).with_context(|| format!("writing {}", path.display()))?;
    } else {
        println!("{report_json}");
    }

    Ok(ExitCode::from(0))
}

fn apply_script_command(engine: &mut Engine, cmd: &ScriptCommand) {
    let q = cmd.quantize.into();
    match cmd.action {
        ScriptAction::Capture {
            loop_idx,
            lookback_bars,
        } => engine.schedule_capture_loop(loop_idx, q, lookback_bars),
        ScriptAction::Record { loop_idx } => engine.schedule_record(loop_idx, q),
        ScriptAction::StopRecord { loop_idx } => engine.schedule_stop_record(loop_idx, q),
        ScriptAction::Mute { loop_idx } => engine.schedule_op(loop_idx, ScheduledOp::Mute, q),
        ScriptAction::Unmute { loop_idx } => engine.schedule_op(loop_idx, ScheduledOp::Unmute, q),
        ScriptAction::StartOverdub { loop_idx } => {
            engine.schedule_op(loop_idx, ScheduledOp::StartOverdub, q)
        }
        ScriptAction::StopOverdub { loop_idx } => {
            engine.schedule_op(loop_idx, ScheduledOp::StopOverdub, q)
        }
        ScriptAction::ToggleReverse { loop_idx } => {
            engine.schedule_op(loop_idx, ScheduledOp::ToggleReverse, q)
        }
        ScriptAction::SetSpeed { loop_idx, speed } => engine.schedule_set_speed(loop_idx, q, speed),
        ScriptAction::Undo { loop_idx } => engine.schedule_op(loop_idx, ScheduledOp::Undo, q),
        ScriptAction::Redo { loop_idx } => engine.schedule_op(loop_idx, ScheduledOp::Redo, q),
        ScriptAction::Clear { loop_idx } => engine.schedule_op(loop_idx, ScheduledOp::Clear, q),
        ScriptAction::SetBpm { bpm } => engine.set_bpm(bpm),
    }
}

fn write_wav(path: &PathBuf, spec: &hound::WavSpec, samples: &[f32]) -> Result<()> {
    let out_spec = hound::WavSpec {
        channels: 1,
        sample_rate: spec.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, out_spec)
        .with_context(|| format!("creating {}", path.display()))?;
    for &s in samples {
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(())
}

fn run_dump_config() -> Result<ExitCode> {
    let config = EngineConfig::default();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(ExitCode::from(0))
}
