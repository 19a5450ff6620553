use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use plotters::prelude::*;
use rand::{rngs::StdRng, SeedableRng};
use rpulse_lib::{
    io::{text as text_io, ticks as ticks_io},
    metrics::{
        focus::{focus_score, Baseline, DEFAULT_BASELINE_HR_BPM, DEFAULT_BASELINE_RMSSD_MS},
        hrv::hrv_summary,
        spectrum::{fft_spectrum, spectrum, SpectralEstimate, SpectrumResult},
    },
    pipeline::{Pipeline, PipelineConfig},
    plot::{figure_from_spectrum, figure_from_waveform, Figure},
    session::run_session,
    source::{FrameSource, ReplaySource, SyntheticConfig, SyntheticSource},
};
use serde::Serialize;
use std::{
    io::{self, Read},
    path::{Path, PathBuf},
    sync::atomic::AtomicBool,
};

#[derive(Parser)]
#[command(
    name = "rpulse",
    version,
    about = "rpulse: camera-based pulse, HRV and focus estimation tools"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum SpectrumMethod {
    /// Per-bin resonators over the configured band
    Goertzel,
    /// Full real FFT periodogram, restricted to the band
    Fft,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum PlotView {
    Waveform,
    Spectrum,
}

#[derive(clap::Args, Clone)]
struct PipelineArgs {
    /// TOML file overriding pipeline defaults
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    baseline_hr: Option<f64>,
    #[arg(long)]
    baseline_rmssd: Option<f64>,
    /// Print one JSON line per tick instead of the final summary
    #[arg(long)]
    every_tick: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a recorded `timestamp,value` CSV through the pipeline
    Process {
        #[arg(long)]
        input: PathBuf,
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Run the pipeline on a synthetic demo signal
    Simulate {
        #[arg(long, default_value_t = 72.0)]
        bpm: f64,
        #[arg(long, default_value_t = 60.0)]
        duration_s: f64,
        #[arg(long, default_value_t = 30.0)]
        fps: f64,
        #[arg(long, default_value_t = 0.1)]
        noise: f64,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Also write the generated ticks to this CSV
        #[arg(long)]
        save_ticks: Option<PathBuf>,
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Band spectrum of newline-delimited filtered samples (stdin or --input)
    Spectrum {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long, default_value_t = 30.0)]
        fs: f64,
        #[arg(long, default_value_t = 0.7)]
        f0: f64,
        #[arg(long, default_value_t = 3.0)]
        f1: f64,
        #[arg(long, default_value_t = 120)]
        bins: usize,
        #[arg(long, value_enum, default_value = "goertzel")]
        method: SpectrumMethod,
    },
    /// Time-domain HRV of newline-delimited inter-beat intervals (seconds)
    Rmssd {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Experimental focus score from heart rate and RMSSD
    Focus {
        #[arg(long)]
        hr: f64,
        #[arg(long)]
        rmssd: f64,
        #[arg(long, default_value_t = DEFAULT_BASELINE_HR_BPM)]
        baseline_hr: f64,
        #[arg(long, default_value_t = DEFAULT_BASELINE_RMSSD_MS)]
        baseline_rmssd: f64,
    },
    /// Render the final waveform or spectrum of a tick CSV to a PNG
    Plot {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, value_enum, default_value = "waveform")]
        view: PlotView,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Process { input, pipeline } => cmd_process(&input, &pipeline)?,
        Commands::Simulate {
            bpm,
            duration_s,
            fps,
            noise,
            seed,
            save_ticks,
            pipeline,
        } => {
            let cfg = SyntheticConfig {
                bpm,
                duration_s,
                fps,
                noise,
                ..SyntheticConfig::default()
            };
            cmd_simulate(cfg, seed, save_ticks.as_deref(), &pipeline)?
        }
        Commands::Spectrum {
            input,
            fs,
            f0,
            f1,
            bins,
            method,
        } => cmd_spectrum(input.as_deref(), fs, (f0, f1), bins, method)?,
        Commands::Rmssd { input } => cmd_rmssd(input.as_deref())?,
        Commands::Focus {
            hr,
            rmssd,
            baseline_hr,
            baseline_rmssd,
        } => cmd_focus(hr, rmssd, baseline_hr, baseline_rmssd)?,
        Commands::Plot {
            input,
            out,
            view,
            config,
        } => cmd_plot(&input, &out, view, config.as_deref())?,
    }
    Ok(())
}

fn read_values(input: Option<&Path>) -> Result<Vec<f64>> {
    match input {
        Some(path) => text_io::read_f64_series(path),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            text_io::parse_f64_series(&buf)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path),
        None => Ok(PipelineConfig::default()),
    }
}

fn build_pipeline(args: &PipelineArgs) -> Result<Pipeline> {
    let mut pipeline = Pipeline::new(load_config(args.config.as_deref())?)?;
    match (args.baseline_hr, args.baseline_rmssd) {
        (None, None) => {}
        (hr, rmssd) => pipeline.set_baseline(
            hr.unwrap_or(DEFAULT_BASELINE_HR_BPM),
            rmssd.unwrap_or(DEFAULT_BASELINE_RMSSD_MS),
        ),
    }
    Ok(pipeline)
}

#[derive(Serialize)]
struct TickLine<'a> {
    timestamp: f64,
    #[serde(flatten)]
    outputs: &'a rpulse_lib::TickOutputs,
}

fn drive(source: &mut dyn FrameSource, args: &PipelineArgs) -> Result<()> {
    let mut pipeline = build_pipeline(args)?;
    let cancel = AtomicBool::new(false);
    let every_tick = args.every_tick;
    let mut write_error = None;
    let summary = run_session(source, &mut pipeline, &cancel, |sample, outputs| {
        if every_tick && write_error.is_none() {
            let line = TickLine {
                timestamp: sample.timestamp,
                outputs,
            };
            match serde_json::to_string(&line) {
                Ok(js) => println!("{}", js),
                Err(e) => write_error = Some(e),
            }
        }
    })?;
    if let Some(e) = write_error {
        return Err(e.into());
    }
    if !every_tick {
        println!("{}", serde_json::to_string(&summary)?);
    }
    Ok(())
}

fn cmd_process(input: &Path, args: &PipelineArgs) -> Result<()> {
    let samples = ticks_io::read_ticks(input)?;
    log::info!("loaded {} ticks from {}", samples.len(), input.display());
    let mut source = ReplaySource::new(samples);
    drive(&mut source, args)
}

fn cmd_simulate(
    cfg: SyntheticConfig,
    seed: u64,
    save_ticks: Option<&Path>,
    args: &PipelineArgs,
) -> Result<()> {
    if !(cfg.fps > 0.0 && cfg.duration_s > 0.0 && cfg.bpm > 0.0) {
        bail!("bpm, fps and duration must be positive");
    }
    let mut source = SyntheticSource::new(cfg, StdRng::seed_from_u64(seed));
    match save_ticks {
        Some(path) => {
            let mut samples = Vec::new();
            while let Some(sample) = source.next_sample()? {
                samples.push(sample);
            }
            ticks_io::write_ticks(path, &samples)?;
            drive(&mut ReplaySource::new(samples), args)
        }
        None => drive(&mut source, args),
    }
}

#[derive(Serialize)]
struct SpectrumReport {
    estimate: Option<SpectralEstimate>,
    spectrum: SpectrumResult,
}

fn cmd_spectrum(
    input: Option<&Path>,
    fs: f64,
    band: (f64, f64),
    bins: usize,
    method: SpectrumMethod,
) -> Result<()> {
    if !(fs > 0.0) {
        bail!("--fs must be positive");
    }
    if band.0 >= band.1 || bins < 2 {
        bail!("need f0 < f1 and at least 2 bins");
    }
    let data = read_values(input)?;
    let spectrum = match method {
        SpectrumMethod::Goertzel => spectrum(&data, fs, band, bins),
        SpectrumMethod::Fft => fft_spectrum(&data, fs, band),
    };
    let report = SpectrumReport {
        estimate: spectrum.estimate(),
        spectrum,
    };
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

fn cmd_rmssd(input: Option<&Path>) -> Result<()> {
    let intervals = read_values(input)?;
    println!("{}", serde_json::to_string(&hrv_summary(&intervals))?);
    Ok(())
}

#[derive(Serialize)]
struct FocusReport {
    focus_score: u8,
    baseline: Baseline,
    note: &'static str,
}

fn cmd_focus(hr: f64, rmssd: f64, baseline_hr: f64, baseline_rmssd: f64) -> Result<()> {
    let baseline = Baseline {
        heart_rate_bpm: baseline_hr,
        rmssd_ms: baseline_rmssd,
    };
    let report = FocusReport {
        focus_score: focus_score(hr, rmssd, &baseline),
        baseline,
        note: "experimental heuristic, not a validated physiological measure",
    };
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

fn cmd_plot(input: &Path, out: &Path, view: PlotView, config: Option<&Path>) -> Result<()> {
    let cfg = load_config(config)?;
    let mut pipeline = Pipeline::new(cfg.clone())?;
    let mut source = ReplaySource::new(ticks_io::read_ticks(input)?);
    run_session(&mut source, &mut pipeline, &AtomicBool::new(false), |_, _| {})?;
    let segment = pipeline
        .buffer()
        .filtered_segment(cfg.analysis_window_seconds);
    if segment.is_empty() {
        bail!("{} contains no usable ticks", input.display());
    }
    let fig = match view {
        PlotView::Waveform => figure_from_waveform(&segment, 2048),
        PlotView::Spectrum => figure_from_spectrum(&spectrum(
            &segment.data,
            segment.fs,
            cfg.spectral_band_hz,
            cfg.spectral_bins,
        )),
    };
    draw_plotters_figure(out, &fig)
}

fn draw_plotters_figure(path: &Path, fig: &Figure) -> Result<()> {
    let (x_min, mut x_max, y_min, mut y_max) = fig.bounds().unwrap_or((0.0, 1.0, 0.0, 1.0));
    if x_max <= x_min {
        x_max = x_min + 1.0;
    }
    if y_max <= y_min {
        y_max = y_min + 1.0;
    }
    let backend = BitMapBackend::new(path, (800, 480));
    let root = backend.into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption(
            fig.title.clone().unwrap_or_else(|| "Plot".into()),
            ("sans-serif", 24),
        )
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
    chart
        .configure_mesh()
        .x_desc(fig.x.label.clone().unwrap_or_default())
        .y_desc(fig.y.label.clone().unwrap_or_default())
        .draw()?;
    for line in &fig.series {
        let (r, g, b) = line.color.rgb();
        chart.draw_series(LineSeries::new(
            line.points.iter().map(|p| (p[0], p[1])),
            &RGBColor(r, g, b),
        ))?;
    }
    if let Some(x) = fig.marker_x {
        chart.draw_series(LineSeries::new([(x, y_min), (x, y_max)], &BLACK))?;
    }
    root.present()?;
    Ok(())
}
