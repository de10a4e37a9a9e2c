use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use clap::{Parser, Subcommand, ValueEnum};
use pulse_visualiser_core::{
    AppConfig, AudioEngine, BeatEvent, BpmEstimate, CountingSurface, FieldConfig, FixedRatePacer,
    Frame, FrameScheduler, Mode, SceneConfig, SessionControl, SessionRequest, Surface,
    ThemePreset, VisualiserError,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

fn main() -> pulse_visualiser_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run_live(&args),
        Commands::Analyse { input, output } => run_analyse(&input, &output),
        Commands::Modes => {
            list_modes();
            Ok(())
        }
        Commands::Themes => {
            list_themes();
            Ok(())
        }
    }
}

fn run_live(args: &RunArgs) -> pulse_visualiser_core::Result<()> {
    let config = args.config()?;
    tracing::info!(source = ?args.source, mode = %config.mode, theme = %config.theme, "starting live mode");

    let engine = AudioEngine::new(&config.audio, config.frame_rate)?;
    let mut scheduler = FrameScheduler::new(engine, &config)?;
    if let Some(mode) = &args.mode {
        // unknown names fall back to the default mode and are logged
        let _ = scheduler.set_mode_by_name(mode);
    }

    match scheduler.start_session(args.session_request()?) {
        Ok(()) => {}
        Err(err) if err.is_device() => {}
        Err(err) => {
            tracing::warn!(%err, "audio session did not start, rendering silence");
            scheduler.resume();
        }
    }

    let mut pacer = FixedRatePacer::new(config.frame_rate, args.frames);
    let mut surface = LoggingSurface::new(config.frame_rate);
    let frames = scheduler.run(&mut pacer, &mut surface);
    tracing::info!(
        frames,
        beats = surface.beats,
        commands = surface.counts.commands,
        "live mode finished"
    );
    Ok(())
}

fn run_analyse(input: &Path, output: &Path) -> pulse_visualiser_core::Result<()> {
    tracing::info!(?input, ?output, "running offline analysis");

    // no particles or points: only the audio pipeline matters here
    let config = AppConfig {
        field: FieldConfig {
            ambient_count: 0,
            ..FieldConfig::default()
        },
        scene: SceneConfig { point_count: 0 },
        seed: Some(0),
        ..AppConfig::default()
    };
    let engine = AudioEngine::new(&config.audio, config.frame_rate)?;
    let mut scheduler = FrameScheduler::new(engine, &config)?;
    scheduler.start_session(SessionRequest::File(input.to_path_buf()))?;

    let period = Duration::from_secs_f64(1.0 / f64::from(config.frame_rate));
    let start = Instant::now();
    let mut report = AnalysisReport {
        input: input.display().to_string(),
        frame_rate: config.frame_rate,
        ticks: Vec::new(),
        beats: Vec::new(),
        bpm_estimate: None,
    };

    while scheduler.source().active().is_some() {
        let index = report.ticks.len() as u32;
        let Some(frame) = scheduler.tick_at(start + period * index) else {
            break;
        };
        report.record(frame);
    }

    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(output, json)?;
    tracing::info!(
        ticks = report.ticks.len(),
        beats = report.beats.len(),
        bpm = ?report.bpm_estimate,
        "analysis written"
    );
    Ok(())
}

fn list_modes() {
    for (index, mode) in Mode::ALL.iter().enumerate() {
        let shortcut = if index < 9 {
            (index + 1).to_string()
        } else {
            "-".to_string()
        };
        println!("{shortcut:>2}  {mode}");
    }
}

fn list_themes() {
    for preset in ThemePreset::ALL {
        let theme = preset.theme();
        println!(
            "{:<10} {} {} {}",
            preset.name(),
            theme.primary,
            theme.secondary,
            theme.tertiary
        );
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

/// Tallies frames and logs the statistics panel once per second.
struct LoggingSurface {
    counts: CountingSurface,
    frame_rate: u64,
    beats: u64,
}

impl LoggingSurface {
    fn new(frame_rate: u32) -> Self {
        Self {
            counts: CountingSurface::default(),
            frame_rate: u64::from(frame_rate.max(1)),
            beats: 0,
        }
    }
}

impl Surface for LoggingSurface {
    fn present(&mut self, frame: &Frame) -> pulse_visualiser_core::Result<()> {
        self.counts.present(frame)?;
        if frame.beat.is_some() {
            self.beats += 1;
        }
        if frame.tick % self.frame_rate == 0 {
            let stats = &frame.stats;
            tracing::info!(
                tick = frame.tick,
                mode = %frame.mode,
                fps = stats.fps,
                grade = ?stats.grade,
                bass = stats.bass_percent,
                treble = stats.treble_percent,
                display_hz = stats.display_frequency,
                bpm = ?stats.bpm,
                commands = self.counts.last_commands,
                "frame"
            );
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct AnalysisReport {
    input: String,
    frame_rate: u32,
    ticks: Vec<TickReport>,
    beats: Vec<BeatEvent>,
    /// Heuristic from the share of loud ticks, not tracked tempo.
    bpm_estimate: Option<BpmEstimate>,
}

impl AnalysisReport {
    fn record(&mut self, frame: &Frame) {
        let snapshot = &frame.snapshot;
        self.ticks.push(TickReport {
            tick: frame.tick,
            seconds: frame.tick as f32 / self.frame_rate as f32,
            bass: snapshot.bass,
            mid: snapshot.mid,
            treble: snapshot.treble,
            average: snapshot.average,
        });
        self.beats.extend(frame.beat);
        self.bpm_estimate = frame.stats.bpm;
    }
}

#[derive(Debug, Serialize)]
struct TickReport {
    tick: u64,
    seconds: f32,
    bass: f32,
    mid: f32,
    treble: f32,
    average: f32,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Audio-reactive visualiser", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tick the visualiser in real time against an audio source.
    Run(RunArgs),
    /// Run the feature and beat pipeline over a WAV file and write a JSON
    /// report.
    Analyse {
        /// WAV file to analyse.
        input: PathBuf,
        /// Where the JSON report is written.
        output: PathBuf,
    },
    /// List the visual modes and their number shortcuts.
    Modes,
    /// List the colour themes.
    Themes,
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Where the audio comes from.
    #[arg(long, value_enum, default_value_t = SourceArg::Demo)]
    source: SourceArg,
    /// Audio file for `--source file`.
    #[arg(long)]
    file: Option<PathBuf>,
    /// Visual mode to start in.
    #[arg(long)]
    mode: Option<String>,
    /// Colour theme to start with.
    #[arg(long)]
    theme: Option<String>,
    /// Stop after this many frames. Runs until interrupted otherwise.
    #[arg(long)]
    frames: Option<u64>,
    /// Target frame rate.
    #[arg(long)]
    fps: Option<u32>,
    /// JSON configuration file; flags override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Mirror the main surface.
    #[arg(long)]
    mirror: bool,
    #[arg(long)]
    sensitivity: Option<f32>,
}

impl RunArgs {
    fn config(&self) -> pulse_visualiser_core::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_path(path)?,
            None => AppConfig::default(),
        };
        if let Some(fps) = self.fps {
            config.frame_rate = fps;
        }
        if let Some(sensitivity) = self.sensitivity {
            config.settings.sensitivity = sensitivity;
        }
        if self.mirror {
            config.settings.mirror = true;
        }
        if let Some(theme) = &self.theme {
            config.theme = theme.parse()?;
        }
        config.validate()?;
        Ok(config)
    }

    fn session_request(&self) -> pulse_visualiser_core::Result<SessionRequest> {
        match (self.source, &self.file) {
            (SourceArg::Demo, _) => Ok(SessionRequest::Synthetic),
            (SourceArg::Mic, _) => Ok(SessionRequest::Microphone),
            (SourceArg::File, Some(path)) => Ok(SessionRequest::File(path.clone())),
            (SourceArg::File, None) => Err(VisualiserError::Config(
                "--source file needs --file <PATH>".into(),
            )),
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum SourceArg {
    Demo,
    Mic,
    File,
}
