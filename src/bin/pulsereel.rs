use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "pulsereel", version)]
#[command(about = "Turn an audio track and a still image into a beat-pulsed vertical MP4")]
struct Cli {
    /// Input audio file (anything ffmpeg can decode).
    #[arg(long)]
    audio: PathBuf,

    /// Input still image.
    #[arg(long)]
    image: PathBuf,

    /// Output MP4 path. Defaults to a file in the system temp directory.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Rendering preset.
    #[arg(long, value_enum, default_value_t = PresetChoice::Desktop)]
    preset: PresetChoice,

    /// Speech model used for captions.
    #[arg(long, value_enum, default_value_t = ModelChoice::Small)]
    model: ModelChoice,

    /// Skip transcription and render without captions.
    #[arg(long)]
    no_captions: bool,

    /// Caption font file; system fonts are probed when omitted.
    #[arg(long)]
    font: Option<PathBuf>,

    /// Zoom punch-in at the exact beat instant (0.12 => 12%).
    #[arg(long)]
    intensity: Option<f64>,

    /// Half-width of the zoom pulse around each beat, in seconds.
    #[arg(long)]
    radius: Option<f64>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PresetChoice {
    Desktop,
    /// Single encoder thread for memory-constrained hosts.
    Cloud,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModelChoice {
    Tiny,
    Small,
    Medium,
}

impl From<ModelChoice> for pulsereel::ModelSize {
    fn from(choice: ModelChoice) -> Self {
        match choice {
            ModelChoice::Tiny => pulsereel::ModelSize::Tiny,
            ModelChoice::Small => pulsereel::ModelSize::Small,
            ModelChoice::Medium => pulsereel::ModelSize::Medium,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut cfg = match cli.preset {
        PresetChoice::Desktop => pulsereel::RenderConfig::desktop(),
        PresetChoice::Cloud => pulsereel::RenderConfig::cloud(),
    };
    cfg.captions.enabled = !cli.no_captions;
    cfg.captions.model = cli.model.into();
    cfg.captions.font_path = cli.font;
    cfg.encode.out_path = cli.out;
    if let Some(intensity) = cli.intensity {
        cfg.zoom.intensity = intensity;
    }
    if let Some(radius) = cli.radius {
        cfg.zoom.radius_sec = radius;
    }

    let written = pulsereel::render_to_mp4(
        &cli.audio,
        &cli.image,
        &cfg,
        pulsereel::transcribe::whisper_model_cache(),
        &mut |stage| match stage {
            pulsereel::ProgressStage::BeatsAnalyzed { beats } => {
                eprintln!("beats: {beats}");
            }
            pulsereel::ProgressStage::BaseComposed => eprintln!("base image composed"),
            pulsereel::ProgressStage::CaptionsReady { captions } => {
                eprintln!("captions: {captions}");
            }
            pulsereel::ProgressStage::EncodingStarted { total_frames } => {
                eprintln!("encoding {total_frames} frames");
            }
            pulsereel::ProgressStage::EncodingFinished => {}
        },
    )?;

    eprintln!("wrote {}", written.display());
    Ok(())
}
