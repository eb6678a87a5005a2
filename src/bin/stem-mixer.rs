use std::{collections::BTreeSet, path::PathBuf, process::ExitCode};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use stem_mixer_core::{
    band_gain, conform,
    core::dsp::peak,
    mix_with, read_audio, set_progress_callback, write_audio, BandGains, Gain, GainMap,
    MixOptions, OutputFormat, Session, SessionOptions, SessionProgress, StemLabel, StemSet,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stem-mixer")]
#[command(about = "Remix separated stems, render karaoke versions and extract lyrics", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Mix already separated stem files
    Mix {
        #[command(flatten)]
        stems: StemArgs,

        /// Stem to silence (repeatable)
        #[arg(long, value_parser = parse_label)]
        mute: Vec<StemLabel>,
    },

    /// Mix stem files with the vocals silenced
    Karaoke {
        #[command(flatten)]
        stems: StemArgs,
    },

    /// Apply a static low/mid/high gain to a single file
    Band {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, default_value_t = 1.0)]
        low: f32,

        #[arg(long, default_value_t = 1.0)]
        mid: f32,

        #[arg(long, default_value_t = 1.0)]
        high: f32,

        #[arg(long, default_value_t = 250.0)]
        low_cutoff: f32,

        #[arg(long, default_value_t = 4000.0)]
        high_cutoff: f32,
    },

    /// Separate a track, render a preview and a karaoke version
    Run {
        #[arg(short, long)]
        input: PathBuf,

        /// Directory to copy the rendered files into
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// JSON file with session options
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        model: Option<String>,

        #[arg(long, value_parser = parse_format)]
        format: Option<OutputFormat>,

        /// Per-stem gain in dB, e.g. `--gain drums=-3`
        #[arg(long, value_parser = parse_db)]
        gain: Vec<(StemLabel, Gain)>,

        /// Also extract lyrics
        #[arg(long)]
        lyrics: bool,

        /// Keep the session working directory
        #[arg(long)]
        keep: bool,
    },
}

#[derive(Args)]
struct StemArgs {
    /// Stem file as `label=path` (repeatable)
    #[arg(short, long = "stem", value_parser = parse_stem, required = true)]
    stems: Vec<(StemLabel, PathBuf)>,

    /// Gain in dB as `label=db` (repeatable)
    #[arg(long, value_parser = parse_db)]
    gain: Vec<(StemLabel, Gain)>,

    /// Linear gain as `label=x` (repeatable)
    #[arg(long, value_parser = parse_linear)]
    linear: Vec<(StemLabel, Gain)>,

    /// Resample all stems to this rate before mixing
    #[arg(long)]
    resample: Option<u32>,

    #[arg(long)]
    no_clip: bool,

    #[arg(short, long)]
    output: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Mix { stems, mute } => handle_mix(stems, mute.into_iter().collect()),
        Commands::Karaoke { stems } => handle_mix(stems, BTreeSet::from([StemLabel::Vocals])),
        Commands::Band {
            input,
            output,
            low,
            mid,
            high,
            low_cutoff,
            high_cutoff,
        } => handle_band(
            input,
            output,
            BandGains {
                low,
                mid,
                high,
                low_cutoff_hz: low_cutoff,
                high_cutoff_hz: high_cutoff,
            },
        ),
        Commands::Run {
            input,
            output,
            config,
            model,
            format,
            gain,
            lyrics,
            keep,
        } => handle_run(RunArgs {
            input,
            output,
            config,
            model,
            format,
            gains: gain.into_iter().collect(),
            lyrics,
            keep,
            quiet: cli.quiet,
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = if quiet { "error" } else { filter };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn handle_mix(args: StemArgs, mute: BTreeSet<StemLabel>) -> anyhow::Result<()> {
    let mut stems = StemSet::new();
    for (label, path) in &args.stems {
        let audio = read_audio(path).with_context(|| format!("Loading {label} stem"))?;
        stems.insert(*label, audio);
    }
    if let Some(rate) = args.resample {
        stems = conform(&stems, rate)?;
    }

    let gains: GainMap = args.gain.into_iter().chain(args.linear).collect();
    let opts = MixOptions {
        clip: !args.no_clip,
    };

    let mixed = mix_with(&stems, &gains, &mute, &opts)?;
    write_audio(&args.output, &mixed)?;

    info!(
        "Mixed {} stems, {:.2}s, peak {:.3}",
        stems.len(),
        mixed.duration_secs(),
        peak(&mixed.samples)
    );
    println!("{}", args.output.display());
    Ok(())
}

fn handle_band(input: PathBuf, output: PathBuf, bands: BandGains) -> anyhow::Result<()> {
    let audio = read_audio(&input)?;
    let processed = band_gain(&audio, &bands)?;
    write_audio(&output, &processed)?;
    println!("{}", output.display());
    Ok(())
}

struct RunArgs {
    input: PathBuf,
    output: PathBuf,
    config: Option<PathBuf>,
    model: Option<String>,
    format: Option<OutputFormat>,
    gains: GainMap,
    lyrics: bool,
    keep: bool,
    quiet: bool,
}

fn handle_run(args: RunArgs) -> anyhow::Result<()> {
    let mut options = match &args.config {
        Some(path) => SessionOptions::from_json_file(path)?,
        None => SessionOptions::default(),
    }
    .with_env();
    if let Some(model) = args.model {
        options.separation_model = model;
    }
    if let Some(format) = args.format {
        options.output_format = format;
    }
    options.keep_work_dir |= args.keep;

    if !args.quiet {
        setup_progress_callback();
    }

    let mut session = Session::from_options(options)?;
    session.upload(&args.input)?;
    session.separate()?;

    let preview = session.preview(&args.gains)?;
    let karaoke = session.karaoke(&args.gains)?;

    std::fs::create_dir_all(&args.output)?;
    let mut written = vec![
        copy_out(&preview, &args.output, "mixed_output")?,
        copy_out(&karaoke, &args.output, "karaoke_version")?,
    ];

    if args.lyrics {
        let lyrics = session.transcribe()?;
        written.push(copy_out(&lyrics.path, &args.output, "lyrics")?);
        if !args.quiet {
            eprintln!("{}", lyrics.text);
            eprintln!("Lyrics may not be fully accurate depending on accent or language.");
        }
    }

    for p in written {
        println!("{}", p.display());
    }
    Ok(())
}

fn copy_out(src: &std::path::Path, dir: &std::path::Path, name: &str) -> anyhow::Result<PathBuf> {
    let ext = src.extension().and_then(|e| e.to_str()).unwrap_or("bin");
    let dst = dir.join(format!("{name}.{ext}"));
    std::fs::copy(src, &dst).with_context(|| format!("Copying {} to {}", src.display(), dst.display()))?;
    Ok(dst)
}

fn setup_progress_callback() {
    set_progress_callback(|progress| match progress {
        SessionProgress::Stage(stage) => {
            let stage_name = match stage {
                "upload" => "Storing input",
                "convert" => "Converting to WAV",
                "separate" => "Separating stems",
                "load_stems" => "Loading stems",
                "mix" => "Mixing",
                "encode" => "Encoding",
                "transcribe" => "Transcribing lyrics",
                _ => stage,
            };
            eprintln!("⏳ {}", stage_name);
        }
        SessionProgress::Finished => {}
    });
}

fn split_pair(s: &str) -> Result<(StemLabel, &str), String> {
    let (label, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected `label=value`, got `{s}`"))?;
    let label = label.parse::<StemLabel>().map_err(|e| e.to_string())?;
    Ok((label, value))
}

fn parse_label(s: &str) -> Result<StemLabel, String> {
    s.parse().map_err(|e: stem_mixer_core::MixError| e.to_string())
}

fn parse_stem(s: &str) -> Result<(StemLabel, PathBuf), String> {
    let (label, path) = split_pair(s)?;
    Ok((label, PathBuf::from(path)))
}

fn parse_db(s: &str) -> Result<(StemLabel, Gain), String> {
    let (label, db) = split_pair(s)?;
    let db: f32 = db.parse().map_err(|_| format!("`{db}` is not a number"))?;
    Ok((label, Gain::Decibels(db)))
}

fn parse_linear(s: &str) -> Result<(StemLabel, Gain), String> {
    let (label, g) = split_pair(s)?;
    let g: f32 = g.parse().map_err(|_| format!("`{g}` is not a number"))?;
    Ok((label, Gain::Linear(g)))
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    s.parse().map_err(|e: stem_mixer_core::MixError| e.to_string())
}
