// src/bin/wavetrim.rs

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

use wavetrim_lib::audio::{extract_waveform_peaks, get_audio_info, SilentTransport, Transport};
use wavetrim_lib::{format_time, Config, Editor};

/// How long to wait for a file to decode before giving up
const MOUNT_TIMEOUT: Duration = Duration::from_secs(120);

/// Choose an audio file, select a region and export it
#[derive(Parser, Debug)]
#[command(name = "wavetrim", version)]
#[command(about = "Trim audio files to a selected region", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print duration, sample rate, channels and codec
    Info { input: PathBuf },

    /// Compute waveform peaks
    Peaks {
        input: PathBuf,

        /// Number of min/max pairs (defaults to the configured value)
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Print the peaks as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export a region the way the editor does
    Trim {
        input: PathBuf,

        #[command(flatten)]
        region: RegionArgs,

        /// Directory the clip is saved into (overrides the configuration)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },

    /// Play a region once through the speakers, stopping at its end
    Preview {
        input: PathBuf,

        #[command(flatten)]
        region: RegionArgs,
    },
}

#[derive(clap::Args, Debug)]
struct RegionArgs {
    /// Region start in seconds (default region when omitted)
    #[arg(short, long, requires = "end")]
    start: Option<f64>,

    /// Region end in seconds
    #[arg(short, long, requires = "start")]
    end: Option<f64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "wavetrim=debug,wavetrim_lib=debug"
    } else {
        "wavetrim=info,wavetrim_lib=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    let config = match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };

    match cli.command {
        Command::Info { input } => info(&input),
        Command::Peaks { input, count, json } => peaks(&input, count.unwrap_or(config.num_peaks), json),
        Command::Trim {
            input,
            region,
            out_dir,
        } => trim(config, &input, &region, out_dir).await,
        Command::Preview { input, region } => preview(config, &input, &region),
    }
}

fn info(input: &Path) -> anyhow::Result<()> {
    let info = get_audio_info(input)?;
    println!("File:        {}", input.display());
    println!(
        "Duration:    {} ({:.2}s)",
        format_time(info.duration_seconds),
        info.duration_seconds
    );
    println!("Sample rate: {} Hz", info.sample_rate);
    println!("Channels:    {}", info.channels);
    println!("Format:      {}", info.format);
    if let Some(bits) = info.bit_depth {
        println!("Bit depth:   {}", bits);
    }
    Ok(())
}

fn peaks(input: &Path, count: usize, json: bool) -> anyhow::Result<()> {
    let peaks = extract_waveform_peaks(input, Some(count))?;
    if json {
        println!("{}", serde_json::to_string(&peaks)?);
    } else {
        for (min, max) in peaks.min_peaks.iter().zip(&peaks.max_peaks) {
            println!("{:>8.4} {:>8.4}", min, max);
        }
    }
    Ok(())
}

/// Load `input` into `editor` and move the active region to `region`
fn load<T: Transport>(editor: &mut Editor<T>, input: &Path, region: &RegionArgs) -> anyhow::Result<()> {
    editor.choose_file_path(input)?;
    if !editor.wait_until_ready(MOUNT_TIMEOUT) {
        bail!("Could not render waveform for {}", input.display());
    }

    if let (Some(start), Some(end)) = (region.start, region.end) {
        let id = editor.session().active_region().id.clone();
        editor.finish_region_drag(&id, start, end)?;
        editor.pump();
    }

    let active = editor.session().active_region();
    tracing::info!(
        "Region {} to {} ({})",
        format_time(active.start()),
        format_time(active.end()),
        format_time(active.bounds.length())
    );
    Ok(())
}

async fn trim(
    mut config: Config,
    input: &Path,
    region: &RegionArgs,
    out_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    if out_dir.is_some() {
        config.download_dir = out_dir;
    }

    let mut editor = Editor::new(config, SilentTransport::new());
    editor.engine().initialize_async().await?;
    load(&mut editor, input, region)?;

    match editor.trim().await {
        Some(path) => {
            println!("{}", path.display());
            Ok(())
        }
        None => bail!("Trimming failed"),
    }
}

#[cfg(feature = "audio-output")]
fn preview(config: Config, input: &Path, region: &RegionArgs) -> anyhow::Result<()> {
    use wavetrim_lib::audio::AudioPlayer;

    let interval = config.poll_interval();
    let mut editor = Editor::new(config, AudioPlayer::new());
    load(&mut editor, input, region)?;

    // A drag restarts playback at the region start; the default region
    // starts at zero already.
    while editor.surface().is_playing() {
        std::thread::sleep(interval);
        editor.pump();
    }
    Ok(())
}

#[cfg(not(feature = "audio-output"))]
fn preview(_config: Config, _input: &Path, _region: &RegionArgs) -> anyhow::Result<()> {
    bail!("wavetrim was built without the `audio-output` feature")
}
