use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use tierturn::{ExbConfig, ExbDocument, HumanTranscript, SegmentExport, TrsDocument};

#[derive(Parser)]
#[command(name = "tierturn")]
#[command(author, version, about = "Timeline consolidation and turn segmentation for transcription documents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sort and deduplicate the common timeline of a tier document
    Consolidate {
        /// Input tier document (.exb)
        #[arg(short, long)]
        input: PathBuf,

        /// Output tier document
        #[arg(short, long)]
        output: PathBuf,

        /// Keep redundant metadata and tier formats
        #[arg(long)]
        keep_metadata: bool,

        /// Give every non-empty event a single trailing space
        #[arg(long)]
        trailing_spaces: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
    /// Add a time point to the common timeline and print its id
    InsertPoint {
        /// Input tier document (.exb)
        #[arg(short, long)]
        input: PathBuf,

        /// Output tier document
        #[arg(short, long)]
        output: PathBuf,

        /// Time in seconds
        #[arg(short, long)]
        time: f64,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
    /// Segment a turn document and export the segments per speaker
    Segments {
        /// Input turn document (.trs)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for segments (JSON)
        #[arg(short, long)]
        output: PathBuf,

        /// Output file for human-readable transcript (text)
        #[arg(long)]
        human_readable: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
    /// Print a summary of a tier or turn document
    Inspect {
        /// Input document (.exb or .trs)
        #[arg(short, long)]
        input: PathBuf,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Consolidate {
            input,
            output,
            keep_metadata,
            trailing_spaces,
            verbose,
        } => {
            setup_logging(verbose);
            consolidate(&input, &output, keep_metadata, trailing_spaces)
        }
        Commands::InsertPoint {
            input,
            output,
            time,
            verbose,
        } => {
            setup_logging(verbose);
            insert_point(&input, &output, time)
        }
        Commands::Segments {
            input,
            output,
            human_readable,
            verbose,
        } => {
            setup_logging(verbose);
            export_segments(&input, &output, human_readable.as_deref())
        }
        Commands::Inspect { input, verbose } => {
            setup_logging(verbose);
            inspect(&input)
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn consolidate(input: &Path, output: &Path, keep_metadata: bool, trailing_spaces: bool) -> Result<()> {
    let config = ExbConfig {
        prune_on_save: !keep_metadata,
        ..Default::default()
    };
    let mut document = ExbDocument::load_with_config(input, config)?;

    if trailing_spaces {
        let padded = document.add_trailing_spaces();
        info!("Added trailing spaces to {} events", padded);
    }

    let report = document.save(output)?;
    info!(
        "Removed {} duplicate time points, rewrote {} references",
        report.points_removed, report.references_rewritten
    );
    Ok(())
}

fn insert_point(input: &Path, output: &Path, time: f64) -> Result<()> {
    if !time.is_finite() || time < 0.0 {
        bail!("Time must be a non-negative number of seconds, got {}", time);
    }

    let mut document = ExbDocument::load(input)?;
    let id = document
        .add_to_timeline(time)
        .context("Failed to update the common timeline")?;
    document.save(output)?;

    println!("{}", id);
    Ok(())
}

fn export_segments(input: &Path, output: &Path, human_readable: Option<&Path>) -> Result<()> {
    info!("Loading turn document from {:?}", input);
    let document = TrsDocument::load(input)?;
    let grouped = document
        .contents()
        .with_context(|| format!("Failed to segment {:?}", input))?;

    info!(
        "Segmented {} turns into {} segments for {} speakers",
        document.turns().len(),
        grouped.segment_count(),
        grouped.speakers.len()
    );

    SegmentExport::from_grouped(&grouped, document.path()).write_json(output)?;
    info!("Output written to {:?}", output);

    if let Some(path) = human_readable {
        HumanTranscript::new(&grouped).write_file(path)?;
        info!("Human-readable output written to {:?}", path);
    }
    Ok(())
}

fn inspect(input: &Path) -> Result<()> {
    match input.extension().and_then(|ext| ext.to_str()) {
        Some("exb") => inspect_exb(input),
        Some("trs") => inspect_trs(input),
        _ => bail!("Unknown document type: {:?} (expected .exb or .trs)", input),
    }
}

fn inspect_exb(input: &Path) -> Result<()> {
    let document = ExbDocument::load(input)?;
    let timeline = document.timeline()?;

    println!("Tier Document");
    println!("=============");
    println!("Speakers: {:?}", document.speakers()?);
    println!("Tiers: {:?}", document.tier_names());
    println!("Time points: {}", timeline.len());
    if let Some(last) = timeline.iter().map(|point| point.time).reduce(f64::max) {
        println!("Last time point: {:.3}s", last);
    }
    match document.referenced_media() {
        Some(media) => println!("Media: {}", media.display()),
        None => println!("Media: none"),
    }
    Ok(())
}

fn inspect_trs(input: &Path) -> Result<()> {
    let document = TrsDocument::load(input)?;

    println!("Turn Document");
    println!("=============");
    println!("Speakers: {:?}", document.speakers());
    println!("Speaker tokens: {:?}", document.raw_speakers());
    if document.directory().is_empty() {
        println!("Speaker directory: none, tokens shown as-is");
    } else {
        println!("Speaker directory: {} entries", document.directory().len());
    }
    println!("Turns: {}", document.turns().len());

    let grouped = document.contents()?;
    println!();
    println!("Speaker Statistics");
    println!("------------------");
    for group in &grouped.speakers {
        let seconds: f64 = group.segments.iter().map(|s| s.duration()).sum();
        println!(
            "{}: {} segments, {:.1}s",
            group.name,
            group.segments.len(),
            seconds
        );
    }
    println!("Incidental events: {}", grouped.incidental_events.len());
    Ok(())
}
