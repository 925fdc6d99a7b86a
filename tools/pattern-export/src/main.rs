//! pattern-export - pattern generator ROM tool
//!
//! Appends captured patterns to a ROM set and dumps decoded fields

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use pattern_export::{decode, manifest};

#[derive(Parser)]
#[command(name = "pattern-export")]
#[command(about = "Pattern generator ROM tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode the job's patterns into a new ROM set
    Build {
        /// Path to job manifest
        #[arg(default_value = "job.toml")]
        manifest: PathBuf,

        /// Output directory (overrides manifest)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate job manifest without building
    Check {
        /// Path to job manifest
        #[arg(default_value = "job.toml")]
        manifest: PathBuf,
    },

    /// Decode one field to raw planes
    Decode {
        /// Hardware manifest
        #[arg(long)]
        hardware: PathBuf,

        /// Directory holding the chip images
        #[arg(long)]
        roms: PathBuf,

        /// Field slot to decode
        #[arg(short, long, default_value_t = 0)]
        field: usize,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Luma column to trace stripes under (repeatable)
        #[arg(long = "mark-column")]
        mark_column: Vec<usize>,

        /// Output row to trace stripes along (repeatable)
        #[arg(long = "mark-row")]
        mark_row: Vec<usize>,

        /// Chroma gain for preview planes
        #[arg(long)]
        chroma_gain: Option<f32>,
    },

    /// List the decoded vectors of one field
    Vectors {
        /// Hardware manifest
        #[arg(long)]
        hardware: PathBuf,

        /// Directory holding the chip images
        #[arg(long)]
        roms: PathBuf,

        /// Field slot to decode
        #[arg(short, long, default_value_t = 0)]
        field: usize,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build { manifest, output } => {
            tracing::info!("Building patterns from {:?}", manifest);
            let job = manifest::load_manifest(&manifest)?;
            manifest::build_all(&job, output.as_deref())?;
            tracing::info!("Build complete!");
        }
        Commands::Check { manifest } => {
            tracing::info!("Checking job {:?}", manifest);
            let job = manifest::load_manifest(&manifest)?;
            manifest::validate(&job)?;
            tracing::info!("Job is valid!");
        }
        Commands::Decode {
            hardware,
            roms,
            field,
            output,
            mark_column,
            mark_row,
            chroma_gain,
        } => {
            tracing::info!("Decoding field {} of {:?} -> {:?}", field, roms, output);
            let request = decode::DecodeRequest {
                hardware,
                roms,
                field,
                output,
                mark_columns: mark_column,
                mark_rows: mark_row,
                chroma_gain,
            };
            let frame = decode::decode_field(&request)?;
            tracing::info!("Done! ({}x{})", frame.width, frame.height);
        }
        Commands::Vectors {
            hardware,
            roms,
            field,
        } => {
            decode::list_vectors(&hardware, &roms, field)?;
        }
    }

    Ok(())
}
