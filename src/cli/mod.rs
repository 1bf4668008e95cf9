// Command-line interface for mediatree
//
// Argument parsing lives here; the subcommands are in `commands` and
// rendering in `output`.

pub mod commands;
pub mod output;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mediatree::{Options, ReadMode};
use std::path::PathBuf;

pub use output::{OutputFormat, OutputFormatter};

/// mediatree - inspect ASF, ID3, MP4 and MPEG audio files
#[derive(Parser, Debug)]
#[command(name = "mediatree")]
#[command(about = "Inspect the object trees and metadata of media files", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, default_value = "pretty", global = true)]
    pub format: OutputFormat,

    /// Quiet mode (only print results)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log decoder activity (same as RUST_LOG=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Reader options as a JSON file
    #[arg(long, value_name = "JSON", global = true)]
    pub options: Option<PathBuf>,

    /// How MPEG frames are read
    #[arg(long, value_enum, global = true)]
    pub read_mode: Option<ReadModeArg>,

    /// Frames sampled by the lazy bitrate estimate
    #[arg(long, global = true)]
    pub precision: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read metadata from media file(s)
    Read {
        /// File paths or glob patterns
        #[arg(value_name = "FILE")]
        files: Vec<String>,

        /// Write the output to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Save embedded cover art into this directory
        #[arg(long, value_name = "DIR")]
        covers: Option<PathBuf>,
    },
    /// Detect the container format
    Detect {
        #[arg(value_name = "FILE")]
        files: Vec<String>,
    },
    /// Dump the decoded object tree depth-first
    Tree {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Compare the MPEG bitrate estimate with the exact scan
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReadModeArg {
    Eager,
    Lazy,
}

impl From<ReadModeArg> for ReadMode {
    fn from(arg: ReadModeArg) -> Self {
        match arg {
            ReadModeArg::Eager => ReadMode::Eager,
            ReadModeArg::Lazy => ReadMode::Lazy,
        }
    }
}

impl Cli {
    /// Options file first, then command-line overrides
    pub fn reader_options(&self) -> Result<Options> {
        let mut options = match &self.options {
            Some(path) => Options::from_json_file(path)
                .with_context(|| format!("cannot load options from {}", path.display()))?,
            None => Options::default(),
        };
        if let Some(mode) = self.read_mode {
            options = options.with_read_mode(mode.into());
        }
        if let Some(precision) = self.precision {
            options = options.with_estimate_precision(precision);
        }
        options.validate().context("invalid reader options")?;
        Ok(options)
    }
}

/// Expand glob patterns; plain paths pass through unchanged
pub fn expand_files(patterns: &[String]) -> Result<Vec<PathBuf>> {
    if patterns.is_empty() {
        bail!("no files specified");
    }
    let mut files = Vec::new();
    for pattern in patterns {
        let matches: Vec<PathBuf> = glob::glob(pattern)
            .with_context(|| format!("bad file pattern {}", pattern))?
            .filter_map(|entry| entry.ok())
            .collect();
        if matches.is_empty() {
            files.push(PathBuf::from(pattern));
        } else {
            files.extend(matches);
        }
    }
    Ok(files)
}

pub fn run(cli: &Cli) -> Result<()> {
    let options = cli.reader_options()?;
    let formatter = OutputFormatter::new(cli.format, cli.quiet);
    match &cli.command {
        Commands::Read { files, output, covers } => {
            commands::command_read(&expand_files(files)?, output.as_deref(), covers.as_deref(), &options, &formatter)
        }
        Commands::Detect { files } => commands::command_detect(&expand_files(files)?, &formatter),
        Commands::Tree { file } => commands::command_tree(file, &options, &formatter),
        Commands::Info { file } => commands::command_info(file, &options, &formatter),
    }
}
