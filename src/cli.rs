use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use subtitle_extract_types::{TypesError, parse_clock};

use crate::settings::DEFAULT_CONFIG_PATH;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default, ValueEnum)]
pub enum OcrBackend {
    /// Run the `tesseract` command line tool for every region
    #[default]
    Tesseract,
    /// Recognize nothing; useful for tuning segmentation
    Noop,
}

#[derive(Debug, Parser)]
#[command(
    name = "subtitle-extract",
    version,
    about = "Extract hard-coded subtitles from videos",
    disable_help_subcommand = true
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate the default configuration file
    New(NewArgs),
    /// Slice a video into frames
    Slice(SliceArgs),
    /// Check the configuration against a sample frame
    Check(CheckArgs),
    /// Run OCR over sliced frames
    Ocr(OcrArgs),
    /// Convert OCR results to a subtitle file
    Conv(ConvArgs),
}

#[derive(Debug, Args)]
pub struct ConfigArg {
    /// Configuration file
    #[arg(short = 'c', long = "config", value_name = "CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub path: PathBuf,
}

#[derive(Debug, Args)]
pub struct TimeRange {
    /// Beginning, formatted as hh:mm:ss
    #[arg(short = 's', long = "begin", value_name = "TIME", default_value = "00:00:00", value_parser = parse_time)]
    pub begin: Duration,

    /// Ending, formatted as hh:mm:ss; frames stop at the first missing one
    #[arg(short = 't', long = "end", value_name = "TIME", default_value = "99:59:59", value_parser = parse_time)]
    pub end: Duration,
}

#[derive(Debug, Args)]
pub struct NewArgs {
    #[command(flatten)]
    pub config: ConfigArg,
}

#[derive(Debug, Args)]
pub struct SliceArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Input video
    #[arg(short = 'i', long = "input", value_name = "VIDEO")]
    pub input: PathBuf,

    /// Directory to store frames in
    #[arg(short = 'd', long = "dir", value_name = "DIR")]
    pub dir: PathBuf,

    #[command(flatten)]
    pub range: TimeRange,

    /// Path of the ffmpeg executable
    #[arg(long = "ffmpeg", value_name = "PATH", default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,

    /// Hide the progress spinner
    #[arg(long = "no-progress")]
    pub no_progress: bool,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Sample frame to test against
    #[arg(short = 'i', long = "input", value_name = "IMAGE")]
    pub input: PathBuf,

    /// Save a debugging image showing what each stage kept
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    #[arg(long = "ocr-backend", value_enum, default_value_t = OcrBackend::Tesseract)]
    pub ocr_backend: OcrBackend,
}

#[derive(Debug, Args)]
pub struct OcrArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Directory holding sliced frames
    #[arg(short = 'd', long = "dir", value_name = "DIR")]
    pub dir: PathBuf,

    #[command(flatten)]
    pub range: TimeRange,

    /// Where to save OCR results
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: PathBuf,

    /// Frames processed at once
    #[arg(
        short = 'j',
        long = "concurrency",
        value_name = "X",
        default_value_t = 1,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub concurrency: u32,

    #[arg(long = "ocr-backend", value_enum, default_value_t = OcrBackend::Tesseract)]
    pub ocr_backend: OcrBackend,

    /// Hide the progress spinner
    #[arg(long = "no-progress")]
    pub no_progress: bool,
}

#[derive(Debug, Args)]
pub struct ConvArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// OCR results to read
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    pub input: PathBuf,

    /// Where to save formatted subtitles
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: PathBuf,
}

fn parse_time(value: &str) -> Result<Duration, TypesError> {
    parse_clock(value)
}

pub fn parse_cli() -> CliArgs {
    CliArgs::parse()
}
