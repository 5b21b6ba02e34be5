use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use subtitle_extract_ocr::Replacer;
use subtitle_extract_types::{FrameClock, FrameKey, RelativeValue, format_clock, parse_clock, similar};
use thiserror::Error;

use crate::stage::{Run, RunCollapser};

#[derive(Debug, Error)]
pub enum SubtitleError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("unsupported subtitle format '{value}' (expected raw, srt, lrc or plain)")]
    Format { value: String },
}

impl SubtitleError {
    fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubtitleFormat {
    /// One `start->end "text"` line per segment, keyed by frame.
    Raw,
    #[default]
    Srt,
    Lrc,
    Plain,
}

impl SubtitleFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubtitleFormat::Raw => "raw",
            SubtitleFormat::Srt => "srt",
            SubtitleFormat::Lrc => "lrc",
            SubtitleFormat::Plain => "plain",
        }
    }
}

impl FromStr for SubtitleFormat {
    type Err = SubtitleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "raw" => Ok(SubtitleFormat::Raw),
            "srt" => Ok(SubtitleFormat::Srt),
            "lrc" => Ok(SubtitleFormat::Lrc),
            "plain" => Ok(SubtitleFormat::Plain),
            _ => Err(SubtitleError::Format {
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for SubtitleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text shown from `start` up to, but not including, `end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleSegment {
    pub start: FrameKey,
    pub end: FrameKey,
    pub text: String,
}

impl SubtitleSegment {
    pub fn new(start: FrameKey, end: FrameKey, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// `hh:mm:ss/ff->hh:mm:ss/ff "text"` with the text as a JSON string.
    pub fn to_raw_line(&self) -> String {
        format!("{}->{} {}", self.start, self.end, quote(&self.text))
    }

    pub fn parse_raw_line(line: &str, number: usize) -> Result<Self, SubtitleError> {
        let (start, rest) = line
            .split_once("->")
            .ok_or_else(|| SubtitleError::parse(number, "missing '->'"))?;
        let (end, text) = rest
            .trim_start()
            .split_once(' ')
            .ok_or_else(|| SubtitleError::parse(number, "missing text"))?;
        let text: String = serde_json::from_str(text.trim())
            .map_err(|err| SubtitleError::parse(number, format!("invalid text: {err}")))?;
        Ok(Self {
            start: parse_key(start, number)?,
            end: parse_key(end, number)?,
            text,
        })
    }
}

fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("{text:?}"))
}

fn parse_key(value: &str, number: usize) -> Result<FrameKey, SubtitleError> {
    let (time, frame) = value
        .trim()
        .split_once('/')
        .ok_or_else(|| SubtitleError::parse(number, format!("invalid frame key '{value}'")))?;
    let time = parse_clock(time).map_err(|err| SubtitleError::parse(number, err.to_string()))?;
    let frame = frame
        .parse()
        .map_err(|_| SubtitleError::parse(number, format!("invalid frame index '{frame}'")))?;
    Ok(FrameKey::new(time, frame))
}

pub fn parse_raw(contents: &str) -> Result<Vec<SubtitleSegment>, SubtitleError> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| SubtitleSegment::parse_raw_line(line, index + 1))
        .collect()
}

/// Applies `replacer` to each entry and joins neighbours that touch in time
/// and whose texts are similar under `merge`. A merged entry keeps its first
/// text; entries left without text are dropped.
pub fn merge_similar(
    segments: Vec<SubtitleSegment>,
    replacer: &Replacer,
    merge: &RelativeValue,
) -> Vec<SubtitleSegment> {
    let mut runs = RunCollapser::new(|run: &Run<SubtitleSegment>, next: &SubtitleSegment| {
        run.last().end == next.start && similar(&run.head.text, &next.text, merge)
    });
    let mut merged = Vec::new();
    for mut segment in segments {
        segment.text = replacer.apply(&segment.text);
        merged.extend(runs.push(segment).and_then(collapse));
    }
    merged.extend(runs.finish().and_then(collapse));
    merged
}

fn collapse(run: Run<SubtitleSegment>) -> Option<SubtitleSegment> {
    if run.head.text.is_empty() {
        return None;
    }
    let end = run.last().end;
    Some(SubtitleSegment {
        end,
        ..run.head
    })
}

pub fn render(format: SubtitleFormat, segments: &[SubtitleSegment], clock: &FrameClock) -> String {
    match format {
        SubtitleFormat::Raw => render_raw(segments),
        SubtitleFormat::Srt => render_srt(segments, clock),
        SubtitleFormat::Lrc => render_lrc(segments, clock),
        SubtitleFormat::Plain => render_plain(segments),
    }
}

pub fn render_raw(segments: &[SubtitleSegment]) -> String {
    let mut output = String::new();
    for segment in segments {
        let _ = writeln!(&mut output, "{}", segment.to_raw_line());
    }
    output
}

pub fn render_srt(segments: &[SubtitleSegment], clock: &FrameClock) -> String {
    let mut output = String::new();
    for (index, segment) in segments.iter().enumerate() {
        let _ = writeln!(&mut output, "{}", index + 1);
        let _ = writeln!(
            &mut output,
            "{} --> {}",
            srt_timestamp(segment.start, clock),
            srt_timestamp(segment.end, clock)
        );
        let _ = writeln!(&mut output, "{}", segment.text);
        output.push('\n');
    }
    output
}

pub fn render_lrc(segments: &[SubtitleSegment], clock: &FrameClock) -> String {
    let mut output = String::new();
    for segment in segments {
        let _ = writeln!(
            &mut output,
            "[{}.{:02}]{}",
            format_clock(segment.start.time),
            clock.millis(segment.start.frame) / 10,
            segment.text
        );
    }
    output
}

pub fn render_plain(segments: &[SubtitleSegment]) -> String {
    let mut output = String::new();
    for segment in segments {
        let _ = writeln!(&mut output, "{}", segment.text);
    }
    output
}

fn srt_timestamp(key: FrameKey, clock: &FrameClock) -> String {
    format!("{},{:03}", format_clock(key.time), clock.millis(key.frame))
}

pub async fn read_raw(path: &Path) -> Result<Vec<SubtitleSegment>, SubtitleError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SubtitleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    parse_raw(&contents)
}

/// Writes `contents` to `path`, creating missing parent directories.
pub async fn write_file(path: &Path, contents: &str) -> Result<(), SubtitleError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| SubtitleError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| SubtitleError::Io {
            path: path.to_path_buf(),
            source,
        })
}
