use std::collections::VecDeque;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use subtitle_extract_types::{FrameClock, FrameKey, format_clock, parse_clock};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Split};
use tokio::process::Command;

use crate::error::{FrameError, FrameResult};
use crate::layout::FrameLayout;

const STDERR_TAIL_WORDS: usize = 256;
const PROGRESS_PREFIX: &str = "time=";

/// One ffmpeg slicing run over `[begin, end)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceJob {
    pub input: PathBuf,
    pub begin: Duration,
    pub end: Duration,
    pub filters: Vec<String>,
    pub append_args: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceSummary {
    pub renamed: u64,
    /// Set when renaming stopped at a frame ffmpeg never produced.
    pub stopped_at: Option<FrameKey>,
}

/// Drives ffmpeg and moves its numbered output into the frame layout.
#[derive(Debug, Clone)]
pub struct Slicer {
    program: PathBuf,
    layout: FrameLayout,
    clock: FrameClock,
}

impl Slicer {
    pub fn new(layout: FrameLayout, clock: FrameClock) -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            layout,
            clock,
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn args(&self, job: &SliceJob) -> Vec<String> {
        let mut filters = vec![format!(
            "fps={}/{}",
            self.clock.fps(),
            self.clock.interval().as_secs()
        )];
        filters.extend(job.filters.iter().cloned());

        let mut args = vec![
            "-hide_banner".to_string(),
            "-i".to_string(),
            job.input.display().to_string(),
            "-ss".to_string(),
            format_clock(job.begin),
            "-to".to_string(),
            format_clock(job.end),
            "-vf".to_string(),
            filters.join(","),
        ];
        args.extend(job.append_args.iter().cloned());
        args.push(self.layout.staging_pattern().display().to_string());
        args
    }

    /// Runs ffmpeg to completion, renaming frames as progress is reported.
    ///
    /// `on_progress` receives the absolute media time reached so far.
    pub async fn run<F>(&self, job: &SliceJob, mut on_progress: F) -> FrameResult<SliceSummary>
    where
        F: FnMut(Duration),
    {
        let dir = self.layout.dir();
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|err| FrameError::io(dir, err))?;

        let args = self.args(job);
        log::info!("starting ffmpeg with {args:?}");
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| FrameError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        let mut renamer = FrameRenamer::new(self.layout.clone(), self.clock, job.begin);
        let mut tail = StderrTail::default();
        if let Some(stderr) = child.stderr.take() {
            let mut segments = stderr_segments(stderr);
            while let Some(segment) = segments
                .next_segment()
                .await
                .map_err(|err| FrameError::io("<ffmpeg stderr>", err))?
            {
                let segment = String::from_utf8_lossy(&segment);
                for word in segment.split_whitespace() {
                    tail.push(word);
                    let Some(stamp) = word.strip_prefix(PROGRESS_PREFIX) else {
                        continue;
                    };
                    match parse_clock(stamp) {
                        Ok(offset) => {
                            let reached = job.begin.saturating_add(offset);
                            log::debug!("ffmpeg progress report: {word}");
                            on_progress(reached);
                            renamer.advance_to(reached).await?;
                        }
                        Err(_) => log::debug!("unrecognized progress timestamp: {word:?}"),
                    }
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|err| FrameError::io(&self.program, err))?;
        if !status.success() {
            return Err(FrameError::Ffmpeg {
                status,
                stderr: tail.render(),
            });
        }
        on_progress(job.end);
        renamer.advance_to(job.end).await?;
        Ok(renamer.summary())
    }
}

/// Moves staged frames into their keyed location, in clock order.
#[derive(Debug)]
pub struct FrameRenamer {
    layout: FrameLayout,
    clock: FrameClock,
    next: FrameKey,
    counter: u64,
    stopped_at: Option<FrameKey>,
}

impl FrameRenamer {
    pub fn new(layout: FrameLayout, clock: FrameClock, begin: Duration) -> Self {
        Self {
            layout,
            clock,
            next: clock.first(begin),
            counter: 0,
            stopped_at: None,
        }
    }

    /// Renames every frame whose time lies before `until`. Stops for good at
    /// the first staged file that does not exist.
    pub async fn advance_to(&mut self, until: Duration) -> FrameResult<u64> {
        let mut moved = 0;
        while self.stopped_at.is_none() && self.next.time < until {
            let staged = self.layout.staging_path(self.counter + 1);
            let target = self.layout.path(self.next);
            let parent = self.layout.minute_dir(self.next.time);
            tokio::fs::create_dir_all(&parent)
                .await
                .map_err(|err| FrameError::io(&parent, err))?;
            match tokio::fs::rename(&staged, &target).await {
                Ok(()) => {
                    self.counter += 1;
                    moved += 1;
                    self.next = self.clock.advance(self.next);
                }
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    log::info!("frame {} does not exist, renaming stopped", self.next);
                    self.stopped_at = Some(self.next);
                }
                Err(err) => return Err(FrameError::io(staged, err)),
            }
        }
        Ok(moved)
    }

    pub fn summary(&self) -> SliceSummary {
        SliceSummary {
            renamed: self.counter,
            stopped_at: self.stopped_at,
        }
    }
}

/// ffmpeg rewrites its progress line with carriage returns, so line-based
/// reading would only see it once the run is over.
fn stderr_segments<R: AsyncRead + Unpin>(stderr: R) -> Split<BufReader<R>> {
    BufReader::new(stderr).split(b'\r')
}

/// Keeps the last stderr words for error reports.
#[derive(Default)]
struct StderrTail {
    words: VecDeque<String>,
}

impl StderrTail {
    fn push(&mut self, word: &str) {
        if self.words.len() == STDERR_TAIL_WORDS {
            self.words.pop_front();
        }
        self.words.push_back(word.to_string());
    }

    fn render(&self) -> String {
        self.words.iter().cloned().collect::<Vec<_>>().join(" ")
    }
}
