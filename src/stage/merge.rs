use futures_util::{Stream, StreamExt};
use subtitle_extract_types::FrameClock;

use super::{FrameRecord, PipelineError};
use crate::subtitle::SubtitleSegment;

/// A maximal run of adjacent, equivalent items.
#[derive(Debug, Clone, PartialEq)]
pub struct Run<T> {
    pub head: T,
    tail: Option<T>,
    len: usize,
}

impl<T> Run<T> {
    fn new(head: T) -> Self {
        Self {
            head,
            tail: None,
            len: 1,
        }
    }

    pub fn last(&self) -> &T {
        self.tail.as_ref().unwrap_or(&self.head)
    }

    /// Number of items in the run; never zero.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.len
    }
}

/// Folds a chronological sequence into runs.
///
/// `joins(run, next)` decides whether `next` extends the open run; when it
/// does not, the open run is closed and handed back from [`push`](Self::push).
pub struct RunCollapser<T, F> {
    open: Option<Run<T>>,
    joins: F,
}

impl<T, F> RunCollapser<T, F>
where
    F: FnMut(&Run<T>, &T) -> bool,
{
    pub fn new(joins: F) -> Self {
        Self { open: None, joins }
    }

    pub fn push(&mut self, item: T) -> Option<Run<T>> {
        if let Some(run) = self.open.as_mut()
            && (self.joins)(&*run, &item)
        {
            run.tail = Some(item);
            run.len += 1;
            return None;
        }
        self.open.replace(Run::new(item))
    }

    pub fn finish(self) -> Option<Run<T>> {
        self.open
    }
}

type RecordJoin = fn(&Run<FrameRecord>, &FrameRecord) -> bool;

fn same_outcome(run: &Run<FrameRecord>, next: &FrameRecord) -> bool {
    run.head.status == next.status && run.head.text == next.text
}

/// Collapses ordered frame records into subtitle segments.
///
/// Records join a segment while status and text stay the same. A segment
/// ends at the key following its last record, and segments without text are
/// dropped.
pub struct SegmentMerger {
    clock: FrameClock,
    runs: RunCollapser<FrameRecord, RecordJoin>,
}

impl SegmentMerger {
    pub fn new(clock: FrameClock) -> Self {
        Self {
            clock,
            runs: RunCollapser::new(same_outcome as RecordJoin),
        }
    }

    pub fn push(&mut self, record: FrameRecord) -> Option<SubtitleSegment> {
        let closed = self.runs.push(record)?;
        segment_from_run(self.clock, closed)
    }

    pub fn finish(self) -> Option<SubtitleSegment> {
        let closed = self.runs.finish()?;
        segment_from_run(self.clock, closed)
    }
}

fn segment_from_run(clock: FrameClock, run: Run<FrameRecord>) -> Option<SubtitleSegment> {
    if run.head.text.is_empty() {
        return None;
    }
    let end = clock.advance(run.last().key);
    Some(SubtitleSegment::new(run.head.key, end, run.head.text))
}

/// Drains an ordered record stream into segments.
///
/// Stops at the first error; segments gathered so far are discarded with it.
pub async fn merge_records<S, F>(
    clock: FrameClock,
    records: S,
    mut on_record: F,
) -> Result<Vec<SubtitleSegment>, PipelineError>
where
    S: Stream<Item = Result<FrameRecord, PipelineError>>,
    F: FnMut(&FrameRecord),
{
    let mut merger = SegmentMerger::new(clock);
    let mut segments = Vec::new();
    let mut records = std::pin::pin!(records);
    while let Some(record) = records.next().await {
        let record = record?;
        on_record(&record);
        segments.extend(merger.push(record));
    }
    segments.extend(merger.finish());
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use subtitle_extract_types::FrameKey;

    use super::*;
    use crate::stage::TaskStatus;

    fn clock() -> FrameClock {
        FrameClock::new(2, 1, Duration::from_secs(1)).unwrap()
    }

    fn record(key: FrameKey, status: TaskStatus, text: &str) -> FrameRecord {
        FrameRecord {
            key,
            status,
            text: text.to_string(),
            idle: Duration::ZERO,
        }
    }

    #[test]
    fn collapser_yields_maximal_runs() {
        let mut runs = RunCollapser::new(|run: &Run<u32>, next: &u32| run.last() + 1 == *next);
        let mut closed = Vec::new();
        for item in [1, 2, 3, 7, 8, 10] {
            closed.extend(runs.push(item));
        }
        closed.extend(runs.finish());
        let spans: Vec<_> = closed
            .iter()
            .map(|run| (run.head, *run.last(), run.len()))
            .collect();
        assert_eq!(spans, vec![(1, 3, 3), (7, 8, 2), (10, 10, 1)]);
    }

    #[test]
    fn equal_records_form_one_segment_ending_after_the_last() {
        let keys: Vec<_> = clock()
            .keys(Duration::from_secs(10), Duration::from_secs(13))
            .collect();
        let mut merger = SegmentMerger::new(clock());
        let mut out = Vec::new();
        out.extend(merger.push(record(keys[0], TaskStatus::Empty, "")));
        out.extend(merger.push(record(keys[1], TaskStatus::Recognized, "hello")));
        out.extend(merger.push(record(keys[2], TaskStatus::Recognized, "hello")));
        out.extend(merger.push(record(keys[3], TaskStatus::Recognized, "hello")));
        out.extend(merger.push(record(keys[4], TaskStatus::Empty, "")));
        out.extend(merger.push(record(keys[5], TaskStatus::Recognized, "bye")));
        out.extend(merger.finish());

        assert_eq!(
            out,
            vec![
                SubtitleSegment::new(keys[1], keys[4], "hello"),
                SubtitleSegment::new(keys[5], FrameKey::new(Duration::from_secs(13), 0), "bye"),
            ]
        );
    }

    #[test]
    fn status_change_splits_identical_text() {
        let keys: Vec<_> = clock()
            .keys(Duration::ZERO, Duration::from_secs(2))
            .collect();
        let mut merger = SegmentMerger::new(clock());
        let mut out = Vec::new();
        out.extend(merger.push(record(keys[0], TaskStatus::Recognized, "same")));
        out.extend(merger.push(record(keys[1], TaskStatus::Cached, "same")));
        out.extend(merger.push(record(keys[2], TaskStatus::Cached, "same")));
        out.extend(merger.finish());

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].end, keys[1]);
        assert_eq!(out[1].start, keys[1]);
        assert_eq!(out[1].end, keys[3]);
    }

    #[tokio::test]
    async fn merge_records_stops_on_error() {
        let key = FrameKey::new(Duration::ZERO, 0);
        let items = vec![
            Ok(record(key, TaskStatus::Recognized, "text")),
            Err(PipelineError::Invariant {
                message: "boom".into(),
            }),
        ];
        let result = merge_records(clock(), futures_util::stream::iter(items), |_| {}).await;
        assert!(matches!(result, Err(PipelineError::Invariant { .. })));
    }
}
