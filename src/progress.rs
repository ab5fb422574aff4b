//! Merge run progress reporting and cancellation.
//!
//! A merge run surfaces a finite, non-restartable sequence of stage
//! events: `analyzing`, one `merging` per processed file, `validating`,
//! then exactly one of `complete` or `error`. The reporter is an explicit
//! state machine over a sink: percentages never decrease, the terminal
//! event fires once, and anything emitted after it is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use serde::Serialize;

use crate::outcome::IntegratorOutput;

/// Stage events observed while a merge run proceeds.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum MergeProgress {
    Analyzing {
        total_files: usize,
    },
    Merging {
        file_path: String,
        processed: usize,
        total: usize,
        percent: u8,
    },
    Validating,
    Complete {
        output: IntegratorOutput,
    },
    Error {
        message: String,
    },
}

impl MergeProgress {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }
}

/// Destination for progress events.
pub trait ProgressSink: Send {
    fn emit(&mut self, event: &MergeProgress);
}

/// Discards every event; used by the synchronous entry point.
#[derive(Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&mut self, _event: &MergeProgress) {}
}

/// Forwards events over a std mpsc channel. Send failures are ignored; a
/// dropped receiver must not abort a merge run.
#[derive(Debug)]
pub struct ChannelSink {
    sender: Sender<MergeProgress>,
}

impl ChannelSink {
    pub fn new(sender: Sender<MergeProgress>) -> Self {
        Self { sender }
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&mut self, event: &MergeProgress) {
        let _ = self.sender.send(event.clone());
    }
}

/// Adapts a closure into a sink.
pub struct FnSink<F>(pub F);

impl<F: FnMut(&MergeProgress) + Send> ProgressSink for FnSink<F> {
    fn emit(&mut self, event: &MergeProgress) {
        (self.0)(event);
    }
}

/// Cooperative cancellation flag, polled at per-file boundaries.
///
/// Clones share the flag. In-flight arbitration calls may be abandoned;
/// already merged files keep their results.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Finite state machine driving a [`ProgressSink`].
pub struct ProgressReporter<'a> {
    sink: &'a mut dyn ProgressSink,
    total: usize,
    processed: usize,
    last_percent: u8,
    finished: bool,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(sink: &'a mut dyn ProgressSink) -> Self {
        Self {
            sink,
            total: 0,
            processed: 0,
            last_percent: 0,
            finished: false,
        }
    }

    pub fn analyzing(&mut self, total_files: usize) {
        if self.finished {
            return;
        }
        self.total = total_files;
        self.sink.emit(&MergeProgress::Analyzing { total_files });
    }

    /// Record one processed file. Percent is `processed / total * 100`,
    /// clamped monotone.
    pub fn merging(&mut self, file_path: &str) {
        if self.finished {
            return;
        }
        self.processed = (self.processed + 1).min(self.total.max(1));
        let raw = if self.total == 0 {
            100
        } else {
            (self.processed * 100 / self.total) as u8
        };
        let percent = raw.max(self.last_percent);
        self.last_percent = percent;

        self.sink.emit(&MergeProgress::Merging {
            file_path: file_path.to_string(),
            processed: self.processed,
            total: self.total,
            percent,
        });
    }

    pub fn validating(&mut self) {
        if self.finished {
            return;
        }
        self.sink.emit(&MergeProgress::Validating);
    }

    /// Terminal success event; at most one terminal event ever fires.
    pub fn complete(&mut self, output: &IntegratorOutput) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.sink.emit(&MergeProgress::Complete {
            output: output.clone(),
        });
    }

    /// Terminal failure event; at most one terminal event ever fires.
    pub fn error(&mut self, message: &str) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.sink.emit(&MergeProgress::Error {
            message: message.to_string(),
        });
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn collect(events: &mut Vec<MergeProgress>) -> FnSink<impl FnMut(&MergeProgress) + Send + '_> {
        FnSink(move |event: &MergeProgress| events.push(event.clone()))
    }

    #[test]
    fn five_file_run_is_monotone_and_hits_100_last() {
        let mut events = Vec::new();
        {
            let mut sink = collect(&mut events);
            let mut reporter = ProgressReporter::new(&mut sink);
            reporter.analyzing(5);
            for index in 0..5 {
                reporter.merging(&format!("file-{index}.rs"));
            }
            reporter.validating();
            reporter.complete(&IntegratorOutput::new());
        }

        let percents: Vec<u8> = events
            .iter()
            .filter_map(|event| match event {
                MergeProgress::Merging { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect();
        assert_eq!(percents, vec![20, 40, 60, 80, 100]);
        assert!(percents.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(matches!(events.last(), Some(MergeProgress::Complete { .. })));

        // 100 appears in the final merging event only.
        assert_eq!(percents.iter().filter(|p| **p == 100).count(), 1);
    }

    #[test]
    fn exactly_one_terminal_event() {
        let mut events = Vec::new();
        {
            let mut sink = collect(&mut events);
            let mut reporter = ProgressReporter::new(&mut sink);
            reporter.analyzing(1);
            reporter.complete(&IntegratorOutput::new());
            reporter.error("too late");
            reporter.merging("late.rs");
        }

        assert_eq!(events.len(), 2);
        assert!(events.iter().filter(|event| event.is_terminal()).count() == 1);
    }

    #[test]
    fn error_preempts_complete() {
        let mut events = Vec::new();
        {
            let mut sink = collect(&mut events);
            let mut reporter = ProgressReporter::new(&mut sink);
            reporter.analyzing(2);
            reporter.error("snapshot unreadable");
            reporter.complete(&IntegratorOutput::new());
        }

        assert!(matches!(events.last(), Some(MergeProgress::Error { .. })));
        assert_eq!(events.iter().filter(|event| event.is_terminal()).count(), 1);
    }

    #[test]
    fn channel_sink_forwards_events() {
        let (sender, receiver) = mpsc::channel();
        let mut sink = ChannelSink::new(sender);
        let mut reporter = ProgressReporter::new(&mut sink);
        reporter.analyzing(1);
        reporter.merging("a.rs");
        reporter.complete(&IntegratorOutput::new());

        let received: Vec<MergeProgress> = receiver.try_iter().collect();
        assert_eq!(received.len(), 3);
    }

    #[test]
    fn dropped_receiver_does_not_panic() {
        let (sender, receiver) = mpsc::channel();
        drop(receiver);
        let mut sink = ChannelSink::new(sender);
        let mut reporter = ProgressReporter::new(&mut sink);
        reporter.analyzing(1);
        reporter.complete(&IntegratorOutput::new());
    }

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
