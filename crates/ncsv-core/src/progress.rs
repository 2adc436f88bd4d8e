//! Periodic progress reporting for the reader and the sink.
//!
//! Both stages share the same cadence policy but count independently: the
//! reader counts records read, the sink counts records written. Cadence only
//! affects what is displayed.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Emit an update every `every` records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    every: u64,
}

impl Cadence {
    /// A cadence of `every` records; zero is treated as one.
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
        }
    }

    pub fn every(self) -> u64 {
        self.every
    }

    /// Whether `count` lands on a reporting boundary.
    pub fn is_due(self, count: u64) -> bool {
        count > 0 && count % self.every == 0
    }
}

/// Owner of the progress lines drawn during a run.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    multi: MultiProgress,
    cadence: Cadence,
}

impl ProgressReporter {
    /// Draw on stderr when `visible`, otherwise report through tracing only.
    pub fn new(cadence: Cadence, visible: bool) -> Self {
        let target = if visible {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        Self {
            multi: MultiProgress::with_draw_target(target),
            cadence,
        }
    }

    /// Reporter that never draws.
    pub fn hidden(cadence: Cadence) -> Self {
        Self::new(cadence, false)
    }

    /// A self-overwriting counter line labelled `label`.
    pub fn counter(&self, label: &'static str) -> ProgressCounter {
        let style = ProgressStyle::with_template("{spinner} {msg}: {pos}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(style);
        bar.set_message(label);
        ProgressCounter {
            bar,
            cadence: self.cadence,
            label,
        }
    }
}

/// One counter line, updated on the cadence boundary.
#[derive(Debug)]
pub struct ProgressCounter {
    bar: ProgressBar,
    cadence: Cadence,
    label: &'static str,
}

impl ProgressCounter {
    /// Record that `count` items have been handled so far.
    pub fn update(&self, count: u64) {
        if self.cadence.is_due(count) {
            self.bar.set_position(count);
            tracing::debug!(stage = self.label, count, "progress");
        }
    }

    /// Draw the final count and leave the line in place.
    pub fn finish(&self, count: u64) {
        self.bar.set_position(count);
        self.bar.finish();
    }

    #[cfg(test)]
    pub(crate) fn position(&self) -> u64 {
        self.bar.position()
    }
}
