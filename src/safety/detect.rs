use super::SafetyCtx;
use crate::tasks;
use log::info;
use std::sync::Arc;
use std::time::Duration;

/// Raw readings kept for median smoothing.
pub const RAW_WINDOW: usize = 5;
/// Smoothed readings kept for trigger evaluation.
pub const SMOOTHED_WINDOW: usize = 30;
/// Smoothed temperatures at or above this are a concern.
const HIGH_TEMP: i16 = 58;
/// The rise trigger needs at least this many concerning readings out of
/// the smoothed window (90 %).
const HIGH_COUNT: usize = SMOOTHED_WINDOW * 9 / 10;
/// The spike trigger needs the newest smoothed reading this far above the
/// oldest.
const SPIKE_DELTA: i16 = 8;

/// Interval between raw samples.
const SAMPLE_MILLIS: u64 = 2;
/// Back-off after a trigger so an active fire does not re-trigger every
/// sample.
const RETRIGGER_PAUSE: Duration = Duration::from_secs(6);

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Trigger {
    /// ≥ 90 % of the smoothed window at or above 58°.
    Rise,
    /// Newest smoothed reading ≥ 8° above the oldest.
    Spike,
}

/// Per-level fire detector: a five-sample median filter feeding a
/// thirty-sample evaluation window, both fixed circular buffers.
pub struct Detector {
    raw: [i16; RAW_WINDOW],
    raw_filled: usize,
    raw_next: usize,
    smoothed: [i16; SMOOTHED_WINDOW],
    smoothed_filled: usize,
    smoothed_next: usize,
}

impl Default for Detector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector {
    pub fn new() -> Self {
        Self {
            raw: [0; RAW_WINDOW],
            raw_filled: 0,
            raw_next: 0,
            smoothed: [0; SMOOTHED_WINDOW],
            smoothed_filled: 0,
            smoothed_next: 0,
        }
    }

    /// Feeds one raw reading through the filter. Returns a trigger once
    /// both windows are full and either fire condition holds.
    pub fn observe(&mut self, reading: i16) -> Option<Trigger> {
        self.raw[self.raw_next] = reading;
        self.raw_next = (self.raw_next + 1) % RAW_WINDOW;
        if self.raw_filled < RAW_WINDOW {
            self.raw_filled += 1;
            if self.raw_filled < RAW_WINDOW {
                return None;
            }
        }
        let smoothed = median(&self.raw);

        self.smoothed[self.smoothed_next] = smoothed;
        self.smoothed_next = (self.smoothed_next + 1) % SMOOTHED_WINDOW;
        if self.smoothed_filled < SMOOTHED_WINDOW {
            self.smoothed_filled += 1;
            if self.smoothed_filled < SMOOTHED_WINDOW {
                return None;
            }
        }

        let highs = self.smoothed.iter().filter(|t| **t >= HIGH_TEMP).count();
        if highs >= HIGH_COUNT {
            return Some(Trigger::Rise);
        }
        // with the window full, the slot about to be overwritten holds
        // the oldest smoothed reading
        let oldest = self.smoothed[self.smoothed_next];
        if smoothed - oldest >= SPIKE_DELTA {
            return Some(Trigger::Spike);
        }
        None
    }
}

/// Median of the raw window.
fn median(window: &[i16; RAW_WINDOW]) -> i16 {
    let mut sorted = *window;
    sorted.sort_unstable();
    sorted[RAW_WINDOW / 2]
}

/// Temperature surveillance worker, one per level. Samples every 2 ms and
/// turns a trigger into a region-wide sticky alarm.
pub(super) fn run(ctx: &Arc<SafetyCtx>, id: usize) {
    let level = ctx.region.level(id);
    let mut detector = Detector::new();

    while !ctx.end.is_raised() {
        if let Some(trigger) = detector.observe(level.temperature()) {
            info!("level {}: fire detected ({:?})", id + 1, trigger);
            ctx.region.raise_all_alarms();
            ctx.alarm.raise();
            if !ctx.end.sleep_unless_raised(RETRIGGER_PAUSE) {
                break;
            }
            continue;
        }
        if !ctx
            .end
            .sleep_unless_raised(tasks::scaled_millis(SAMPLE_MILLIS))
        {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(detector: &mut Detector, readings: &[i16]) -> Option<Trigger> {
        let mut last = None;
        for &r in readings {
            last = detector.observe(r);
        }
        last
    }

    #[test]
    fn median_of_five() {
        assert_eq!(median(&[1, 2, 3, 4, 5]), 3);
        assert_eq!(median(&[5, 1, 4, 2, 3]), 3);
        assert_eq!(median(&[26, 26, 60, 26, 26]), 26);
    }

    #[test]
    fn needs_full_windows_before_triggering() {
        let mut detector = Detector::new();
        // 4 raw samples: not even a smoothed value yet
        assert_eq!(feed(&mut detector, &[60; 4]), None);
        // 5th raw sample yields the 1st smoothed value; 29 more needed
        for _ in 0..29 {
            assert_eq!(detector.observe(60), None);
        }
        // 30th smoothed value completes the window: everything is hot
        assert_eq!(detector.observe(60), Some(Trigger::Rise));
    }

    #[test]
    fn rise_requires_ninety_percent() {
        let mut detector = Detector::new();
        // warm but below 58, and close enough to 60 that nothing spikes
        assert_eq!(feed(&mut detector, &[57; RAW_WINDOW + SMOOTHED_WINDOW]), None);
        // the median needs three hot raw readings before smoothed values
        // turn hot, then 27 of the 30 smoothed readings must be ≥ 58
        for _ in 0..28 {
            assert_eq!(detector.observe(60), None);
        }
        assert_eq!(detector.observe(60), Some(Trigger::Rise));
    }

    #[test]
    fn spike_fires_on_eight_degree_delta() {
        let mut detector = Detector::new();
        // both windows full of 26°
        assert_eq!(feed(&mut detector, &[26; RAW_WINDOW + SMOOTHED_WINDOW]), None);
        // jump to 35°: the median only reaches 35 once 3 of the last 5 raw
        // readings are hot, at which point newest(35) - oldest(26) = 9 ≥ 8
        let result = feed(&mut detector, &[35; 3]);
        assert_eq!(result, Some(Trigger::Spike));
    }

    #[test]
    fn constant_temperature_never_triggers() {
        let mut detector = Detector::new();
        for _ in 0..500 {
            assert_eq!(detector.observe(30), None);
        }
    }

    #[test]
    fn median_filter_swallows_single_outliers() {
        let mut detector = Detector::new();
        assert_eq!(feed(&mut detector, &[26; RAW_WINDOW + SMOOTHED_WINDOW]), None);
        // an isolated faulty 90° reading between cool ones never reaches
        // the smoothed window
        for _ in 0..50 {
            assert_eq!(detector.observe(90), None);
            assert_eq!(detector.observe(26), None);
            assert_eq!(detector.observe(26), None);
            assert_eq!(detector.observe(26), None);
        }
    }
}
