//! Per-event timing distributions (§4.5 "Statistics"), accumulated with
//! Welford's online algorithm so the running variance never needs the full
//! sample held in memory.

#[derive(Debug, Clone, Copy, Default)]
pub struct Welford {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl Welford {
    pub fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    pub fn observe(&mut self, sample_secs: f64) {
        self.count += 1;
        let delta = sample_secs - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = sample_secs - self.mean;
        self.m2 += delta * delta2;
        self.min = self.min.min(sample_secs);
        self.max = self.max.max(sample_secs);
    }

    pub fn snapshot(&self) -> Distribution {
        let variance = if self.count > 1 { self.m2 / (self.count - 1) as f64 } else { 0.0 };
        Distribution {
            count: self.count,
            min: if self.count == 0 { 0.0 } else { self.min },
            max: if self.count == 0 { 0.0 } else { self.max },
            mean: self.mean,
            variance,
        }
    }
}

/// A point-in-time readout of a [`Welford`] accumulator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Distribution {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub variance: f64,
}

/// Aggregate counters and distributions collected over one `process()` run.
#[derive(Debug, Clone, Default)]
pub struct ProcessorStats {
    pub total_events: u64,
    pub events_processed_locally: u64,
    pub wall_clock_total: std::time::Duration,
    pub accumulated_processing: std::time::Duration,
    pub accumulated_loading: std::time::Duration,
    processing_time: Welford,
    waiting_time: Welford,
}

impl ProcessorStats {
    pub fn record_event(&mut self, local: bool, processing: std::time::Duration, waiting: std::time::Duration) {
        self.total_events += 1;
        if local {
            self.events_processed_locally += 1;
        }
        self.accumulated_processing += processing;
        self.processing_time.observe(processing.as_secs_f64());
        self.waiting_time.observe(waiting.as_secs_f64());
    }

    pub fn record_loading(&mut self, duration: std::time::Duration) {
        self.accumulated_loading += duration;
    }

    pub fn processing_time_distribution(&self) -> Distribution {
        self.processing_time.snapshot()
    }

    pub fn waiting_time_distribution(&self) -> Distribution {
        self.waiting_time.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn welford_matches_textbook_mean_and_variance() {
        let mut w = Welford::new();
        for sample in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            w.observe(sample);
        }
        let d = w.snapshot();
        assert_eq!(d.count, 8);
        assert!((d.mean - 5.0).abs() < 1e-9);
        assert!((d.variance - 4.571428571428571).abs() < 1e-9);
        assert_eq!(d.min, 2.0);
        assert_eq!(d.max, 9.0);
    }

    #[test]
    fn empty_distribution_has_zero_variance_and_no_panics() {
        let d = Welford::new().snapshot();
        assert_eq!(d.count, 0);
        assert_eq!(d.variance, 0.0);
    }

    #[test]
    fn processor_stats_tracks_local_vs_remote_events() {
        let mut stats = ProcessorStats::default();
        stats.record_event(true, Duration::from_millis(10), Duration::from_millis(1));
        stats.record_event(false, Duration::from_millis(20), Duration::from_millis(2));
        assert_eq!(stats.total_events, 2);
        assert_eq!(stats.events_processed_locally, 1);
        assert_eq!(stats.accumulated_processing, Duration::from_millis(30));
    }
}
