/// The sink the measurement core pushes samples into.
///
/// Statistical aggregation belongs to the caller; protocols only ever
/// append samples, rescale a finished configuration, or reset a sink
/// before reuse.
pub trait SampleSink {
    /// Append one sample.
    fn add_sample(&mut self, sample: f64);

    /// Divide the collected distribution by `factor`.
    ///
    /// Used when one timed block covered `factor` individual operations.
    fn scale_down(&mut self, factor: f64);

    /// Discard everything collected so far.
    fn reset(&mut self);
}

/// Min/mean/max/standard-deviation accumulator.
///
/// Keeps moment sums rather than individual samples so a 10,000-sample
/// run costs a few words of memory.
#[derive(Copy, Clone, Debug)]
pub struct Statistic {
    count: u64,
    min: f64,
    max: f64,
    total: f64,
    square_total: f64,
}

impl Statistic {
    pub fn new() -> Self {
        Statistic {
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            total: 0.0,
            square_total: 0.0,
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn min(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.min }
    }

    pub fn max(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.max }
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let mean = self.mean();
        let variance = self.square_total / self.count as f64 - mean * mean;
        variance.max(0.0).sqrt()
    }

    /// Multiply the collected distribution by `factor`, e.g. a tick
    /// interval to convert tick counts into seconds.
    pub fn scale(&mut self, factor: f64) {
        self.min *= factor;
        self.max *= factor;
        self.total *= factor;
        self.square_total *= factor * factor;
    }
}

impl Default for Statistic {
    fn default() -> Self {
        Statistic::new()
    }
}

impl SampleSink for Statistic {
    fn add_sample(&mut self, sample: f64) {
        self.count += 1;
        self.min = self.min.min(sample);
        self.max = self.max.max(sample);
        self.total += sample;
        self.square_total += sample * sample;
    }

    fn scale_down(&mut self, factor: f64) {
        self.scale(1.0 / factor);
    }

    fn reset(&mut self) {
        *self = Statistic::new();
    }
}

#[cfg(test)]
mod tests {
    use super::{SampleSink, Statistic};

    #[test]
    fn test_empty_statistic() {
        let stat = Statistic::new();
        assert_eq!(stat.count(), 0);
        assert_eq!(stat.mean(), 0.0);
        assert_eq!(stat.min(), 0.0);
        assert_eq!(stat.max(), 0.0);
        assert_eq!(stat.std_dev(), 0.0);
    }

    #[test]
    fn test_moments() {
        let mut stat = Statistic::new();
        for sample in [2.0, 4.0, 6.0] {
            stat.add_sample(sample);
        }
        assert_eq!(stat.count(), 3);
        assert_eq!(stat.min(), 2.0);
        assert_eq!(stat.max(), 6.0);
        assert_eq!(stat.mean(), 4.0);
        assert!((stat.std_dev() - (8.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_scale_down_divides_distribution() {
        let mut stat = Statistic::new();
        stat.add_sample(40.0);
        stat.add_sample(80.0);
        stat.scale_down(40.0);
        assert_eq!(stat.min(), 1.0);
        assert_eq!(stat.max(), 2.0);
        assert_eq!(stat.mean(), 1.5);
    }

    #[test]
    fn test_batching_factor_is_idempotent() {
        // Reported per-exchange latency must not depend on the batch
        // size: K exchanges in time T report the same value as 2K
        // exchanges in time 2T.
        let mut small = Statistic::new();
        small.add_sample(400.0);
        small.scale_down(2.0 * 20.0);

        let mut large = Statistic::new();
        large.add_sample(800.0);
        large.scale_down(2.0 * 40.0);

        assert_eq!(small.mean(), large.mean());
        assert_eq!(small.mean(), 400.0 / 40.0);
    }

    #[test]
    fn test_reset() {
        let mut stat = Statistic::new();
        stat.add_sample(1.0);
        stat.reset();
        assert_eq!(stat.count(), 0);
        assert_eq!(stat.mean(), 0.0);
    }
}
