//! Value histogram with explicit bucket quantization.

/// Default number of histogram buckets.
pub const DEFAULT_BUCKET_COUNT: usize = 256;

/// Histogram over a closed value range split into equally wide buckets.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    min: f32,
    max: f32,
    counts: Vec<u64>,
}

impl Histogram {
    /// Builds a histogram of `values` over `[min, max]`.
    ///
    /// A `bucket_count` of zero is treated as one bucket.
    pub fn compute(values: &[f32], min: f32, max: f32, bucket_count: usize) -> Self {
        let mut histogram = Self {
            min,
            max,
            counts: vec![0; bucket_count.max(1)],
        };
        for &value in values {
            let bucket = histogram.bucket_of(value);
            histogram.counts[bucket] += 1;
        }
        histogram
    }

    /// Returns the bucket a value falls into. Out-of-range values land in the edge buckets.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn bucket_of(&self, value: f32) -> usize {
        let last = self.counts.len() - 1;
        let width = self.max - self.min;
        if width <= 0.0 {
            return 0;
        }
        let t = (value - self.min) / width * self.counts.len() as f32;
        if t.is_nan() || t <= 0.0 {
            return 0;
        }
        (t.floor() as usize).min(last)
    }

    /// Lower value bound of a bucket.
    #[must_use]
    pub fn bucket_start(&self, bucket: usize) -> f32 {
        self.min + (self.max - self.min) * bucket as f32 / self.counts.len() as f32
    }

    /// Number of buckets.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.counts.len()
    }

    /// Per-bucket counts.
    #[must_use]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Total number of samples.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Largest bucket count.
    #[must_use]
    pub fn peak(&self) -> u64 {
        self.counts.iter().copied().max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_quantization() {
        let histogram = Histogram::compute(&[], 0.0, 100.0, 10);
        assert_eq!(histogram.bucket_of(0.0), 0);
        assert_eq!(histogram.bucket_of(9.99), 0);
        assert_eq!(histogram.bucket_of(10.0), 1);
        assert_eq!(histogram.bucket_of(100.0), 9);
        assert_eq!(histogram.bucket_of(-3.0), 0);
        assert_eq!(histogram.bucket_of(250.0), 9);
    }

    #[test]
    fn test_counts_non_integer_values() {
        let values = [0.1, 0.2, 0.55, 0.9, 1.0];
        let histogram = Histogram::compute(&values, 0.0, 1.0, 2);
        assert_eq!(histogram.counts(), &[2, 3]);
        assert_eq!(histogram.total(), 5);
        assert_eq!(histogram.peak(), 3);
    }

    #[test]
    fn test_degenerate_range() {
        let histogram = Histogram::compute(&[4.0, 4.0, 4.0], 4.0, 4.0, 16);
        assert_eq!(histogram.counts()[0], 3);
        assert_eq!(histogram.total(), 3);
    }

    #[test]
    fn test_bucket_start() {
        let histogram = Histogram::compute(&[], 10.0, 20.0, 5);
        assert_eq!(histogram.bucket_start(0), 10.0);
        assert_eq!(histogram.bucket_start(5), 20.0);
    }
}
