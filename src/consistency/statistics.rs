use serde::{Deserialize, Serialize};

/// Running count, mean, variance and extremes, updated one value at a time
/// with Welford's method.
///
/// Variance is the sample variance (`n - 1` denominator) and is 0 for fewer
/// than two values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DescriptiveStatistics {
    count: u64,
    mean: f64,
    m2: f64,
    sum: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl DescriptiveStatistics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: f64) {
        self.count += 1;
        #[allow(clippy::cast_precision_loss)]
        let n = self.count as f64;
        let delta = value - self.mean;
        self.mean += delta / n;
        self.m2 += delta * (value - self.mean);
        self.sum += value;
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// Mean of the values; 0 when empty.
    #[must_use]
    pub const fn mean(&self) -> f64 {
        self.mean
    }

    #[must_use]
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let denominator = (self.count - 1) as f64;
        (self.m2 / denominator).max(0.0)
    }

    #[must_use]
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    #[must_use]
    pub const fn sum(&self) -> f64 {
        self.sum
    }

    #[must_use]
    pub const fn min(&self) -> Option<f64> {
        self.min
    }

    #[must_use]
    pub const fn max(&self) -> Option<f64> {
        self.max
    }
}

impl Extend<f64> for DescriptiveStatistics {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, values: I) {
        for value in values {
            self.add(value);
        }
    }
}

impl FromIterator<f64> for DescriptiveStatistics {
    fn from_iter<I: IntoIterator<Item = f64>>(values: I) -> Self {
        let mut statistics = Self::new();
        statistics.extend(values);
        statistics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        let stats = DescriptiveStatistics::new();
        assert_eq!(stats.count(), 0);
        assert_eq!(stats.variance(), 0.0);
        assert!(stats.min().is_none());
    }

    #[test]
    fn test_sample_variance() {
        let stats: DescriptiveStatistics = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0].into_iter().collect();
        assert_eq!(stats.count(), 8);
        assert!((stats.mean() - 5.0).abs() < 1e-12);
        // population variance is 4, sample variance 32 / 7
        assert!((stats.variance() - 32.0 / 7.0).abs() < 1e-12);
        assert_eq!(stats.min(), Some(2.0));
        assert_eq!(stats.max(), Some(9.0));
        assert!((stats.sum() - 40.0).abs() < 1e-12);
    }

    #[test]
    fn test_identical_values_have_zero_variance() {
        let third = 1.0 / 3.0;
        let stats: DescriptiveStatistics = [third, third, third].into_iter().collect();
        assert!(stats.variance().abs() < 1e-15);
        assert_eq!(stats.std_dev(), stats.variance().sqrt());
    }

    #[test]
    fn test_single_value() {
        let mut stats = DescriptiveStatistics::new();
        stats.add(0.7);
        assert_eq!(stats.variance(), 0.0);
        stats.clear();
        assert_eq!(stats.count(), 0);
    }
}
