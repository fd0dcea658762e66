/// A borrowed window of values for statistical analysis.
pub struct TimeSeries<'a> {
    values: &'a [f64],
}

impl<'a> TimeSeries<'a> {
    pub fn new(values: &'a [f64]) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    /// Ordinary least-squares slope of value against index `0..n-1`.
    pub fn slope(&self) -> Option<f64> {
        let n = self.values.len() as f64;
        if n < 2.0 {
            return None;
        }

        let sum_x: f64 = (0..self.values.len()).map(|i| i as f64).sum();
        let sum_y: f64 = self.values.iter().sum();
        let sum_xy: f64 = self
            .values
            .iter()
            .enumerate()
            .map(|(i, y)| i as f64 * y)
            .sum();
        let sum_x2: f64 = (0..self.values.len()).map(|i| (i as f64).powi(2)).sum();

        let denom = n * sum_x2 - sum_x * sum_x;
        if denom.abs() < 1e-10 {
            return None;
        }
        Some((n * sum_xy - sum_x * sum_y) / denom)
    }

    /// Largest absolute distance of any value from the mean.
    pub fn max_abs_deviation(&self) -> f64 {
        let mean = self.mean();
        self.values
            .iter()
            .map(|v| (v - mean).abs())
            .fold(0.0, f64::max)
    }

    /// Number of consecutive pairs whose relative change exceeds `min_percent`.
    /// Pairs starting from a non-positive value are not counted.
    pub fn significant_changes(&self, min_percent: f64) -> usize {
        self.values
            .windows(2)
            .filter(|pair| percent_change(pair[0], pair[1]).is_some_and(|c| c.abs() > min_percent))
            .count()
    }
}

/// Relative change from `base` to `value` in percent, or `None` when the base
/// is not a usable denominator.
pub fn percent_change(base: f64, value: f64) -> Option<f64> {
    if base <= 0.0 || !base.is_finite() {
        return None;
    }
    Some((value - base) / base * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let ts = TimeSeries::new(&values);
        assert_eq!(ts.len(), 5);
        assert_eq!(ts.mean(), 3.0);
        assert!((ts.slope().unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(ts.max_abs_deviation(), 2.0);
    }

    #[test]
    fn test_slope_needs_two_points() {
        let values = [4.0];
        assert!(TimeSeries::new(&values).slope().is_none());
        assert!(TimeSeries::new(&[]).is_empty());
        assert_eq!(TimeSeries::new(&[]).mean(), 0.0);
    }

    #[test]
    fn test_negative_slope() {
        let values = [30.0, 25.0, 20.0, 15.0];
        assert!((TimeSeries::new(&values).slope().unwrap() + 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_significant_changes_skips_zero_base() {
        // 0 -> 10 has no defined percent change; 10 -> 20 is +100%; 20 -> 20.5 is +2.5%.
        let values = [0.0, 10.0, 20.0, 20.5];
        assert_eq!(TimeSeries::new(&values).significant_changes(5.0), 1);
        assert_eq!(percent_change(0.0, 5.0), None);
        assert_eq!(percent_change(50.0, 25.0), Some(-50.0));
    }
}
