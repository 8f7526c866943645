//! Small numeric helpers shared by the transform and the validation checks.

use std::collections::BTreeSet;

// =============================================================================
// PAIRED STREAMING STATISTICS
// =============================================================================
// Welford-style co-moment accumulation: one pass, O(1) memory, no catastrophic
// cancellation on long columns of small integers.

/// Single-pass accumulator for the Pearson correlation of paired values.
#[derive(Debug, Clone, Default)]
pub struct PairedStats {
    count: usize,
    mean_x: f64,
    mean_y: f64,
    m2_x: f64,
    m2_y: f64,
    /// Sum of co-deviations from the running means.
    c_xy: f64,
}

impl PairedStats {
    /// Empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one paired observation.
    pub fn add(&mut self, x: f64, y: f64) {
        self.count += 1;
        let n = self.count as f64;

        let dx = x - self.mean_x;
        self.mean_x += dx / n;
        let dy = y - self.mean_y;
        self.mean_y += dy / n;

        self.m2_x += dx * (x - self.mean_x);
        self.m2_y += dy * (y - self.mean_y);
        self.c_xy += dx * (y - self.mean_y);
    }

    /// Pairs added so far.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Whether either side is constant (or there are fewer than two pairs).
    pub fn lacks_variance(&self) -> bool {
        self.count < 2 || self.m2_x <= f64::EPSILON || self.m2_y <= f64::EPSILON
    }

    /// Pearson r, or `None` when it is undefined.
    pub fn correlation(&self) -> Option<f64> {
        if self.lacks_variance() {
            return None;
        }
        let r = self.c_xy / (self.m2_x.sqrt() * self.m2_y.sqrt());
        Some(r.clamp(-1.0, 1.0))
    }
}

impl FromIterator<(f64, f64)> for PairedStats {
    fn from_iter<I: IntoIterator<Item = (f64, f64)>>(iter: I) -> Self {
        let mut stats = PairedStats::new();
        for (x, y) in iter {
            stats.add(x, y);
        }
        stats
    }
}

/// Pearson correlation of paired values; `None` for fewer than two pairs or
/// a constant side.
pub fn pearson<I>(pairs: I) -> Option<f64>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    pairs.into_iter().collect::<PairedStats>().correlation()
}

// =============================================================================
// INTEGER DOMAINS
// =============================================================================

/// Sorted distinct non-null values.
pub fn distinct_values(values: &[Option<i64>]) -> Vec<i64> {
    values
        .iter()
        .flatten()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Adjacent pairs of sorted distinct values that differ by more than one.
pub fn domain_breaks(distinct: &[i64]) -> Vec<(i64, i64)> {
    distinct
        .windows(2)
        .filter(|w| w[1] - w[0] != 1)
        .map(|w| (w[0], w[1]))
        .collect()
}

/// Codes between `min` and `max` inclusive that no value uses.
pub fn unused_codes(distinct: &[i64], min: i64, max: i64) -> Vec<i64> {
    let used: BTreeSet<i64> = distinct.iter().copied().collect();
    (min..=max).filter(|c| !used.contains(c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pearson_perfect() {
        let up = pearson((1..=5).map(|v| (v as f64, v as f64 * 2.0))).unwrap();
        assert!((up - 1.0).abs() < 1e-12);

        let down = pearson((1..=5).map(|v| (v as f64, 5.0 - v as f64))).unwrap();
        assert!((down + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_undefined() {
        assert!(pearson(vec![(1.0, 2.0)]).is_none());
        assert!(pearson(vec![(1.0, 2.0), (2.0, 2.0), (3.0, 2.0)]).is_none());

        let stats: PairedStats = vec![(3.0, 1.0), (3.0, 4.0)].into_iter().collect();
        assert_eq!(stats.count(), 2);
        assert!(stats.lacks_variance());
    }

    #[test]
    fn test_pearson_partial() {
        let r = pearson(vec![(1.0, 1.0), (2.0, 3.0), (3.0, 2.0), (4.0, 4.0)]).unwrap();
        assert!((r - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_domain_helpers() {
        let distinct = distinct_values(&[Some(3), None, Some(0), Some(1), Some(3)]);
        assert_eq!(distinct, vec![0, 1, 3]);
        assert_eq!(domain_breaks(&distinct), vec![(1, 3)]);
        assert_eq!(unused_codes(&distinct, 0, 3), vec![2]);
        assert!(domain_breaks(&[0, 1, 2]).is_empty());
    }
}
