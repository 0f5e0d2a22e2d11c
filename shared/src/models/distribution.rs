//! Profit distribution buckets shown next to the KPI cards

use serde::{Deserialize, Serialize};

use crate::models::kpi::profit_series;
use crate::models::table::TabularView;

/// Four-bucket partition of the coerceable net profit values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionRecord {
    pub very_profitable: usize,
    pub mid_profitable: usize,
    pub low_profitable: usize,
    pub in_loss: usize,
}

impl DistributionRecord {
    pub fn total(&self) -> usize {
        self.very_profitable + self.mid_profitable + self.low_profitable + self.in_loss
    }
}

/// Percentile of an ascending-sorted slice with linear interpolation
/// between closest ranks. `q` is a fraction in `[0, 1]`.
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let h = (sorted.len() - 1) as f64 * q;
    let lower = h.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    let value = sorted[lower] + (h - lower as f64) * (sorted[upper] - sorted[lower]);
    value.is_finite().then_some(value)
}

pub fn derive_distribution(view: &TabularView) -> DistributionRecord {
    let values: Vec<f64> = profit_series(view).into_iter().map(|(_, v)| v).collect();
    distribution_of(&values)
}

/// Bucket a profit series
pub fn distribution_of(values: &[f64]) -> DistributionRecord {
    let in_loss = values.iter().filter(|v| **v < 0.0).count();
    let mut positive: Vec<f64> = values.iter().copied().filter(|v| *v >= 0.0).collect();
    positive.sort_by(|a, b| a.total_cmp(b));

    let mut record = DistributionRecord {
        in_loss,
        ..DistributionRecord::default()
    };

    match positive.len() {
        0 => {}
        1 => record.very_profitable = 1,
        n => match (percentile(&positive, 0.33), percentile(&positive, 0.67)) {
            (Some(q33), Some(q67)) => {
                record.low_profitable = positive.iter().filter(|v| **v < q33).count();
                record.mid_profitable = positive.iter().filter(|v| **v >= q33 && **v < q67).count();
                record.very_profitable = positive.iter().filter(|v| **v >= q67).count();
            }
            _ => {
                let (low, mid, very) = rank_thirds(n);
                record.low_profitable = low;
                record.mid_profitable = mid;
                record.very_profitable = very;
            }
        },
    }

    record
}

/// Split `n` ranked values into contiguous thirds; the top third takes the remainder
fn rank_thirds(n: usize) -> (usize, usize, usize) {
    let third = n / 3;
    (third, third, n - 2 * third)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::table::NET_PROFIT_COLUMN;
    use crate::types::Cell;

    #[test]
    fn test_percentile_linear_interpolation() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        assert!((percentile(&values, 0.33).unwrap() - 3.97).abs() < 1e-9);
        assert!((percentile(&values, 0.67).unwrap() - 7.03).abs() < 1e-9);
        assert_eq!(percentile(&values, 0.0), Some(1.0));
        assert_eq!(percentile(&values, 1.0), Some(10.0));
        assert_eq!(percentile(&[], 0.5), None);
    }

    #[test]
    fn test_scenario_buckets() {
        let cells: Vec<Cell> = [-10.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]
            .into_iter()
            .map(Cell::from)
            .collect();
        let view = TabularView::from_columns(vec![(NET_PROFIT_COLUMN, cells)]).unwrap();
        let dist = derive_distribution(&view);
        assert_eq!(
            dist,
            DistributionRecord {
                very_profitable: 3,
                mid_profitable: 4,
                low_profitable: 3,
                in_loss: 1,
            }
        );
        assert_eq!(dist.total(), 11);
    }

    #[test]
    fn test_single_non_negative_value_is_very_profitable() {
        let dist = distribution_of(&[-1.0, 0.0]);
        assert_eq!(dist.very_profitable, 1);
        assert_eq!(dist.in_loss, 1);
        assert_eq!(dist.total(), 2);
    }

    #[test]
    fn test_only_losses() {
        let dist = distribution_of(&[-1.0, -2.0]);
        assert_eq!(dist.in_loss, 2);
        assert_eq!(dist.total(), 2);
    }

    #[test]
    fn test_rank_thirds() {
        assert_eq!(rank_thirds(2), (0, 0, 2));
        assert_eq!(rank_thirds(9), (3, 3, 3));
        assert_eq!(rank_thirds(10), (3, 3, 4));
    }

    #[test]
    fn test_extreme_values_still_partition() {
        let dist = distribution_of(&[0.0, f64::MAX, f64::MAX, -f64::MAX]);
        assert_eq!(dist.total(), 4);
        assert_eq!(dist.in_loss, 1);
    }

    #[test]
    fn test_equal_values_land_in_top_bucket() {
        let dist = distribution_of(&[5.0; 4]);
        assert_eq!(dist.very_profitable, 4);
        assert_eq!(dist.total(), 4);
    }

    #[test]
    fn test_missing_profit_column() {
        let view = TabularView::from_columns(vec![("Stok İsmi", vec![Cell::from("A")])]).unwrap();
        assert_eq!(derive_distribution(&view), DistributionRecord::default());
    }
}
