//! Inter-period comparison

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::coercion::{coerce, coerce_opt};
use crate::models::snapshot::{Snapshot, SnapshotMeta};
use crate::models::table::SemanticColumn;
use crate::types::Cell;

/// Deltas smaller than this count as no change
pub const FLAT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    TotalProfit,
    ProductCount,
    MeanProfitPerProduct,
}

impl Metric {
    pub const ALL: [Metric; 3] = [
        Metric::TotalProfit,
        Metric::ProductCount,
        Metric::MeanProfitPerProduct,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::TotalProfit => "total_profit",
            Metric::ProductCount => "product_count",
            Metric::MeanProfitPerProduct => "mean_profit_per_product",
        }
    }

    /// Dashboard caption
    pub fn label(&self) -> &'static str {
        match self {
            Metric::TotalProfit => "Toplam Kâr",
            Metric::ProductCount => "Ürün Sayısı",
            Metric::MeanProfitPerProduct => "Ürün Başına Ortalama Kâr",
        }
    }

    /// Value of this metric for a snapshot, coerced to a finite real
    pub fn value_of(&self, snapshot: &Snapshot) -> f64 {
        let total_profit = coerce(&Cell::Number(snapshot.total_profit), 0.0);
        let product_count = snapshot.product_count as f64;
        match self {
            Metric::TotalProfit => total_profit,
            Metric::ProductCount => product_count,
            Metric::MeanProfitPerProduct if snapshot.product_count == 0 => 0.0,
            Metric::MeanProfitPerProduct => total_profit / product_count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Flat,
    Down,
}

impl Direction {
    pub fn of(delta: f64) -> Self {
        if delta.abs() < FLAT_EPSILON {
            Direction::Flat
        } else if delta > 0.0 {
            Direction::Up
        } else {
            Direction::Down
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Flat => "flat",
            Direction::Down => "down",
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            Direction::Up => "▲",
            Direction::Flat => "■",
            Direction::Down => "▼",
        }
    }
}

/// One paired metric in a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricComparison {
    pub metric: Metric,
    pub left: f64,
    pub right: f64,
    pub delta: f64,
    pub percent: f64,
    pub direction: Direction,
}

impl MetricComparison {
    pub fn new(metric: Metric, left: f64, right: f64) -> Self {
        let delta = right - left;
        Self {
            metric,
            left,
            right,
            delta,
            percent: percent_change(left, delta),
            direction: Direction::of(delta),
        }
    }
}

/// `100 * delta / left`, or 0 when that is undefined
pub fn percent_change(left: f64, delta: f64) -> f64 {
    if left == 0.0 {
        return 0.0;
    }
    let percent = 100.0 * delta / left;
    if percent.is_finite() {
        percent
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub left: SnapshotMeta,
    pub right: SnapshotMeta,
    pub metrics: Vec<MetricComparison>,
}

impl ComparisonReport {
    pub fn metric(&self, metric: Metric) -> Option<&MetricComparison> {
        self.metrics.iter().find(|m| m.metric == metric)
    }

    pub fn delta_of(&self, metric: Metric) -> f64 {
        self.metric(metric).map(|m| m.delta).unwrap_or_default()
    }

    pub fn percent_of(&self, metric: Metric) -> f64 {
        self.metric(metric).map(|m| m.percent).unwrap_or_default()
    }
}

/// Compare two snapshots; `a` is the baseline
pub fn compare(a: &Snapshot, b: &Snapshot) -> ComparisonReport {
    ComparisonReport {
        left: a.meta(),
        right: b.meta(),
        metrics: Metric::ALL
            .iter()
            .map(|metric| MetricComparison::new(*metric, metric.value_of(a), metric.value_of(b)))
            .collect(),
    }
}

/// Per-product profit movement between two periods
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDelta {
    pub product_name: String,
    pub left_profit: f64,
    pub right_profit: f64,
    pub delta: f64,
    pub direction: Direction,
}

/// Pair products by name across both snapshots.
///
/// Profit is summed per name; a product seen on one side only counts as 0
/// on the other. Largest absolute movement first, then by name.
pub fn compare_products(a: &Snapshot, b: &Snapshot) -> Vec<ProductDelta> {
    let left = profit_by_product(a);
    let right = profit_by_product(b);

    let mut names: Vec<&String> = left.keys().chain(right.keys()).collect();
    names.sort();
    names.dedup();

    let mut deltas: Vec<ProductDelta> = names
        .into_iter()
        .map(|name| {
            let left_profit = left.get(name).copied().unwrap_or_default();
            let right_profit = right.get(name).copied().unwrap_or_default();
            let delta = right_profit - left_profit;
            ProductDelta {
                product_name: name.clone(),
                left_profit,
                right_profit,
                delta,
                direction: Direction::of(delta),
            }
        })
        .collect();

    deltas.sort_by(|x, y| {
        y.delta
            .abs()
            .total_cmp(&x.delta.abs())
            .then_with(|| x.product_name.cmp(&y.product_name))
    });
    deltas
}

fn profit_by_product(snapshot: &Snapshot) -> HashMap<String, f64> {
    let view = snapshot.view();
    let mut totals = HashMap::new();
    for row in view.rows() {
        let Some(name) = row
            .semantic(SemanticColumn::ProductName)
            .and_then(|cell| cell.as_label())
        else {
            continue;
        };
        let profit = row
            .semantic(SemanticColumn::NetProfit)
            .and_then(coerce_opt)
            .unwrap_or_default();
        *totals.entry(name.into_owned()).or_insert(0.0) += profit;
    }
    totals
}
