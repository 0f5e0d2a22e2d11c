//! KPI derivation for the live dashboard

use serde::{Deserialize, Serialize};

use crate::coercion::{coerce, coerce_opt};
use crate::models::table::{SemanticColumn, TabularView};
use crate::types::NO_DATA_LABEL;

/// Longest product name shown on a KPI card
pub const MAX_PRODUCT_NAME_CHARS: usize = 50;

/// Fixed-shape dashboard summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiRecord {
    pub total_profit: f64,
    pub top_product_name: String,
    pub top_product_profit: f64,
    pub mean_profit: f64,
    pub product_count: usize,
    pub profitable_count: usize,
    pub lossy_count: usize,
    pub total_quantity: f64,
}

impl Default for KpiRecord {
    fn default() -> Self {
        Self {
            total_profit: 0.0,
            top_product_name: NO_DATA_LABEL.to_string(),
            top_product_profit: 0.0,
            mean_profit: 0.0,
            product_count: 0,
            profitable_count: 0,
            lossy_count: 0,
            total_quantity: 0.0,
        }
    }
}

/// Coerceable net profit values paired with their row index
pub(crate) fn profit_series(view: &TabularView) -> Vec<(usize, f64)> {
    view.semantic_column(SemanticColumn::NetProfit)
        .map(|cells| {
            cells
                .iter()
                .enumerate()
                .filter_map(|(i, cell)| coerce_opt(cell).map(|v| (i, v)))
                .collect()
        })
        .unwrap_or_default()
}

/// Derive the KPI record for a view. Total for any input.
pub fn derive_kpi(view: &TabularView) -> KpiRecord {
    let mut kpi = KpiRecord {
        product_count: view.len(),
        total_quantity: total_quantity(view),
        ..KpiRecord::default()
    };

    let series = profit_series(view);
    if series.is_empty() {
        return kpi;
    }

    let total: f64 = series.iter().map(|(_, v)| v).sum();
    // Strict comparison keeps the first row on ties.
    let (top_index, top_profit) = series
        .iter()
        .copied()
        .fold(series[0], |best, cur| if cur.1 > best.1 { cur } else { best });

    kpi.total_profit = finite_or_zero(total);
    kpi.mean_profit = finite_or_zero(total / series.len() as f64);
    kpi.profitable_count = series.iter().filter(|(_, v)| *v > 0.0).count();
    kpi.lossy_count = series.iter().filter(|(_, v)| *v < 0.0).count();
    kpi.top_product_profit = top_profit;
    kpi.top_product_name = product_label(view, top_index);

    kpi
}

fn total_quantity(view: &TabularView) -> f64 {
    view.semantic_column(SemanticColumn::Quantity)
        .map(|cells| finite_or_zero(cells.iter().map(|c| coerce(c, 0.0)).sum()))
        .unwrap_or(0.0)
}

fn product_label(view: &TabularView, row: usize) -> String {
    view.find_semantic(SemanticColumn::ProductName)
        .and_then(|name| view.cell(row, name))
        .and_then(|cell| cell.as_label().map(|label| truncate_chars(&label, MAX_PRODUCT_NAME_CHARS)))
        .unwrap_or_else(|| NO_DATA_LABEL.to_string())
}

/// Keep at most `max` characters of `text`
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Sums of very large values can overflow; the record must stay finite.
fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
