//! Dashboard row filters

use serde::{Deserialize, Serialize};

use crate::coercion::coerce_opt;
use crate::models::distribution::percentile;
use crate::models::table::{SemanticColumn, TabularView};

/// Quantity percentile above which a product counts as a high seller
pub const HIGH_SALES_PERCENTILE: f64 = 0.75;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardFilter {
    #[default]
    All,
    Profitable,
    Lossy,
    HighSales,
}

impl DashboardFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            DashboardFilter::All => "all",
            DashboardFilter::Profitable => "profitable",
            DashboardFilter::Lossy => "lossy",
            DashboardFilter::HighSales => "high_sales",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "all" => Some(DashboardFilter::All),
            "profitable" => Some(DashboardFilter::Profitable),
            "lossy" => Some(DashboardFilter::Lossy),
            "high_sales" => Some(DashboardFilter::HighSales),
            _ => None,
        }
    }
}

/// Filter the view by category, then by a case-insensitive product search.
///
/// A filter that needs a column the view lacks yields an empty view.
pub fn apply_filter(view: &TabularView, filter: DashboardFilter, search: Option<&str>) -> TabularView {
    let filtered = match filter {
        DashboardFilter::All => view.clone(),
        DashboardFilter::Profitable => by_profit(view, |p| p > 0.0),
        DashboardFilter::Lossy => by_profit(view, |p| p < 0.0),
        DashboardFilter::HighSales => high_sales(view),
    };

    match search.map(str::trim).filter(|s| !s.is_empty()) {
        Some(term) => search_products(&filtered, term),
        None => filtered,
    }
}

fn by_profit(view: &TabularView, keep: impl Fn(f64) -> bool) -> TabularView {
    if view.find_semantic(SemanticColumn::NetProfit).is_none() {
        return view.head(0);
    }
    view.filter(|row| {
        row.semantic(SemanticColumn::NetProfit)
            .and_then(coerce_opt)
            .map_or(false, &keep)
    })
}

/// Rows whose quantity is at or above the 75th percentile of the coerceable quantities
pub fn high_sales_threshold(view: &TabularView) -> Option<f64> {
    let mut quantities: Vec<f64> = view
        .semantic_column(SemanticColumn::Quantity)?
        .iter()
        .filter_map(coerce_opt)
        .collect();
    quantities.sort_by(|a, b| a.total_cmp(b));
    percentile(&quantities, HIGH_SALES_PERCENTILE)
}

fn high_sales(view: &TabularView) -> TabularView {
    let Some(threshold) = high_sales_threshold(view) else {
        return view.head(0);
    };
    view.filter(|row| {
        row.semantic(SemanticColumn::Quantity)
            .and_then(coerce_opt)
            .map_or(false, |q| q >= threshold)
    })
}

fn search_products(view: &TabularView, term: &str) -> TabularView {
    let needle = term.to_lowercase();
    if view.find_semantic(SemanticColumn::ProductName).is_none() {
        return view.head(0);
    }
    view.filter(|row| {
        row.semantic(SemanticColumn::ProductName)
            .and_then(|cell| cell.as_label())
            .map_or(false, |label| label.to_lowercase().contains(&needle))
    })
}
