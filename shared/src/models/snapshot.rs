//! Persisted analysis snapshots

use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::coercion::{coerce, round_money};
use crate::models::kpi::derive_kpi;
use crate::models::table::{RowRecord, TabularView};
use crate::types::{format_period_date, parse_period_date, parse_timestamp, period_date, timestamp, Cell};
use crate::validation::source_basename;

/// One named period analysis. Never mutated once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: u64,
    pub period_name: String,
    #[serde(with = "period_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(with = "period_date")]
    pub end_date: Option<NaiveDate>,
    #[serde(with = "timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    pub total_profit: f64,
    pub product_count: usize,
    pub source_profit_file: String,
    pub source_discount_file: String,
    pub rows: Vec<RowRecord>,
}

/// A snapshot before the store has assigned its id
#[derive(Debug, Clone, PartialEq)]
pub struct NewSnapshot {
    pub period_name: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_at: Option<DateTime<Utc>>,
    pub total_profit: f64,
    pub product_count: usize,
    pub source_profit_file: String,
    pub source_discount_file: String,
    pub rows: Vec<RowRecord>,
}

/// Identifying metadata carried by comparison reports and history lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub id: u64,
    pub period_name: String,
    #[serde(with = "period_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(with = "period_date")]
    pub end_date: Option<NaiveDate>,
    #[serde(with = "timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    pub total_profit: f64,
    pub product_count: usize,
}

impl NewSnapshot {
    /// Capture a computed view as a snapshot.
    ///
    /// Source paths are reduced to their file names, the total profit is
    /// rounded to two decimals and `created_at` is cut to the microseconds the
    /// history file stores.
    pub fn from_view(
        period_name: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        profit_path: &str,
        discount_path: &str,
        view: &TabularView,
        created_at: DateTime<Utc>,
    ) -> Self {
        let kpi = derive_kpi(view);
        Self {
            period_name: period_name.trim().to_string(),
            start_date: Some(start_date),
            end_date: Some(end_date),
            created_at: Some(created_at.trunc_subsecs(6)),
            total_profit: round_money(kpi.total_profit),
            product_count: kpi.product_count,
            source_profit_file: source_basename(profit_path),
            source_discount_file: source_basename(discount_path),
            rows: view.to_rows(),
        }
    }

    pub fn with_id(self, id: u64) -> Snapshot {
        Snapshot {
            id,
            period_name: self.period_name,
            start_date: self.start_date,
            end_date: self.end_date,
            created_at: self.created_at,
            total_profit: self.total_profit,
            product_count: self.product_count,
            source_profit_file: self.source_profit_file,
            source_discount_file: self.source_discount_file,
            rows: self.rows,
        }
    }
}

impl Snapshot {
    /// Reconstitute the source table
    pub fn view(&self) -> TabularView {
        TabularView::from_rows(&self.rows)
    }

    pub fn meta(&self) -> SnapshotMeta {
        SnapshotMeta {
            id: self.id,
            period_name: self.period_name.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
            created_at: self.created_at,
            total_profit: self.total_profit,
            product_count: self.product_count,
        }
    }

    /// Label used in the period pickers: `3 - Ocak (01.01.2024 - 31.01.2024)`
    pub fn combo_label(&self) -> String {
        let date = |d: Option<NaiveDate>| d.map(format_period_date).unwrap_or_default();
        format!(
            "{} - {} ({} - {})",
            self.id,
            self.period_name,
            date(self.start_date),
            date(self.end_date)
        )
    }

    /// Rebuild a record read from disk, filling defaults for missing or
    /// ill-typed fields.
    ///
    /// Returns `None` only when the value is not an object at all. The second
    /// element is the stored id if it was a positive integer; the caller
    /// decides what to assign otherwise.
    pub fn from_json_lenient(value: &Value) -> Option<(Snapshot, Option<u64>)> {
        let record = value.as_object()?;
        let text = |key: &str| {
            record
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_default()
        };
        let stored_id = record.get("id").and_then(Value::as_u64).filter(|id| *id > 0);

        let snapshot = Snapshot {
            id: stored_id.unwrap_or_default(),
            period_name: text("period_name"),
            start_date: record
                .get("start_date")
                .and_then(Value::as_str)
                .and_then(parse_period_date),
            end_date: record
                .get("end_date")
                .and_then(Value::as_str)
                .and_then(parse_period_date),
            created_at: record
                .get("created_at")
                .and_then(Value::as_str)
                .and_then(parse_timestamp),
            total_profit: record
                .get("total_profit")
                .map(|v| coerce(&Cell::from_json(v), 0.0))
                .unwrap_or_default(),
            product_count: record.get("product_count").map(count_of).unwrap_or_default(),
            source_profit_file: text("source_profit_file"),
            source_discount_file: text("source_discount_file"),
            rows: record
                .get("rows")
                .and_then(Value::as_array)
                .map(|rows| {
                    rows.iter()
                        .filter_map(Value::as_object)
                        .map(RowRecord::from_json_object)
                        .collect()
                })
                .unwrap_or_default(),
        };

        Some((snapshot, stored_id))
    }
}

/// Non-negative integral count, 0 otherwise
fn count_of(value: &Value) -> usize {
    if let Some(n) = value.as_u64() {
        return n as usize;
    }
    match coerce(&Cell::from_json(value), -1.0) {
        n if n >= 0.0 && n.fract() == 0.0 => n as usize,
        _ => 0,
    }
}
