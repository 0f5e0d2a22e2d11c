//! Profitability engine
//!
//! The engine turns a profit export and a discount list into the table the
//! dashboard works on. It is called from a worker thread and reports
//! progress and log lines through callbacks.

use std::path::Path;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use shared::{SemanticColumn, TabularView};

use crate::services::csv_io::read_table_csv;

/// Severity of an engine log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warning" | "warn" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Computes the profitability table for one period
pub trait ProfitabilityEngine: Send + Sync {
    /// `progress` receives a percentage (0-100) and a stage description.
    fn compute_profitability(
        &self,
        profit_path: &str,
        discount_path: &str,
        progress: &dyn Fn(u8, &str),
        log: &dyn Fn(&str, LogLevel),
    ) -> anyhow::Result<TabularView>;
}

/// Engine over a precomputed profitability export in CSV form.
///
/// The discount file must exist but is not read: discounts are already
/// applied in the export.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvTableEngine;

impl ProfitabilityEngine for CsvTableEngine {
    fn compute_profitability(
        &self,
        profit_path: &str,
        discount_path: &str,
        progress: &dyn Fn(u8, &str),
        log: &dyn Fn(&str, LogLevel),
    ) -> anyhow::Result<TabularView> {
        progress(0, "Dosyalar kontrol ediliyor");
        if !Path::new(profit_path).is_file() {
            bail!("Profit file not found: {}", profit_path);
        }
        if !Path::new(discount_path).is_file() {
            bail!("Discount file not found: {}", discount_path);
        }

        progress(30, "Kar dosyası okunuyor");
        let view = read_table_csv(Path::new(profit_path))
            .with_context(|| format!("Could not read profit file {}", profit_path))?;
        log(&format!("{} satır okundu", view.len()), LogLevel::Info);

        for (kind, label) in [
            (SemanticColumn::ProductName, "product name"),
            (SemanticColumn::NetProfit, "net profit"),
            (SemanticColumn::Quantity, "quantity"),
        ] {
            if view.find_semantic(kind).is_none() {
                log(&format!("No {} column in {}", label, profit_path), LogLevel::Warning);
            }
        }

        progress(100, "Tamamlandı");
        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::fs;

    #[test]
    fn test_log_level_round_trip() {
        for level in [LogLevel::Debug, LogLevel::Info, LogLevel::Warning, LogLevel::Error] {
            assert_eq!(LogLevel::from_str(level.as_str()), Some(level));
        }
        assert_eq!(LogLevel::from_str("WARN"), Some(LogLevel::Warning));
        assert_eq!(LogLevel::from_str("loud"), None);
    }

    #[test]
    fn test_csv_engine_reads_export() {
        let dir = tempfile::tempdir().unwrap();
        let profit = dir.path().join("kar.csv");
        let discount = dir.path().join("iskonto.csv");
        fs::write(&profit, "Stok İsmi,Satış Miktarı,Net Kar\nA,3,10.5\nB,1,-2\n").unwrap();
        fs::write(&discount, "").unwrap();

        let stages = RefCell::new(Vec::new());
        let logs = RefCell::new(Vec::new());
        let view = CsvTableEngine
            .compute_profitability(
                profit.to_str().unwrap(),
                discount.to_str().unwrap(),
                &|percent, _| stages.borrow_mut().push(percent),
                &|message, level| logs.borrow_mut().push((message.to_string(), level)),
            )
            .unwrap();

        assert_eq!(view.len(), 2);
        assert_eq!(stages.into_inner(), vec![0, 30, 100]);
        assert!(logs.into_inner().iter().all(|(_, level)| *level == LogLevel::Info));
    }

    #[test]
    fn test_csv_engine_requires_discount_file() {
        let dir = tempfile::tempdir().unwrap();
        let profit = dir.path().join("kar.csv");
        fs::write(&profit, "Net Kar\n1\n").unwrap();
        let missing = dir.path().join("yok.csv");

        let err = CsvTableEngine
            .compute_profitability(
                profit.to_str().unwrap(),
                missing.to_str().unwrap(),
                &|_, _| {},
                &|_, _| {},
            )
            .unwrap_err();
        assert!(err.to_string().contains("Discount file not found"));
    }
}
