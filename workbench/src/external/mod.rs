//! Profitability engine integration

pub mod profitability;

pub use profitability::{CsvTableEngine, LogLevel, ProfitabilityEngine};
