//! Shared types and models for the Period Analysis Workbench
//!
//! This crate holds the pure part of the workbench: numeric coercion, the
//! tabular view, KPI and distribution derivation, dashboard filters, the
//! snapshot model and the period comparator. Nothing here touches the
//! filesystem or spawns threads.

pub mod coercion;
pub mod models;
pub mod types;
pub mod validation;

pub use coercion::*;
pub use models::*;
pub use types::*;
pub use validation::*;
