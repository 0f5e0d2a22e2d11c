//! Domain models for the Period Analysis Workbench

mod comparison;
mod distribution;
mod filter;
mod kpi;
mod request;
mod snapshot;
mod table;

pub use comparison::*;
pub use distribution::*;
pub use filter::*;
pub use kpi::*;
pub use request::*;
pub use snapshot::*;
pub use table::*;
