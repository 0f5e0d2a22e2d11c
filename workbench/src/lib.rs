//! Period Analysis Workbench
//!
//! Runs profitability analyses in the background, keeps every finished
//! analysis as a snapshot in a JSON history file and compares any two of
//! them. The pure calculations live in the `shared` crate; this crate owns
//! the store, the worker bridge and the dashboard controller.

pub mod capabilities;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod external;
pub mod services;

pub use capabilities::{Capabilities, Palette};
pub use config::Config;
pub use dashboard::{DashboardController, UiEvent};
pub use error::{ErrorDetail, WorkbenchError, WorkbenchResult};
