//! Store, worker bridge, background jobs and CSV exchange

pub mod analysis;
pub mod bridge;
pub mod csv_io;
pub mod store;

pub use analysis::{run_analysis, spawn_analysis, spawn_comparison, spawn_history_load};
pub use bridge::{AnalysisOutput, Outbox, WorkerBridge, WorkerId, WorkerMessage};
pub use csv_io::{export_comparison_csv, export_rows_csv, read_table_csv};
pub use store::{SnapshotStore, StoreDocument, STORE_VERSION};
