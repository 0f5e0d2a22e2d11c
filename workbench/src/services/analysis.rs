//! Background jobs started from the dashboard

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use shared::{AnalysisRequest, Snapshot, TabularView};

use crate::error::{WorkbenchError, WorkbenchResult};
use crate::external::{LogLevel, ProfitabilityEngine};
use crate::services::bridge::{AnalysisOutput, WorkerBridge, WorkerId, WorkerMessage};
use crate::services::store::SnapshotStore;

/// Run the engine for one request, forwarding its progress and log lines to tracing
pub fn run_analysis(
    engine: &dyn ProfitabilityEngine,
    request: &AnalysisRequest,
) -> anyhow::Result<TabularView> {
    let period = request.period_name.as_str();
    let progress = |percent: u8, stage: &str| {
        info!(period, percent, stage, "Analysis progress");
    };
    let log = |message: &str, level: LogLevel| match level {
        LogLevel::Debug => debug!(period, "{}", message),
        LogLevel::Info => info!(period, "{}", message),
        LogLevel::Warning => warn!(period, "{}", message),
        LogLevel::Error => error!(period, "{}", message),
    };

    engine.compute_profitability(&request.profit_path, &request.discount_path, &progress, &log)
}

/// Validate `request` and compute it on a worker.
///
/// The worker sends `AnalysisComplete` with the view, or `AnalysisError`.
/// Nothing is spawned for an invalid request.
pub fn spawn_analysis(
    bridge: &mut WorkerBridge,
    engine: Arc<dyn ProfitabilityEngine>,
    request: AnalysisRequest,
) -> WorkbenchResult<WorkerId> {
    request.check().map_err(WorkbenchError::Validation)?;

    bridge.spawn("analysis", move |outbox| {
        let message = match run_analysis(engine.as_ref(), &request) {
            Ok(view) => {
                info!(period = %request.period_name, rows = view.len(), "Analysis finished");
                WorkerMessage::AnalysisComplete(Box::new(AnalysisOutput { request, view }))
            }
            Err(e) => {
                error!(period = %request.period_name, error = %e, "Analysis failed");
                WorkerMessage::AnalysisError(WorkbenchError::Compute(format!("{:#}", e)).detail())
            }
        };
        outbox.send(message);
    })
}

/// Read the history on a worker and send `LoadData` then `UpdateCombos`
pub fn spawn_history_load(bridge: &mut WorkerBridge, store: SnapshotStore) -> WorkbenchResult<WorkerId> {
    bridge.spawn("history", move |outbox| {
        let records = store.read_records();
        let labels: Vec<String> = records.iter().map(Snapshot::combo_label).collect();
        debug!(count = records.len(), "History read");
        if outbox.send(WorkerMessage::LoadData(records)) {
            outbox.send(WorkerMessage::UpdateCombos(labels));
        }
    })
}

/// Read two snapshots on a worker and send `ComparisonComplete`, or
/// `AnalysisError` naming the first id that is missing
pub fn spawn_comparison(
    bridge: &mut WorkerBridge,
    store: SnapshotStore,
    left_id: u64,
    right_id: u64,
) -> WorkbenchResult<WorkerId> {
    bridge.spawn("comparison", move |outbox| {
        let records = store.read_records();
        let find = |id: u64| records.iter().find(|r| r.id == id).cloned();

        let message = match (find(left_id), find(right_id)) {
            (Some(left), Some(right)) => WorkerMessage::ComparisonComplete {
                left: Box::new(left),
                right: Box::new(right),
            },
            (None, _) => WorkerMessage::AnalysisError(WorkbenchError::NotFound(left_id).detail()),
            (_, None) => WorkerMessage::AnalysisError(WorkbenchError::NotFound(right_id).detail()),
        };
        outbox.send(message);
    })
}
