//! Dashboard controller
//!
//! Owned by the UI thread. It starts background jobs, drains the worker
//! bridge once per tick and is the only code that mutates the snapshot store.
//! Each drained message becomes zero or more [`UiEvent`]s for the view layer.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use shared::{
    apply_filter, compare, compare_products, derive_distribution, derive_kpi, AnalysisRequest,
    ComparisonReport, DashboardFilter, DistributionRecord, KpiRecord, NewSnapshot, ProductDelta,
    Snapshot, SnapshotMeta, TabularView,
};

use crate::capabilities::{Capabilities, Palette};
use crate::config::Config;
use crate::error::{ErrorDetail, WorkbenchError, WorkbenchResult};
use crate::external::ProfitabilityEngine;
use crate::services::analysis::{spawn_analysis, spawn_comparison, spawn_history_load};
use crate::services::bridge::{AnalysisOutput, WorkerBridge, WorkerId, WorkerMessage};
use crate::services::store::SnapshotStore;

/// What the view layer has to redraw
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    KpiRefreshed {
        kpi: KpiRecord,
        distribution: DistributionRecord,
    },
    SnapshotSaved(u64),
    Error(ErrorDetail),
    SnapshotDeleted,
    HistoryLoaded(Vec<SnapshotMeta>),
    CombosUpdated(Vec<String>),
    ComparisonReady {
        report: ComparisonReport,
        products: Vec<ProductDelta>,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct KpiCacheKey {
    generation: u64,
    filter: DashboardFilter,
    search: Option<String>,
}

pub struct DashboardController {
    store: SnapshotStore,
    bridge: WorkerBridge,
    engine: Arc<dyn ProfitabilityEngine>,
    capabilities: Capabilities,
    palette: Palette,
    poll_interval: Duration,

    current: Option<TabularView>,
    generation: u64,
    filter: DashboardFilter,
    search: Option<String>,
    kpi_cache: Option<(KpiCacheKey, KpiRecord, DistributionRecord)>,

    history: Vec<Snapshot>,
    combos: Vec<String>,
    last_comparison: Option<ComparisonReport>,
}

impl DashboardController {
    pub fn new(
        store: SnapshotStore,
        bridge: WorkerBridge,
        engine: Arc<dyn ProfitabilityEngine>,
        capabilities: Capabilities,
        palette: Palette,
    ) -> Self {
        Self {
            store,
            bridge,
            engine,
            capabilities,
            palette,
            poll_interval: Duration::from_millis(100),
            current: None,
            generation: 0,
            filter: DashboardFilter::All,
            search: None,
            kpi_cache: None,
            history: Vec::new(),
            combos: Vec::new(),
            last_comparison: None,
        }
    }

    pub fn from_config(
        config: &Config,
        runtime: Handle,
        engine: Arc<dyn ProfitabilityEngine>,
        palette: Palette,
    ) -> Self {
        let mut controller = Self::new(
            SnapshotStore::from_config(&config.store),
            WorkerBridge::new(runtime, &config.bridge),
            engine,
            Capabilities::resolve(&config.ui),
            palette,
        );
        controller.poll_interval = config.bridge.poll_interval();
        controller
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    pub fn start_analysis(&mut self, request: AnalysisRequest) -> WorkbenchResult<WorkerId> {
        info!(period = %request.period_name, "Starting analysis");
        spawn_analysis(&mut self.bridge, Arc::clone(&self.engine), request)
    }

    pub fn refresh_history(&mut self) -> WorkbenchResult<WorkerId> {
        spawn_history_load(&mut self.bridge, self.store.clone())
    }

    pub fn request_comparison(&mut self, left_id: u64, right_id: u64) -> WorkbenchResult<WorkerId> {
        if left_id == right_id {
            return Err(WorkbenchError::Validation(
                "choose two different periods to compare".to_string(),
            ));
        }
        spawn_comparison(&mut self.bridge, self.store.clone(), left_id, right_id)
    }

    /// Delete on the UI thread, then let the queue announce it
    pub fn delete_snapshot(&mut self, id: u64) -> WorkbenchResult<()> {
        if self.bridge.is_closing() {
            return Err(WorkbenchError::WorkerUnavailable);
        }
        if !self.store.delete(id)? {
            return Err(WorkbenchError::NotFound(id));
        }
        self.bridge.post(WorkerMessage::DeleteComplete)
    }

    /// Change what the dashboard shows of the current analysis
    pub fn set_filter(&mut self, filter: DashboardFilter, search: Option<&str>) {
        self.filter = filter;
        self.search = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
    }

    /// Drain one batch of worker messages
    pub fn tick(&mut self) -> Vec<UiEvent> {
        if self.bridge.is_closing() {
            return Vec::new();
        }
        let mut events = Vec::new();
        for message in self.bridge.drain() {
            debug!(kind = message.kind(), "Handling worker message");
            self.handle(message, &mut events);
        }
        events
    }

    pub fn shutdown(&mut self) {
        self.bridge.shutdown();
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    /// The current analysis with the active filter applied
    pub fn displayed_view(&self) -> Option<TabularView> {
        self.current
            .as_ref()
            .map(|view| apply_filter(view, self.filter, self.search.as_deref()))
    }

    /// KPI and distribution of the displayed view, recomputed only when it changed
    pub fn kpi(&mut self) -> (KpiRecord, DistributionRecord) {
        let key = KpiCacheKey {
            generation: self.generation,
            filter: self.filter,
            search: self.search.clone(),
        };
        if let Some((cached, kpi, distribution)) = &self.kpi_cache {
            if *cached == key {
                return (kpi.clone(), *distribution);
            }
        }

        let view = self.displayed_view().unwrap_or_default();
        let kpi = derive_kpi(&view);
        let distribution = derive_distribution(&view);
        self.kpi_cache = Some((key, kpi.clone(), distribution));
        (kpi, distribution)
    }

    pub fn history(&self) -> &[Snapshot] {
        &self.history
    }

    pub fn combos(&self) -> &[String] {
        &self.combos
    }

    pub fn last_comparison(&self) -> Option<&ComparisonReport> {
        self.last_comparison.as_ref()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn live_workers(&self) -> usize {
        self.bridge.live_workers()
    }

    pub fn is_closing(&self) -> bool {
        self.bridge.is_closing()
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    // ------------------------------------------------------------------
    // Message handling
    // ------------------------------------------------------------------

    fn handle(&mut self, message: WorkerMessage, events: &mut Vec<UiEvent>) {
        match message {
            WorkerMessage::AnalysisComplete(output) => self.on_analysis_complete(*output, events),
            WorkerMessage::AnalysisError(detail) => {
                error!(code = %detail.code, message = %detail.message_en, "Background job failed");
                events.push(UiEvent::Error(detail));
            }
            WorkerMessage::DeleteComplete => {
                events.push(UiEvent::SnapshotDeleted);
                self.reload_history();
            }
            WorkerMessage::LoadData(records) => {
                let metas = records.iter().map(Snapshot::meta).collect();
                self.history = records;
                events.push(UiEvent::HistoryLoaded(metas));
            }
            WorkerMessage::UpdateCombos(labels) => {
                self.combos = labels.clone();
                events.push(UiEvent::CombosUpdated(labels));
            }
            WorkerMessage::ComparisonComplete { left, right } => {
                let report = compare(&left, &right);
                let products = compare_products(&left, &right);
                info!(left = left.id, right = right.id, "Comparison ready");
                self.last_comparison = Some(report.clone());
                events.push(UiEvent::ComparisonReady { report, products });
            }
        }
    }

    fn on_analysis_complete(&mut self, output: AnalysisOutput, events: &mut Vec<UiEvent>) {
        let AnalysisOutput { request, view } = output;

        let snapshot = NewSnapshot::from_view(
            &request.period_name,
            request.start_date,
            request.end_date,
            &request.profit_path,
            &request.discount_path,
            &view,
            Utc::now(),
        );

        self.current = Some(view);
        self.generation += 1;
        let (kpi, distribution) = self.kpi();
        events.push(UiEvent::KpiRefreshed { kpi, distribution });

        match self.store.append(snapshot) {
            Ok(id) => {
                events.push(UiEvent::SnapshotSaved(id));
                self.reload_history();
            }
            Err(e) => {
                error!(error = %e, period = %request.period_name, "Could not save snapshot");
                events.push(UiEvent::Error(e.detail()));
            }
        }
    }

    fn reload_history(&mut self) {
        if let Err(e) = self.refresh_history() {
            warn!(error = %e, "History reload not scheduled");
        }
    }
}
