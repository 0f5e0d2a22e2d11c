//! Tests for the dashboard controller driving real workers:
//! - Analysis to snapshot flow
//! - Failure reporting from workers and the store
//! - Delete, history reload and comparison
//! - Shutdown behavior

use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use shared::{AnalysisRequest, Cell, DashboardFilter, Metric, TabularView, NET_PROFIT_COLUMN};
use tempfile::TempDir;
use tokio::runtime::Runtime;
use workbench::config::BridgeConfig;
use workbench::external::{LogLevel, ProfitabilityEngine};
use workbench::services::{SnapshotStore, WorkerBridge};
use workbench::{Capabilities, DashboardController, Palette, UiEvent, WorkbenchError};

struct FixedEngine(TabularView);

impl ProfitabilityEngine for FixedEngine {
    fn compute_profitability(
        &self,
        _profit_path: &str,
        _discount_path: &str,
        progress: &dyn Fn(u8, &str),
        log: &dyn Fn(&str, LogLevel),
    ) -> anyhow::Result<TabularView> {
        progress(50, "hesaplanıyor");
        log("sabit tablo", LogLevel::Debug);
        Ok(self.0.clone())
    }
}

struct FailingEngine;

impl ProfitabilityEngine for FailingEngine {
    fn compute_profitability(
        &self,
        _profit_path: &str,
        _discount_path: &str,
        _progress: &dyn Fn(u8, &str),
        _log: &dyn Fn(&str, LogLevel),
    ) -> anyhow::Result<TabularView> {
        anyhow::bail!("Kar dosyası okunamadı")
    }
}

struct PanickingEngine;

impl ProfitabilityEngine for PanickingEngine {
    fn compute_profitability(
        &self,
        _profit_path: &str,
        _discount_path: &str,
        _progress: &dyn Fn(u8, &str),
        _log: &dyn Fn(&str, LogLevel),
    ) -> anyhow::Result<TabularView> {
        panic!("index out of range")
    }
}

fn sample_view() -> TabularView {
    let columns: Vec<(&str, Vec<Cell>)> = vec![
        ("Stok İsmi", vec!["A".into(), "B".into(), "C".into()]),
        ("Satış Miktarı", vec![10.0.into(), 2.0.into(), 5.0.into()]),
        (NET_PROFIT_COLUMN, vec![100.0.into(), (-20.0).into(), "₺50,50".into()]),
    ];
    TabularView::from_columns(columns).unwrap()
}

fn request(name: &str) -> AnalysisRequest {
    AnalysisRequest {
        period_name: name.to_string(),
        start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        profit_path: "/veri/kar.xlsx".into(),
        discount_path: "/veri/iskonto.xlsx".into(),
    }
}

struct Harness {
    // Field order matters: the controller must drop before the runtime.
    controller: DashboardController,
    store: SnapshotStore,
    _dir: TempDir,
    _runtime: Runtime,
}

fn harness(engine: Arc<dyn ProfitabilityEngine>) -> Harness {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path().join("analiz_gecmisi.json"))
        .with_read_retry_delay(Duration::from_millis(1));
    let bridge = WorkerBridge::new(
        runtime.handle().clone(),
        &BridgeConfig {
            queue_capacity: 64,
            poll_interval_ms: 5,
            max_batch: 10,
            join_timeout_ms: 1000,
        },
    );
    let controller = DashboardController::new(
        store.clone(),
        bridge,
        engine,
        Capabilities::minimal(),
        Palette::fixed(),
    );
    Harness {
        controller,
        store,
        _dir: dir,
        _runtime: runtime,
    }
}

/// Tick until `done` matches an event or five seconds pass
fn tick_until(controller: &mut DashboardController, done: impl Fn(&UiEvent) -> bool) -> Vec<UiEvent> {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut events = Vec::new();
    while Instant::now() < deadline {
        let batch = controller.tick();
        let finished = batch.iter().any(&done);
        events.extend(batch);
        if finished {
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    events
}

/// Wait for every worker to finish and drop whatever they sent
fn settle(controller: &mut DashboardController) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        let idle = controller.live_workers() == 0;
        if controller.tick().is_empty() && idle {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn is_combos(event: &UiEvent) -> bool {
    matches!(event, UiEvent::CombosUpdated(_))
}

// ============================================================================
// Analysis flow
// ============================================================================

mod analysis_flow {
    use super::*;

    #[test]
    fn completed_analysis_is_saved_and_history_reloaded() {
        let mut h = harness(Arc::new(FixedEngine(sample_view())));
        h.controller.start_analysis(request("Ocak 2024")).unwrap();

        let events = tick_until(&mut h.controller, is_combos);

        let kpi_at = events
            .iter()
            .position(|e| matches!(e, UiEvent::KpiRefreshed { .. }))
            .unwrap();
        let saved_at = events
            .iter()
            .position(|e| *e == UiEvent::SnapshotSaved(1))
            .unwrap();
        assert!(kpi_at < saved_at);

        match &events[kpi_at] {
            UiEvent::KpiRefreshed { kpi, distribution } => {
                assert_eq!(kpi.total_profit, 130.5);
                assert_eq!(kpi.top_product_name, "A");
                assert_eq!(kpi.total_quantity, 17.0);
                assert_eq!(distribution.total(), 3);
                assert_eq!(distribution.in_loss, 1);
            }
            other => panic!("unexpected event {:?}", other),
        }

        assert!(events.contains(&UiEvent::CombosUpdated(vec![
            "1 - Ocak 2024 (01.01.2024 - 31.01.2024)".to_string()
        ])));
        assert_eq!(h.controller.history().len(), 1);
        assert_eq!(h.controller.combos().len(), 1);

        let saved = h.store.get(1).unwrap();
        assert_eq!(saved.total_profit, 130.5);
        assert_eq!(saved.product_count, 3);
        assert_eq!(saved.source_profit_file, "kar.xlsx");
        assert_eq!(saved.source_discount_file, "iskonto.xlsx");
        assert_eq!(saved.view(), sample_view());
    }

    #[test]
    fn invalid_request_spawns_nothing() {
        let mut h = harness(Arc::new(FixedEngine(sample_view())));
        let mut bad = request("  ");
        bad.end_date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();

        let err = h.controller.start_analysis(bad).unwrap_err();
        assert!(matches!(err, WorkbenchError::Validation(_)));
        assert_eq!(h.controller.live_workers(), 0);
        assert!(h.controller.tick().is_empty());
    }

    #[test]
    fn engine_failure_becomes_error_event() {
        let mut h = harness(Arc::new(FailingEngine));
        h.controller.start_analysis(request("Ocak")).unwrap();

        let events = tick_until(&mut h.controller, |e| matches!(e, UiEvent::Error(_)));
        assert_eq!(
            events,
            vec![UiEvent::Error(
                WorkbenchError::Compute("Kar dosyası okunamadı".to_string()).detail()
            )]
        );
        match &events[0] {
            UiEvent::Error(detail) => {
                assert_eq!(detail.code, "ANALYSIS_ERROR");
                assert_eq!(detail.message_tr, "Analiz başarısız: Kar dosyası okunamadı");
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(h.store.list().is_empty());
    }

    #[test]
    fn engine_panic_becomes_error_event() {
        let mut h = harness(Arc::new(PanickingEngine));
        h.controller.start_analysis(request("Ocak")).unwrap();

        let events = tick_until(&mut h.controller, |e| matches!(e, UiEvent::Error(_)));
        assert_eq!(
            events,
            vec![UiEvent::Error(
                WorkbenchError::Compute("index out of range".to_string()).detail()
            )]
        );
    }

    #[test]
    fn store_failure_is_reported_after_kpis() {
        let mut h = harness(Arc::new(FixedEngine(sample_view())));
        h.store.load();
        fs::create_dir(h.store.temp_path()).unwrap();

        h.controller.start_analysis(request("Ocak")).unwrap();
        let events = tick_until(&mut h.controller, |e| matches!(e, UiEvent::Error(_)));

        assert!(matches!(events[0], UiEvent::KpiRefreshed { .. }));
        match &events[1] {
            UiEvent::Error(detail) => {
                assert_eq!(detail.code, "STORAGE_ERROR");
                assert!(detail.message_en.starts_with("Storage error"));
                assert!(detail.message_tr.starts_with("Dosya hatası"));
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(h.store.list().is_empty());
    }

    #[test]
    fn kpi_follows_filter() {
        let mut h = harness(Arc::new(FixedEngine(sample_view())));
        h.controller.start_analysis(request("Ocak")).unwrap();
        tick_until(&mut h.controller, |e| matches!(e, UiEvent::SnapshotSaved(_)));

        let (all, _) = h.controller.kpi();
        assert_eq!(all.product_count, 3);

        h.controller.set_filter(DashboardFilter::Lossy, None);
        let (lossy, distribution) = h.controller.kpi();
        assert_eq!(lossy.product_count, 1);
        assert_eq!(lossy.total_profit, -20.0);
        assert_eq!(distribution.in_loss, 1);

        h.controller.set_filter(DashboardFilter::All, Some(" c "));
        let (searched, _) = h.controller.kpi();
        assert_eq!(searched.top_product_name, "C");
    }
}

// ============================================================================
// History, delete and comparison
// ============================================================================

mod history {
    use super::*;

    fn with_two_snapshots() -> Harness {
        let mut h = harness(Arc::new(FixedEngine(sample_view())));
        h.controller.start_analysis(request("Ocak")).unwrap();
        tick_until(&mut h.controller, |e| *e == UiEvent::SnapshotSaved(1));
        h.controller.start_analysis(request("Şubat")).unwrap();
        tick_until(&mut h.controller, |e| *e == UiEvent::SnapshotSaved(2));
        settle(&mut h.controller);
        h
    }

    #[test]
    fn delete_announces_and_reloads() {
        let mut h = with_two_snapshots();
        h.controller.delete_snapshot(1).unwrap();

        let events = tick_until(&mut h.controller, |e| {
            matches!(e, UiEvent::HistoryLoaded(metas) if metas.len() == 1)
        });
        assert!(events.contains(&UiEvent::SnapshotDeleted));
        assert_eq!(h.store.list().len(), 1);
        assert_eq!(h.store.list()[0].id, 2);
    }

    #[test]
    fn delete_unknown_id_is_not_found() {
        let mut h = with_two_snapshots();
        assert!(matches!(
            h.controller.delete_snapshot(42),
            Err(WorkbenchError::NotFound(42))
        ));
    }

    #[test]
    fn refresh_history_sends_metas_then_combos() {
        let mut h = with_two_snapshots();
        h.controller.refresh_history().unwrap();
        let events = tick_until(&mut h.controller, is_combos);
        let loaded = events
            .iter()
            .position(|e| matches!(e, UiEvent::HistoryLoaded(metas) if metas.len() == 2))
            .unwrap();
        let combos = events.iter().position(is_combos).unwrap();
        assert!(loaded < combos);
    }

    #[test]
    fn comparison_report_is_delivered() {
        let mut h = with_two_snapshots();
        h.controller.request_comparison(1, 2).unwrap();

        let events = tick_until(&mut h.controller, |e| matches!(e, UiEvent::ComparisonReady { .. }));
        match events.last().unwrap() {
            UiEvent::ComparisonReady { report, products } => {
                assert_eq!(report.left.period_name, "Ocak");
                assert_eq!(report.right.period_name, "Şubat");
                assert_eq!(report.delta_of(Metric::TotalProfit), 0.0);
                assert_eq!(products.len(), 3);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(h.controller.last_comparison().is_some());
    }

    #[test]
    fn comparison_with_missing_snapshot_is_an_error() {
        let mut h = with_two_snapshots();
        h.controller.request_comparison(1, 9).unwrap();

        let events = tick_until(&mut h.controller, |e| matches!(e, UiEvent::Error(_)));
        assert!(events.contains(&UiEvent::Error(WorkbenchError::NotFound(9).detail())));
    }

    #[test]
    fn comparing_a_period_with_itself_is_rejected() {
        let mut h = with_two_snapshots();
        assert!(matches!(
            h.controller.request_comparison(2, 2),
            Err(WorkbenchError::Validation(_))
        ));
    }
}

// ============================================================================
// Shutdown
// ============================================================================

mod shutdown {
    use super::*;

    #[test]
    fn closed_controller_is_inert() {
        let mut h = harness(Arc::new(FixedEngine(sample_view())));
        h.controller.shutdown();

        assert!(h.controller.is_closing());
        assert!(h.controller.tick().is_empty());
        assert!(matches!(
            h.controller.start_analysis(request("Ocak")),
            Err(WorkbenchError::WorkerUnavailable)
        ));
        assert!(matches!(
            h.controller.refresh_history(),
            Err(WorkbenchError::WorkerUnavailable)
        ));
        assert!(h.store.list().is_empty());
    }

    #[test]
    fn shutdown_waits_for_running_workers() {
        let mut h = harness(Arc::new(FixedEngine(sample_view())));
        h.controller.start_analysis(request("Ocak")).unwrap();
        h.controller.shutdown();

        assert_eq!(h.controller.live_workers(), 0);
        assert!(h.controller.tick().is_empty());
        assert!(h.store.list().is_empty());
    }
}
