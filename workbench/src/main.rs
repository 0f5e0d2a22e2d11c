//! Period Analysis Workbench - headless entry point
//!
//! Usage:
//!   period-workbench [list]
//!   period-workbench analyze <period> <DD.MM.YYYY> <DD.MM.YYYY> <profit.csv> <discount.csv>
//!   period-workbench compare <id> <id> [out.csv]
//!   period-workbench export <id> <out.csv>
//!   period-workbench delete <id>

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, bail, Context};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shared::{compare, compare_products, format_currency, parse_period_date, AnalysisRequest};
use workbench::external::CsvTableEngine;
use workbench::services::{export_comparison_csv, export_rows_csv, SnapshotStore};
use workbench::{Capabilities, Config, DashboardController, Palette, UiEvent};

const USAGE: &str = "usage: period-workbench [list | analyze <period> <start> <end> <profit.csv> <discount.csv> | compare <id> <id> [out.csv] | export <id> <out.csv> | delete <id>]";

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "period_workbench=debug,workbench=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Starting Period Analysis Workbench");
    tracing::info!("Environment: {}", config.environment);

    let capabilities = Capabilities::resolve(&config.ui);
    tracing::info!(?capabilities, "UI capabilities resolved");

    let store = SnapshotStore::from_config(&config.store);
    tracing::info!("History file: {}", store.path().display());

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        [] | ["list"] => list_history(&store),
        ["analyze", period, start, end, profit, discount] => {
            let request = AnalysisRequest {
                period_name: period.to_string(),
                start_date: parse_period_date(start)
                    .ok_or_else(|| anyhow!("invalid start date: {}", start))?,
                end_date: parse_period_date(end).ok_or_else(|| anyhow!("invalid end date: {}", end))?,
                profit_path: profit.to_string(),
                discount_path: discount.to_string(),
            };
            analyze(&config, request)
        }
        ["compare", left, right] => compare_periods(&store, left, right, None),
        ["compare", left, right, out] => compare_periods(&store, left, right, Some(*out)),
        ["export", id, out] => {
            let snapshot = find(&store, id)?;
            let rows = export_rows_csv(&snapshot, Path::new(out))?;
            tracing::info!("Exported {} rows to {}", rows, out);
            Ok(())
        }
        ["delete", id] => {
            let id: u64 = id.parse().with_context(|| format!("invalid id: {}", id))?;
            let runtime = tokio::runtime::Runtime::new()?;
            let mut controller = DashboardController::from_config(
                &config,
                runtime.handle().clone(),
                Arc::new(CsvTableEngine),
                Palette::default(),
            );
            controller.delete_snapshot(id)?;
            controller.shutdown();
            tracing::info!("Deleted snapshot {}", id);
            Ok(())
        }
        _ => bail!(USAGE),
    }
}

fn list_history(store: &SnapshotStore) -> anyhow::Result<()> {
    let records = store.list();
    tracing::info!("{} analyses in history", records.len());
    for snapshot in &records {
        tracing::info!(
            "{}  {} urun  {}",
            snapshot.combo_label(),
            snapshot.product_count,
            format_currency(snapshot.total_profit)
        );
    }
    Ok(())
}

fn compare_periods(
    store: &SnapshotStore,
    left: &str,
    right: &str,
    out: Option<&str>,
) -> anyhow::Result<()> {
    let left = find(store, left)?;
    let right = find(store, right)?;
    let report = compare(&left, &right);

    tracing::info!("{} -> {}", report.left.period_name, report.right.period_name);
    for m in &report.metrics {
        tracing::info!(
            "{} {}: {:.2} -> {:.2} ({:+.2}, {:+.2}%)",
            m.direction.arrow(),
            m.metric.label(),
            m.left,
            m.right,
            m.delta,
            m.percent
        );
    }
    for product in compare_products(&left, &right).iter().take(10) {
        tracing::info!("  {}: {}", product.product_name, format_currency(product.delta));
    }

    if let Some(out) = out {
        export_comparison_csv(&report, Path::new(out))?;
        tracing::info!("Comparison written to {}", out);
    }
    Ok(())
}

fn find(store: &SnapshotStore, id: &str) -> anyhow::Result<shared::Snapshot> {
    let id: u64 = id.parse().with_context(|| format!("invalid id: {}", id))?;
    store
        .get(id)
        .ok_or_else(|| anyhow!("snapshot {} not found", id))
}

/// Run one analysis through the dashboard controller and wait for it to be saved
fn analyze(config: &Config, request: AnalysisRequest) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    let mut controller = DashboardController::from_config(
        config,
        runtime.handle().clone(),
        Arc::new(CsvTableEngine),
        Palette::default(),
    );
    controller.start_analysis(request)?;

    let deadline = Instant::now() + config.bridge.join_timeout() * 30;
    let mut outcome: anyhow::Result<()> = Err(anyhow!("analysis did not finish in time"));
    'poll: while Instant::now() < deadline {
        for event in controller.tick() {
            match event {
                UiEvent::KpiRefreshed { kpi, distribution } => {
                    tracing::info!(
                        "Toplam: {}  En iyi: {} ({})  Ortalama: {}",
                        format_currency(kpi.total_profit),
                        kpi.top_product_name,
                        format_currency(kpi.top_product_profit),
                        format_currency(kpi.mean_profit)
                    );
                    tracing::info!(?distribution, "Profit distribution");
                }
                UiEvent::SnapshotSaved(id) => {
                    tracing::info!("Saved as snapshot {}", id);
                    outcome = Ok(());
                    break 'poll;
                }
                UiEvent::Error(detail) => {
                    outcome = Err(anyhow!("[{}] {}", detail.code, detail.message_en));
                    break 'poll;
                }
                _ => {}
            }
        }
        std::thread::sleep(controller.poll_interval());
    }

    controller.shutdown();
    outcome
}
