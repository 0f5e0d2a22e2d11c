//! CSV exchange: reading profitability exports and writing reports

use std::path::Path;

use tracing::info;

use shared::{Cell, ComparisonReport, Snapshot, TabularView};

use crate::error::{WorkbenchError, WorkbenchResult};

/// Read a CSV file with a header row into a view.
///
/// Numeric cells become numbers, blank cells missing, everything else text.
/// Short records are padded with missing cells.
pub fn read_table_csv(path: &Path) -> WorkbenchResult<TabularView> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(path)?;

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut columns: Vec<Vec<Cell>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record?;
        for (i, column) in columns.iter_mut().enumerate() {
            column.push(record.get(i).map(parse_field).unwrap_or_default());
        }
    }

    TabularView::from_columns(headers.into_iter().zip(columns))
        .map_err(|e| WorkbenchError::Validation(e.to_string()))
}

fn parse_field(raw: &str) -> Cell {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Cell::Missing;
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => Cell::Number(n),
        _ => Cell::Text(raw.to_string()),
    }
}

/// Write a snapshot's rows, columns in stored order
pub fn export_rows_csv(snapshot: &Snapshot, path: &Path) -> WorkbenchResult<usize> {
    let view = snapshot.view();
    let mut writer = csv::Writer::from_path(path)?;

    let columns = view.columns();
    writer.write_record(&columns)?;
    for row in view.rows() {
        let fields: Vec<String> = columns
            .iter()
            .map(|column| row.get(column).map(|cell| cell.to_string()).unwrap_or_default())
            .collect();
        writer.write_record(&fields)?;
    }
    writer.flush()?;

    info!(id = snapshot.id, rows = view.len(), path = %path.display(), "Snapshot rows exported");
    Ok(view.len())
}

/// Write one line per compared metric
pub fn export_comparison_csv(report: &ComparisonReport, path: &Path) -> WorkbenchResult<()> {
    let mut writer = csv::Writer::from_path(path)?;

    writer.write_record([
        "metric",
        "label",
        report.left.period_name.as_str(),
        report.right.period_name.as_str(),
        "delta",
        "percent",
        "direction",
    ])?;
    for m in &report.metrics {
        writer.write_record([
            m.metric.as_str().to_string(),
            m.metric.label().to_string(),
            format!("{:.2}", m.left),
            format!("{:.2}", m.right),
            format!("{:.2}", m.delta),
            format!("{:.2}", m.percent),
            m.direction.as_str().to_string(),
        ])?;
    }
    writer.flush()?;

    info!(left = report.left.id, right = report.right.id, path = %path.display(), "Comparison exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{compare, NewSnapshot, RowRecord};
    use std::fs;

    fn row(cells: &[(&str, Cell)]) -> RowRecord {
        cells
            .iter()
            .map(|(column, cell)| (column.to_string(), cell.clone()))
            .collect()
    }

    fn snapshot(id: u64, name: &str, total_profit: f64, rows: Vec<RowRecord>) -> Snapshot {
        NewSnapshot {
            period_name: name.to_string(),
            start_date: None,
            end_date: None,
            created_at: None,
            total_profit,
            product_count: rows.len(),
            source_profit_file: String::new(),
            source_discount_file: String::new(),
            rows,
        }
        .with_id(id)
    }

    #[test]
    fn test_parse_field_kinds() {
        assert_eq!(parse_field(""), Cell::Missing);
        assert_eq!(parse_field("  "), Cell::Missing);
        assert_eq!(parse_field("12.5"), Cell::Number(12.5));
        assert_eq!(parse_field("-3"), Cell::Number(-3.0));
        assert_eq!(parse_field("1.250,00"), Cell::Text("1.250,00".into()));
        assert_eq!(parse_field("NaN"), Cell::Text("NaN".into()));
    }

    #[test]
    fn test_read_pads_short_records_and_strips_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kar.csv");
        fs::write(&path, "\u{feff}Stok İsmi,Net Kar\nA,5\nB\n").unwrap();

        let view = read_table_csv(&path).unwrap();
        assert_eq!(view.columns(), vec!["Stok İsmi", "Net Kar"]);
        assert_eq!(view.len(), 2);
        assert_eq!(view.cell(1, "Net Kar"), Some(&Cell::Missing));
    }

    #[test]
    fn test_duplicate_headers_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dup.csv");
        fs::write(&path, "Net Kar,Net Kar\n1,2\n").unwrap();
        assert!(matches!(read_table_csv(&path), Err(WorkbenchError::Validation(_))));
    }

    #[test]
    fn test_export_rows_keeps_column_order_and_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("satirlar.csv");
        let snapshot = snapshot(
            4,
            "Ocak",
            0.0,
            vec![
                row(&[("Stok İsmi", "Latte".into()), ("Satış Miktarı", 3.0.into()), ("Net Kar", 12.5.into())]),
                row(&[("Stok İsmi", "Mocha".into()), ("Net Kar", "₺1.250,00".into())]),
            ],
        );

        assert_eq!(export_rows_csv(&snapshot, &path).unwrap(), 2);
        let written = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Stok İsmi,Satış Miktarı,Net Kar",
                "Latte,3,12.5",
                "Mocha,,\"₺1.250,00\"",
            ]
        );
    }

    #[test]
    fn test_exported_rows_read_back_as_the_same_view() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geri.csv");
        let snapshot = snapshot(
            1,
            "Şubat",
            0.0,
            vec![
                row(&[("Stok İsmi", "Latte".into()), ("Net Kar", (-7.25).into())]),
                row(&[("Stok İsmi", Cell::Missing), ("Net Kar", 100.0.into())]),
                row(&[("Stok İsmi", "Çay".into()), ("Net Kar", "12 TL".into())]),
            ],
        );

        export_rows_csv(&snapshot, &path).unwrap();
        assert_eq!(read_table_csv(&path).unwrap(), snapshot.view());
    }

    #[test]
    fn test_export_comparison_writes_one_line_per_metric() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("karsilastirma.csv");
        let report = compare(
            &snapshot(1, "Ocak", 1000.0, Vec::new()),
            &snapshot(2, "Şubat", 1500.0, Vec::new()),
        );

        export_comparison_csv(&report, &path).unwrap();
        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(
            headers,
            vec!["metric", "label", "Ocak", "Şubat", "delta", "percent", "direction"]
        );

        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), shared::Metric::ALL.len());
        let total = &records[0];
        assert_eq!(&total[0], "total_profit");
        assert_eq!(&total[2], "1000.00");
        assert_eq!(&total[3], "1500.00");
        assert_eq!(&total[4], "500.00");
        assert_eq!(&total[5], "50.00");
        assert_eq!(&total[6], "up");
    }
}
