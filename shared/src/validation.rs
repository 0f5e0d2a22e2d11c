//! Validation utilities for the Period Analysis Workbench

use chrono::NaiveDate;

/// Longest accepted period name
pub const MAX_PERIOD_NAME_CHARS: usize = 120;

/// Validate a period name: non-blank and reasonably short
pub fn validate_period_name(name: &str) -> Result<(), &'static str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Period name cannot be blank");
    }
    if trimmed.chars().count() > MAX_PERIOD_NAME_CHARS {
        return Err("Period name is too long");
    }
    Ok(())
}

/// Validate that a period does not end before it starts
pub fn validate_period_range(start: NaiveDate, end: NaiveDate) -> Result<(), &'static str> {
    if end < start {
        return Err("End date must not be before start date");
    }
    Ok(())
}

/// Validate a source file path picked in the dashboard
pub fn validate_source_path(path: &str) -> Result<(), &'static str> {
    if path.trim().is_empty() {
        return Err("Source file path cannot be empty");
    }
    if source_basename(path).is_empty() {
        return Err("Source file path must name a file");
    }
    Ok(())
}

/// File name of a source path, accepting both `/` and `\` separators.
///
/// Snapshots only ever store the file name, never the directory.
pub fn source_basename(path: &str) -> String {
    path.trim()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .to_string()
}
