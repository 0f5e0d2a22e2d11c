//! Error handling for the Period Analysis Workbench
//!
//! Every error can be rendered for the message-display interface in English
//! and Turkish.

use serde::Serialize;
use thiserror::Error;

/// Workbench error types
#[derive(Error, Debug)]
pub enum WorkbenchError {
    // Input errors
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Snapshot not found: {0}")]
    NotFound(u64),

    // Storage errors
    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // Background work
    #[error("Analysis failed: {0}")]
    Compute(String),

    #[error("Worker bridge is closing")]
    WorkerUnavailable,

    #[error("Configuration error: {0}")]
    Configuration(#[from] config::ConfigError),
}

/// What the dashboard shows for an error
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_tr: String,
}

impl WorkbenchError {
    pub fn code(&self) -> &'static str {
        match self {
            WorkbenchError::Validation(_) => "VALIDATION_ERROR",
            WorkbenchError::NotFound(_) => "NOT_FOUND",
            WorkbenchError::Io(_) => "STORAGE_ERROR",
            WorkbenchError::Serialization(_) => "SERIALIZATION_ERROR",
            WorkbenchError::Csv(_) => "CSV_ERROR",
            WorkbenchError::Compute(_) => "ANALYSIS_ERROR",
            WorkbenchError::WorkerUnavailable => "WORKER_UNAVAILABLE",
            WorkbenchError::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }

    pub fn detail(&self) -> ErrorDetail {
        let message_tr = match self {
            WorkbenchError::Validation(msg) => format!("Geçersiz giriş: {}", msg),
            WorkbenchError::NotFound(id) => format!("{} numaralı analiz bulunamadı", id),
            WorkbenchError::Io(e) => format!("Dosya hatası: {}", e),
            WorkbenchError::Serialization(e) => format!("Kayıt dosyası okunamadı: {}", e),
            WorkbenchError::Csv(e) => format!("CSV hatası: {}", e),
            WorkbenchError::Compute(msg) => format!("Analiz başarısız: {}", msg),
            WorkbenchError::WorkerUnavailable => "Uygulama kapanıyor".to_string(),
            WorkbenchError::Configuration(e) => format!("Ayar hatası: {}", e),
        };

        ErrorDetail {
            code: self.code().to_string(),
            message_en: self.to_string(),
            message_tr,
        }
    }
}

/// Result type alias for workbench operations
pub type WorkbenchResult<T> = Result<T, WorkbenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_codes_and_messages() {
        let detail = WorkbenchError::NotFound(7).detail();
        assert_eq!(detail.code, "NOT_FOUND");
        assert_eq!(detail.message_en, "Snapshot not found: 7");
        assert!(detail.message_tr.contains('7'));
    }

    #[test]
    fn test_io_errors_convert() {
        let err: WorkbenchError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into();
        assert_eq!(err.code(), "STORAGE_ERROR");
        assert!(err.to_string().contains("read-only"));
    }

    #[test]
    fn test_compute_detail_keeps_engine_message() {
        let detail = WorkbenchError::Compute("Kar dosyası okunamadı".into()).detail();
        assert_eq!(detail.code, "ANALYSIS_ERROR");
        assert_eq!(detail.message_en, "Analysis failed: Kar dosyası okunamadı");
        assert_eq!(detail.message_tr, "Analiz başarısız: Kar dosyası okunamadı");
    }
}
