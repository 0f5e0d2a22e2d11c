//! Boot-time capability descriptor and the dashboard palette

use serde::{Deserialize, Serialize};

use crate::config::UiConfig;

/// Optional UI features, resolved once when the workbench starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub has_calendar: bool,
    pub has_plotting: bool,
    pub has_ui_helpers: bool,
}

impl Capabilities {
    pub fn resolve(ui: &UiConfig) -> Self {
        Self {
            has_calendar: ui.calendar,
            has_plotting: ui.plotting,
            has_ui_helpers: ui.ui_helpers,
        }
    }

    /// Nothing optional available: plain text inputs, no charts
    pub fn minimal() -> Self {
        Self {
            has_calendar: false,
            has_plotting: false,
            has_ui_helpers: false,
        }
    }
}

/// Colors used by the dashboard, passed explicitly to whoever draws
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    pub background: String,
    pub surface: String,
    pub text: String,
    pub accent: String,
    pub profit: String,
    pub loss: String,
    pub neutral: String,
}

impl Palette {
    /// Stable palette for tests and headless runs
    pub fn fixed() -> Self {
        Self {
            background: "#ffffff".into(),
            surface: "#f0f0f0".into(),
            text: "#000000".into(),
            accent: "#0000ff".into(),
            profit: "#008000".into(),
            loss: "#ff0000".into(),
            neutral: "#808080".into(),
        }
    }

    /// Color for a signed amount
    pub fn for_amount(&self, value: f64) -> &str {
        if value > 0.0 {
            &self.profit
        } else if value < 0.0 {
            &self.loss
        } else {
            &self.neutral
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: "#1e1e2e".into(),
            surface: "#2a2a3c".into(),
            text: "#e6e6f0".into(),
            accent: "#7aa2f7".into(),
            profit: "#9ece6a".into(),
            loss: "#f7768e".into(),
            neutral: "#a9b1d6".into(),
        }
    }
}
