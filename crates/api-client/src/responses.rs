use core_types::{BacktestMetrics, DataInfo};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

/// The error envelope the platform uses for every rejected request.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub detail: Value,
}

impl ErrorBody {
    /// Extracts a human-readable reason from a raw error body.
    ///
    /// Plain-string details are returned as is, structured ones (validation errors)
    /// are rendered as JSON, and bodies that are not the envelope are returned trimmed.
    pub fn detail_from(body: &str) -> String {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(ErrorBody { detail: Value::String(detail) }) => detail,
            Ok(ErrorBody { detail }) => detail.to_string(),
            Err(_) => body.trim().to_string(),
        }
    }
}

/// The response from a successful `POST /api/backtest` request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BacktestResponse {
    pub status: String,
    #[serde(default)]
    pub metrics: Option<BacktestMetrics>,
    /// Realised P&L of each closed trade, in order.
    #[serde(default)]
    pub trade_history: Vec<Decimal>,
    #[serde(default)]
    pub data_info: Option<DataInfo>,
}

impl BacktestResponse {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// The response from `POST /api/autocomplete`.
#[derive(Debug, Clone, Deserialize)]
pub struct SuggestionResponse {
    #[serde(default)]
    pub suggestion: Option<String>,
}
