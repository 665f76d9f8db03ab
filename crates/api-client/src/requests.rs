use core_types::TradingMode;
use serde::Serialize;

/// JSON body of `POST /api/deploy`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeployRequest {
    pub email: String,
    #[serde(rename = "strategyId")]
    pub strategy_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<TradingMode>,
}

/// JSON body of `POST /api/backtest`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestRequest {
    /// The generated strategy code to simulate.
    pub strategy: String,
    pub email: String,
}

/// Form body of `POST /api/strategy`. Setting `id` regenerates an existing strategy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyRequest {
    pub email: String,
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}
