use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Aggregate results of a server-side backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetrics {
    pub total_pnl: Decimal,
    pub return_percent: Decimal,
    pub max_drawdown: Decimal,
    pub win_rate_percent: Decimal,
    pub total_trades: u64,
    #[serde(default)]
    pub wins: u64,
    #[serde(default)]
    pub losses: u64,
}

/// Describes the market data the backtest ran over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataInfo {
    pub candles: u64,
    pub years: Decimal,
}

/// Builds the equity curve from per-trade P&L.
///
/// The curve starts at zero and each point is the running total rounded to
/// two decimal places, halves away from zero, so `[10, -5, 20]` becomes `[0, 10, 5, 25]`.
pub fn equity_curve(trade_history: &[Decimal]) -> Vec<Decimal> {
    let mut points = Vec::with_capacity(trade_history.len() + 1);
    points.push(Decimal::ZERO);

    let mut running_total = Decimal::ZERO;
    for pnl in trade_history {
        running_total += *pnl;
        points.push(running_total.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero));
    }
    points
}
