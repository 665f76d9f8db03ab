use crate::enums::StrategyStatus;
use crate::structs::Strategy;
use rust_decimal::Decimal;
use serde::Serialize;

/// Dashboard P&L figures derived from the server-computed per-strategy numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PnlSummary {
    /// Live plus paper P&L across every strategy.
    pub total: Decimal,
    /// The same sum restricted to strategies that are currently running.
    pub running: Decimal,
}

impl PnlSummary {
    pub fn from_strategies<'a>(strategies: impl IntoIterator<Item = &'a Strategy>) -> Self {
        strategies
            .into_iter()
            .fold(Self::default(), |mut summary, strategy| {
                let pnl = strategy.total_pnl();
                summary.total += pnl;
                if strategy.status == StrategyStatus::Running {
                    summary.running += pnl;
                }
                summary
            })
    }
}
