use crate::error::{ControllerError, CreditKind};
use crate::inflight::InFlight;
use crate::store::AccountStore;
use api_client::BacktestRequest;
use api_client::error::ApiError;
use core_types::{BacktestMetrics, DataInfo, equity_curve};
use rust_decimal::Decimal;
use std::sync::Arc;

/// A finished backtest, ready to render.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestReport {
    pub strategy_id: String,
    pub strategy_name: String,
    pub metrics: Option<BacktestMetrics>,
    pub trade_history: Vec<Decimal>,
    /// Cumulative P&L after each trade, starting from 0.
    pub equity_curve: Vec<Decimal>,
    pub data_info: Option<DataInfo>,
}

/// Submits generated strategy code for server-side simulation, one run at a time.
pub struct BacktestRunner {
    store: Arc<AccountStore>,
    running: InFlight,
}

impl BacktestRunner {
    pub fn new(store: Arc<AccountStore>) -> Self {
        Self {
            store,
            running: InFlight::default(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_busy()
    }

    pub async fn run(&self, strategy_id: &str) -> Result<BacktestReport, ControllerError> {
        let _guard = self.running.try_begin().ok_or(ControllerError::Busy("backtest"))?;
        let strategy = self
            .store
            .strategy(strategy_id)
            .await
            .ok_or_else(|| ControllerError::StrategyNotFound(strategy_id.to_string()))?;
        if strategy.code.trim().is_empty() {
            return Err(ControllerError::InvalidInput(format!(
                "Strategy '{}' has no generated code to backtest",
                strategy.display_name()
            )));
        }

        tracing::info!(strategy_id, "Starting backtest.");
        let request = BacktestRequest {
            strategy: strategy.code.clone(),
            email: self.store.email().to_string(),
        };
        let response = match self.store.api().backtest(&request).await {
            Ok(response) => response,
            Err(ApiError::Forbidden(_)) => {
                return Err(ControllerError::InsufficientCredits(CreditKind::Backtest));
            }
            Err(e) => return Err(e.into()),
        };

        // The run consumed a credit; pick up the new counter.
        self.store.invalidate();
        tracing::info!(
            strategy_id,
            trades = response.trade_history.len(),
            "Backtest finished."
        );

        Ok(BacktestReport {
            equity_curve: equity_curve(&response.trade_history),
            strategy_name: strategy.display_name().to_string(),
            strategy_id: strategy.id,
            metrics: response.metrics,
            trade_history: response.trade_history,
            data_info: response.data_info,
        })
    }
}
