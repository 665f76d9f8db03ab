pub mod enums;
pub mod error;
pub mod lenient;
pub mod metrics;
pub mod pnl;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{Llm, Plan, StrategyStatus, TradingMode, View};
pub use error::CoreError;
pub use metrics::{equity_curve, BacktestMetrics, DataInfo};
pub use pnl::PnlSummary;
pub use structs::{BrokerCredentials, Strategy, User};
