//! Client-side controllers for the strategy platform.
//!
//! `AccountStore` holds the one shared account snapshot and `Poller` keeps it
//! fresh. The controllers on top map user intents to API calls:
//! `LifecycleController` for the account and strategies, `BacktestRunner` for
//! simulations, `CopilotSession` for strategy composition and `AdminDirectory`
//! for the user listing.

pub mod admin;
pub mod backtest;
pub mod composer;
pub mod error;
pub mod inflight;
pub mod lifecycle;
pub mod notice;
pub mod poller;
pub mod store;

#[cfg(test)]
mod testing;

pub use admin::{AdminDirectory, filter_users};
pub use backtest::{BacktestReport, BacktestRunner};
pub use composer::{Composer, Copilot, CopilotEvent, CopilotSession, Key, join_suggestion};
pub use error::{ControllerError, CreditKind, DeployRejection};
pub use lifecycle::LifecycleController;
pub use notice::{Notice, NoticeLevel};
pub use poller::Poller;
pub use store::AccountStore;
