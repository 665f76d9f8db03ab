use crate::enums::{Plan, StrategyStatus, TradingMode};
use crate::lenient;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A broker API key pair as stored on the account.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerCredentials {
    #[serde(rename = "apiKey", default, deserialize_with = "lenient::null_as_default")]
    pub api_key: String,
    #[serde(rename = "apiSecret", default, deserialize_with = "lenient::null_as_default")]
    pub api_secret: String,
}

impl BrokerCredentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Both halves of the pair are present.
    pub fn is_complete(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.api_secret.trim().is_empty()
    }

    /// The key with everything but the last four characters hidden.
    pub fn masked_key(&self) -> String {
        let visible: String = self
            .api_key
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("****{visible}")
    }
}

impl fmt::Debug for BrokerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerCredentials")
            .field("api_key", &self.masked_key())
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// A generated trading strategy and its last known execution state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub id: String,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub name: String,
    /// The natural-language description the strategy was generated from.
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub input: String,
    /// Generated source, opaque to the client.
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub code: String,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub symbol: String,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub timeframe: String,
    #[serde(default, deserialize_with = "lenient::optional_mode")]
    pub mode: Option<TradingMode>,
    #[serde(default, deserialize_with = "lenient::decimal")]
    pub amount: Decimal,
    #[serde(default, deserialize_with = "lenient::decimal")]
    pub leverage: Decimal,
    #[serde(default)]
    pub status: StrategyStatus,
    #[serde(default, deserialize_with = "lenient::decimal")]
    pub live_pnl: Decimal,
    #[serde(default, deserialize_with = "lenient::decimal")]
    pub paper_pnl: Decimal,
    #[serde(default)]
    pub last_error: Option<String>,
    /// The generation backend that produced `code`.
    #[serde(default)]
    pub llm: Option<String>,
}

impl Strategy {
    /// Live plus paper P&L.
    pub fn total_pnl(&self) -> Decimal {
        self.live_pnl + self.paper_pnl
    }

    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() { &self.id } else { &self.name }
    }
}

/// A platform account together with its strategies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", default, deserialize_with = "lenient::null_as_default")]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub plan: Plan,
    /// Remaining strategy generations.
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub credits: i64,
    /// Remaining autocomplete requests.
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub copilot: i64,
    /// Remaining backtest runs.
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub backtest: i64,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub engine: bool,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub terminal: bool,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub active: bool,
    #[serde(rename = "binance", default)]
    pub broker: Option<BrokerCredentials>,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub strategies: Vec<Strategy>,
}

impl User {
    pub fn has_broker_credentials(&self) -> bool {
        self.broker.as_ref().is_some_and(BrokerCredentials::is_complete)
    }

    pub fn strategy(&self, id: &str) -> Option<&Strategy> {
        self.strategies.iter().find(|s| s.id == id)
    }

    pub fn strategy_mut(&mut self, id: &str) -> Option<&mut Strategy> {
        self.strategies.iter_mut().find(|s| s.id == id)
    }

    /// Strategies that have ever been deployed, i.e. carry a non-empty status.
    pub fn listed_strategies(&self) -> impl Iterator<Item = &Strategy> {
        self.strategies.iter().filter(|s| s.status.is_listed())
    }

    pub fn running_count(&self) -> usize {
        self.strategies
            .iter()
            .filter(|s| s.status == StrategyStatus::Running)
            .count()
    }

    /// The part of the address before the `@`, used as a greeting.
    pub fn handle(&self) -> &str {
        self.email.split('@').next().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const ACCOUNT: &str = r#"{
        "_id": "665f1c",
        "email": "trader@example.com",
        "plan": "PRO",
        "credits": 2,
        "copilot": 97,
        "backtest": 9,
        "engine": true,
        "terminal": true,
        "active": true,
        "binance": { "apiKey": "abcdef123456", "apiSecret": "s3cr3t" },
        "strategies": [
            {
                "id": "s1",
                "name": "EMA cross",
                "input": "Buy BTC when EMA 9 crosses above EMA 21",
                "code": "def run_strategy(df): ...",
                "symbol": "BTC/USDT",
                "timeframe": "15m",
                "mode": "PAPER",
                "amount": "100",
                "leverage": 5,
                "status": "running",
                "live_pnl": "",
                "paper_pnl": 12.5,
                "last_error": null,
                "llm": "Claude"
            },
            { "id": "s2", "status": "" }
        ]
    }"#;

    #[test]
    fn decodes_a_full_account_document() {
        let user: User = serde_json::from_str(ACCOUNT).unwrap();
        assert_eq!(user.id, "665f1c");
        assert_eq!(user.plan, Plan::Pro);
        assert!(user.has_broker_credentials());
        assert_eq!(user.strategies.len(), 2);

        let s1 = user.strategy("s1").unwrap();
        assert_eq!(s1.mode, Some(TradingMode::Paper));
        assert_eq!(s1.amount, dec!(100));
        assert_eq!(s1.live_pnl, Decimal::ZERO);
        assert_eq!(s1.total_pnl(), dec!(12.5));
        assert_eq!(user.running_count(), 1);
        assert_eq!(user.listed_strategies().count(), 1);
        assert_eq!(user.handle(), "trader");
    }

    #[test]
    fn decodes_a_freshly_registered_account() {
        let user: User =
            serde_json::from_str(r#"{"email": "new@example.com", "credits": 3, "plan": "FREE"}"#).unwrap();
        assert!(user.strategies.is_empty());
        assert!(!user.terminal);
        assert!(!user.has_broker_credentials());
    }

    #[test]
    fn debug_output_never_contains_the_secret() {
        let creds = BrokerCredentials::new("abcdef123456", "s3cr3t");
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("s3cr3t"));
        assert!(rendered.contains("****3456"));
    }
}
