use crate::error::CoreError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// The subscription tier attached to a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Plan {
    #[default]
    Free,
    Pro,
    Premium,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "FREE",
            Plan::Pro => "PRO",
            Plan::Premium => "PREMIUM",
        }
    }

    /// How many strategies the platform lets this plan run at once.
    ///
    /// The server enforces the quota; the client only uses it to show slot usage.
    pub fn max_active_deployments(&self) -> usize {
        match self {
            Plan::Free => 0,
            Plan::Pro => 3,
            Plan::Premium => 24,
        }
    }

    /// Maps a plan name as stored by the platform. Unknown names fall back to FREE.
    pub fn from_platform(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "PRO" => Plan::Pro,
            "PREMIUM" => Plan::Premium,
            _ => Plan::Free,
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Plan {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Plan {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(Plan::from_platform).unwrap_or_default())
    }
}

/// Where a strategy sits in its lifecycle, as last reported by the platform.
///
/// `Idle` is the empty status of a strategy that was generated but never deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StrategyStatus {
    #[default]
    Idle,
    Running,
    Stopped,
    Error,
}

impl StrategyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyStatus::Idle => "",
            StrategyStatus::Running => "running",
            StrategyStatus::Stopped => "stopped",
            StrategyStatus::Error => "error",
        }
    }

    /// Strategies with any non-empty status show up in the active algorithms list.
    pub fn is_listed(&self) -> bool {
        !matches!(self, StrategyStatus::Idle)
    }

    /// Running and errored strategies can be stopped or squared off; the rest can be deployed.
    pub fn can_stop(&self) -> bool {
        matches!(self, StrategyStatus::Running | StrategyStatus::Error)
    }

    pub fn from_platform(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "running" => StrategyStatus::Running,
            "stopped" => StrategyStatus::Stopped,
            "error" => StrategyStatus::Error,
            _ => StrategyStatus::Idle,
        }
    }
}

impl fmt::Display for StrategyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for StrategyStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StrategyStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(StrategyStatus::from_platform).unwrap_or_default())
    }
}

/// Whether a deployment trades real funds or simulates fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradingMode {
    Live,
    Paper,
}

impl TradingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradingMode::Live => "LIVE",
            TradingMode::Paper => "PAPER",
        }
    }
}

impl fmt::Display for TradingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradingMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LIVE" => Ok(TradingMode::Live),
            "PAPER" => Ok(TradingMode::Paper),
            other => Err(CoreError::InvalidInput(
                "mode".to_string(),
                format!("'{other}' is not LIVE or PAPER"),
            )),
        }
    }
}

/// The generation backends a strategy can be (re)assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Llm {
    ChatGpt,
    Claude,
    Gemini,
    Grok,
    Perplexity,
    Llama,
    DeepSeek,
    Qwen,
}

impl Llm {
    pub const ALL: [Llm; 8] = [
        Llm::ChatGpt,
        Llm::Claude,
        Llm::Gemini,
        Llm::Grok,
        Llm::Perplexity,
        Llm::Llama,
        Llm::DeepSeek,
        Llm::Qwen,
    ];

    /// The name the platform stores on the strategy record.
    pub fn as_str(&self) -> &'static str {
        match self {
            Llm::ChatGpt => "ChatGPT",
            Llm::Claude => "Claude",
            Llm::Gemini => "Gemini",
            Llm::Grok => "Grok",
            Llm::Perplexity => "Perplexity",
            Llm::Llama => "Llama",
            Llm::DeepSeek => "DeepSeek",
            Llm::Qwen => "Qwen",
        }
    }
}

impl fmt::Display for Llm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Llm {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Llm::ALL
            .into_iter()
            .find(|llm| llm.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let known = Llm::ALL.map(|llm| llm.as_str()).join(", ");
                CoreError::InvalidInput("llm".to_string(), format!("'{wanted}' is not one of {known}"))
            })
    }
}

/// The screens of the product. Outcomes carry one of these when the user should be sent elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Landing,
    Login,
    Signup,
    Pricing,
    Dashboard,
    Strategy,
    Backtest,
    Admin,
    Terms,
    Policy,
}

impl View {
    pub fn path(&self) -> &'static str {
        match self {
            View::Landing => "/",
            View::Login => "/login",
            View::Signup => "/signup",
            View::Pricing => "/pricing",
            View::Dashboard => "/dashboard",
            View::Strategy => "/strategy",
            View::Backtest => "/backtest",
            View::Admin => "/admin",
            View::Terms => "/terms",
            View::Policy => "/policy",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}
