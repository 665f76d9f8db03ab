//! An in-memory `PlatformApi` that records every call it receives.

use api_client::error::ApiError;
use api_client::{BacktestRequest, BacktestResponse, DeployRequest, PlatformApi, StrategyRequest};
use async_trait::async_trait;
use core_types::{BacktestMetrics, BrokerCredentials, DataInfo, Plan, Strategy, StrategyStatus, TradingMode, User};
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    FetchUser(String),
    FetchAllUsers,
    RegisterUser(String),
    SetTerminal(bool),
    SetEngine(bool),
    SaveBroker(String),
    SubmitStrategy(StrategyRequest),
    Deploy(DeployRequest),
    Stop(String),
    SquareOff(String),
    Backtest(String),
    Autocomplete(String),
    UpdateLlm(String, String),
}

impl Call {
    fn name(&self) -> &'static str {
        match self {
            Call::FetchUser(_) => "fetch_user",
            Call::FetchAllUsers => "fetch_all_users",
            Call::RegisterUser(_) => "register_user",
            Call::SetTerminal(_) => "set_terminal",
            Call::SetEngine(_) => "set_engine",
            Call::SaveBroker(_) => "save_broker_credentials",
            Call::SubmitStrategy(_) => "submit_strategy",
            Call::Deploy(_) => "deploy",
            Call::Stop(_) => "stop",
            Call::SquareOff(_) => "square_off",
            Call::Backtest(_) => "backtest",
            Call::Autocomplete(_) => "autocomplete",
            Call::UpdateLlm(..) => "update_llm",
        }
    }
}

pub struct FakeApi {
    user: Mutex<User>,
    directory: Mutex<Vec<User>>,
    suggestion: Mutex<String>,
    backtest: Mutex<Option<BacktestResponse>>,
    failures: Mutex<HashMap<&'static str, (u16, String)>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeApi {
    pub fn new(user: User) -> Self {
        Self {
            directory: Mutex::new(vec![user.clone()]),
            user: Mutex::new(user),
            suggestion: Mutex::new(String::new()),
            backtest: Mutex::new(Some(sample_backtest())),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_directory(self, users: Vec<User>) -> Self {
        *self.directory.lock().unwrap() = users;
        self
    }

    pub fn set_suggestion(&self, suggestion: &str) {
        *self.suggestion.lock().unwrap() = suggestion.to_string();
    }

    /// Makes every later call to `operation` answer with `status` and a `{"detail"}` body.
    pub fn fail(&self, operation: &'static str, status: u16, detail: &str) {
        let body = serde_json::json!({ "detail": detail }).to_string();
        self.failures.lock().unwrap().insert(operation, (status, body));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.name() == operation).count()
    }

    fn record(&self, call: Call) -> Result<(), ApiError> {
        let name = call.name();
        self.calls.lock().unwrap().push(call);
        match self.failures.lock().unwrap().get(name) {
            Some((status, body)) => Err(ApiError::from_response(*status, body)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PlatformApi for FakeApi {
    async fn fetch_user(&self, email: &str) -> Result<User, ApiError> {
        self.record(Call::FetchUser(email.to_string()))?;
        Ok(self.user.lock().unwrap().clone())
    }

    async fn fetch_all_users(&self) -> Result<Vec<User>, ApiError> {
        self.record(Call::FetchAllUsers)?;
        Ok(self.directory.lock().unwrap().clone())
    }

    async fn register_user(&self, email: &str) -> Result<(), ApiError> {
        self.record(Call::RegisterUser(email.to_string()))
    }

    async fn set_terminal(&self, _email: &str, on: bool) -> Result<(), ApiError> {
        self.record(Call::SetTerminal(on))
    }

    async fn set_engine(&self, _email: &str, on: bool) -> Result<(), ApiError> {
        self.record(Call::SetEngine(on))
    }

    async fn save_broker_credentials(&self, _email: &str, credentials: &BrokerCredentials) -> Result<(), ApiError> {
        self.record(Call::SaveBroker(credentials.api_key.clone()))
    }

    async fn submit_strategy(&self, request: &StrategyRequest) -> Result<(), ApiError> {
        self.record(Call::SubmitStrategy(request.clone()))
    }

    async fn deploy(&self, request: &DeployRequest) -> Result<(), ApiError> {
        self.record(Call::Deploy(request.clone()))
    }

    async fn stop(&self, _email: &str, strategy_id: &str) -> Result<(), ApiError> {
        self.record(Call::Stop(strategy_id.to_string()))
    }

    async fn square_off(&self, _email: &str, strategy_id: &str) -> Result<(), ApiError> {
        self.record(Call::SquareOff(strategy_id.to_string()))
    }

    async fn backtest(&self, request: &BacktestRequest) -> Result<BacktestResponse, ApiError> {
        self.record(Call::Backtest(request.strategy.clone()))?;
        self.backtest
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ApiError::InvalidData("no backtest result".to_string()))
    }

    async fn autocomplete(&self, _email: &str, prompt: &str) -> Result<String, ApiError> {
        self.record(Call::Autocomplete(prompt.to_string()))?;
        Ok(self.suggestion.lock().unwrap().clone())
    }

    async fn update_llm(&self, _email: &str, strategy_id: &str, llm: &str) -> Result<(), ApiError> {
        self.record(Call::UpdateLlm(strategy_id.to_string(), llm.to_string()))
    }
}

/// A PRO account with the terminal and engine on and three strategies.
pub fn sample_user() -> User {
    User {
        id: "665f1c".to_string(),
        email: "trader@example.com".to_string(),
        plan: Plan::Pro,
        credits: 2,
        copilot: 50,
        backtest: 5,
        engine: true,
        terminal: true,
        active: true,
        broker: Some(BrokerCredentials::new("abcdef123456", "s3cr3t")),
        strategies: vec![
            Strategy {
                id: "s1".to_string(),
                name: "EMA cross".to_string(),
                code: "def run_strategy(df): ...".to_string(),
                mode: Some(TradingMode::Paper),
                status: StrategyStatus::Running,
                live_pnl: dec!(10),
                paper_pnl: dec!(-3),
                llm: Some("Claude".to_string()),
                ..Strategy::default()
            },
            Strategy {
                id: "s2".to_string(),
                name: "RSI bounce".to_string(),
                code: "def run_strategy(df): ...".to_string(),
                live_pnl: dec!(5),
                paper_pnl: dec!(5),
                ..Strategy::default()
            },
            Strategy {
                id: "s3".to_string(),
                name: "Breakout".to_string(),
                status: StrategyStatus::Error,
                last_error: Some("insufficient margin".to_string()),
                ..Strategy::default()
            },
        ],
    }
}

pub fn sample_backtest() -> BacktestResponse {
    BacktestResponse {
        status: "success".to_string(),
        metrics: Some(BacktestMetrics {
            total_pnl: dec!(25),
            return_percent: dec!(2.5),
            max_drawdown: dec!(5),
            win_rate_percent: dec!(66.67),
            total_trades: 3,
            wins: 2,
            losses: 1,
        }),
        trade_history: vec![dec!(10), dec!(-5), dec!(20)],
        data_info: Some(DataInfo { candles: 35040, years: dec!(1) }),
    }
}
