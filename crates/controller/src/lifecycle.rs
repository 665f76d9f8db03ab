use crate::error::{ControllerError, CreditKind, DeployRejection};
use crate::inflight::InFlight;
use crate::notice::Notice;
use crate::store::AccountStore;
use api_client::error::ApiError;
use api_client::{DeployRequest, PlatformApi, StrategyRequest};
use core_types::{BrokerCredentials, Llm, StrategyStatus, TradingMode};
use std::sync::Arc;

/// Turns user intents on the account and its strategies into platform calls.
///
/// Each operation makes at most one request and never retries. Local state is
/// only touched after the server accepts; on failure it is left as it was and
/// the next poll reconciles any drift.
pub struct LifecycleController {
    store: Arc<AccountStore>,
    deploying: InFlight,
}

impl LifecycleController {
    pub fn new(store: Arc<AccountStore>) -> Self {
        Self {
            store,
            deploying: InFlight::default(),
        }
    }

    pub fn store(&self) -> &Arc<AccountStore> {
        &self.store
    }

    fn api(&self) -> &Arc<dyn PlatformApi> {
        self.store.api()
    }

    fn email(&self) -> &str {
        self.store.email()
    }

    /// Flips the terminal flag. Turning it off also turns the engine off.
    pub async fn toggle_terminal(&self) -> Result<Notice, ControllerError> {
        let target = !self.store.snapshot().await.terminal;
        match self.api().set_terminal(self.email(), target).await {
            Ok(()) => {}
            Err(ApiError::Forbidden(_)) => return Err(ControllerError::MissingBrokerKeys),
            Err(e) => return Err(e.into()),
        }

        self.store
            .update(|user| {
                user.terminal = target;
                if !target {
                    user.engine = false;
                }
            })
            .await;
        tracing::info!(email = %self.email(), terminal = target, "Terminal toggled.");
        Ok(Notice::success(if target { "Terminal ON" } else { "Terminal OFF" }))
    }

    /// Flips the engine flag. Nothing is sent while the terminal is off.
    pub async fn toggle_engine(&self) -> Result<Notice, ControllerError> {
        let user = self.store.snapshot().await;
        if !user.terminal {
            return Err(ControllerError::TerminalOff);
        }

        let target = !user.engine;
        match self.api().set_engine(self.email(), target).await {
            Ok(()) => {}
            Err(ApiError::Forbidden(_)) => return Err(ControllerError::EngineRejected),
            Err(e) => return Err(e.into()),
        }

        self.store.update(|user| user.engine = target).await;
        tracing::info!(email = %self.email(), engine = target, "Engine toggled.");
        Ok(Notice::success(if target { "Engine ON" } else { "Engine OFF" }))
    }

    /// Starts a strategy. `mode` defaults to whatever the server has stored.
    pub async fn deploy(&self, strategy_id: &str, mode: Option<TradingMode>) -> Result<Notice, ControllerError> {
        let _guard = self.deploying.try_begin().ok_or(ControllerError::Busy("deploy"))?;
        let strategy = self
            .store
            .strategy(strategy_id)
            .await
            .ok_or_else(|| ControllerError::StrategyNotFound(strategy_id.to_string()))?;

        let request = DeployRequest {
            email: self.email().to_string(),
            strategy_id: strategy.id.clone(),
            mode,
        };
        match self.api().deploy(&request).await {
            Ok(()) => {}
            Err(ApiError::Forbidden(detail)) => {
                let rejection = DeployRejection::classify(&detail);
                tracing::warn!(strategy_id, ?rejection, detail = %detail, "Deployment rejected.");
                return Err(ControllerError::DeployRejected(rejection));
            }
            Err(e) => return Err(e.into()),
        }

        self.store.set_strategy_status(&strategy.id, StrategyStatus::Running).await;
        if let Some(mode) = mode {
            self.store
                .update(|user| {
                    if let Some(s) = user.strategy_mut(&strategy.id) {
                        s.mode = Some(mode);
                    }
                })
                .await;
        }
        tracing::info!(strategy_id, ?mode, "Strategy deployed.");
        let label = mode.or(strategy.mode).map(|m| m.to_string());
        Ok(Notice::success(match label {
            Some(mode) => format!("Algo deployed: {mode}"),
            None => "Algo deployed".to_string(),
        }))
    }

    pub async fn stop(&self, strategy_id: &str) -> Result<Notice, ControllerError> {
        self.require_stoppable(strategy_id).await?;
        self.api().stop(self.email(), strategy_id).await?;
        self.store.set_strategy_status(strategy_id, StrategyStatus::Stopped).await;
        tracing::info!(strategy_id, "Strategy stopped.");
        Ok(Notice::success("Algo Stopped!"))
    }

    /// Asks the server to square off the strategy. Locally it just becomes stopped.
    pub async fn square_off(&self, strategy_id: &str) -> Result<Notice, ControllerError> {
        self.require_stoppable(strategy_id).await?;
        self.api().square_off(self.email(), strategy_id).await?;
        self.store.set_strategy_status(strategy_id, StrategyStatus::Stopped).await;
        tracing::info!(strategy_id, "Strategy squared off.");
        Ok(Notice::success("Algo Square OFF!"))
    }

    pub async fn connect_broker(&self, api_key: &str, api_secret: &str) -> Result<Notice, ControllerError> {
        let credentials = BrokerCredentials::new(api_key.trim(), api_secret.trim());
        if !credentials.is_complete() {
            return Err(ControllerError::InvalidInput(
                "Both the API key and the API secret are required".to_string(),
            ));
        }

        match self.api().save_broker_credentials(self.email(), &credentials).await {
            Ok(()) => {}
            Err(ApiError::Unauthorized(detail)) => return Err(ControllerError::InvalidBrokerKeys(detail)),
            Err(e) => return Err(e.into()),
        }

        tracing::info!(email = %self.email(), key = %credentials.masked_key(), "Broker keys saved.");
        self.store.update(|user| user.broker = Some(credentials)).await;
        Ok(Notice::success("Binance Connected"))
    }

    /// Generates a strategy from a description, or regenerates `editing` in place.
    pub async fn submit_strategy(&self, input: &str, editing: Option<&str>) -> Result<Notice, ControllerError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ControllerError::InvalidInput("Describe your strategy".to_string()));
        }
        if let Some(id) = editing {
            self.require_strategy(id).await?;
        }

        let request = StrategyRequest {
            email: self.email().to_string(),
            input: input.to_string(),
            id: editing.map(str::to_string),
        };
        match self.api().submit_strategy(&request).await {
            Ok(()) => {}
            Err(ApiError::Forbidden(_)) => return Err(ControllerError::InsufficientCredits(CreditKind::Strategy)),
            Err(e) => return Err(e.into()),
        }

        self.store.invalidate();
        tracing::info!(editing = ?editing, "Strategy submitted for generation.");
        Ok(Notice::success(if editing.is_some() { "Algorithm updated" } else { "Algorithm generated" }))
    }

    /// Switches the strategy's generation backend, reverting locally if the server refuses.
    pub async fn update_llm(&self, strategy_id: &str, llm: Llm) -> Result<Notice, ControllerError> {
        let previous = self
            .store
            .update(|user| {
                user.strategy_mut(strategy_id)
                    .map(|s| s.llm.replace(llm.as_str().to_string()))
            })
            .await
            .ok_or_else(|| ControllerError::StrategyNotFound(strategy_id.to_string()))?;

        if let Err(e) = self.api().update_llm(self.email(), strategy_id, llm.as_str()).await {
            self.store
                .update(|user| {
                    if let Some(s) = user.strategy_mut(strategy_id) {
                        s.llm = previous;
                    }
                })
                .await;
            return Err(e.into());
        }

        tracing::info!(strategy_id, llm = %llm, "Strategy LLM updated.");
        Ok(Notice::success(format!("LLM set to {llm}")))
    }

    /// Creates the account record after sign-in. Safe to repeat.
    pub async fn register_user(&self) -> Result<(), ControllerError> {
        self.api().register_user(self.email()).await?;
        tracing::debug!(email = %self.email(), "Account registered.");
        Ok(())
    }

    pub async fn refresh(&self) -> Result<(), ControllerError> {
        self.store.refresh().await.map(|_| ())
    }

    async fn require_strategy(&self, strategy_id: &str) -> Result<(), ControllerError> {
        match self.store.strategy(strategy_id).await {
            Some(_) => Ok(()),
            None => Err(ControllerError::StrategyNotFound(strategy_id.to_string())),
        }
    }

    /// Only running or errored strategies have anything on the server to stop.
    async fn require_stoppable(&self, strategy_id: &str) -> Result<(), ControllerError> {
        match self.store.strategy(strategy_id).await {
            Some(strategy) if strategy.status.can_stop() => Ok(()),
            Some(_) => Err(ControllerError::InvalidInput(format!(
                "Strategy '{strategy_id}' is not running"
            ))),
            None => Err(ControllerError::StrategyNotFound(strategy_id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, FakeApi, sample_user};
    use core_types::View;

    async fn controller(api: &Arc<FakeApi>) -> LifecycleController {
        let store = Arc::new(AccountStore::new(api.clone(), "trader@example.com"));
        store.refresh().await.unwrap();
        LifecycleController::new(store)
    }

    fn with_flags(terminal: bool, engine: bool) -> Arc<FakeApi> {
        let mut user = sample_user();
        user.terminal = terminal;
        user.engine = engine;
        Arc::new(FakeApi::new(user))
    }

    #[tokio::test]
    async fn engine_toggle_with_terminal_off_makes_no_call() {
        let api = with_flags(false, false);
        let lifecycle = controller(&api).await;

        let err = lifecycle.toggle_engine().await.unwrap_err();
        assert!(matches!(err, ControllerError::TerminalOff));
        assert_eq!(err.to_string(), "Enable Terminal First");
        assert_eq!(api.count("set_engine"), 0);
        assert!(!lifecycle.store().snapshot().await.engine);
    }

    #[tokio::test]
    async fn engine_toggle_flips_on_success_and_not_on_403() {
        let api = with_flags(true, false);
        let lifecycle = controller(&api).await;

        lifecycle.toggle_engine().await.unwrap();
        assert!(lifecycle.store().snapshot().await.engine);
        assert!(api.calls().contains(&Call::SetEngine(true)));

        api.fail("set_engine", 403, "Terminal must be ON before enabling engine");
        let err = lifecycle.toggle_engine().await.unwrap_err();
        assert!(matches!(err, ControllerError::EngineRejected));
        assert!(lifecycle.store().snapshot().await.engine);
    }

    #[tokio::test]
    async fn terminal_off_also_turns_the_engine_off() {
        let api = with_flags(true, true);
        let lifecycle = controller(&api).await;

        lifecycle.toggle_terminal().await.unwrap();
        let user = lifecycle.store().snapshot().await;
        assert!(!user.terminal);
        assert!(!user.engine);
        assert!(api.calls().contains(&Call::SetTerminal(false)));
    }

    #[tokio::test]
    async fn terminal_403_asks_for_broker_keys() {
        let api = with_flags(false, false);
        api.fail("set_terminal", 403, "Binance API keys missing");
        let lifecycle = controller(&api).await;

        let err = lifecycle.toggle_terminal().await.unwrap_err();
        assert_eq!(err.to_string(), "Add Binance keys before enabling terminal!");
        assert!(!lifecycle.store().snapshot().await.terminal);
    }

    #[tokio::test]
    async fn free_plan_deploy_rejection_goes_to_pricing_and_stays_idle() {
        let api = with_flags(true, true);
        api.fail(
            "deploy",
            403,
            "Deployment not allowed on FREE plan. Please upgrade to PRO or PREMIUM.",
        );
        let lifecycle = controller(&api).await;

        let err = lifecycle.deploy("s2", Some(TradingMode::Paper)).await.unwrap_err();
        assert!(matches!(err, ControllerError::DeployRejected(DeployRejection::FreePlan)));
        assert_eq!(err.redirect(), Some(View::Pricing));
        assert_eq!(err.notice().message, "Deployment not allowed on FREE plan. Please upgrade!");

        let strategy = lifecycle.store().strategy("s2").await.unwrap();
        assert_ne!(strategy.status, StrategyStatus::Running);
    }

    #[tokio::test]
    async fn engine_off_deploy_rejection_goes_to_dashboard() {
        let api = with_flags(true, false);
        api.fail("deploy", 403, "Engine is OFF");
        let lifecycle = controller(&api).await;

        let err = lifecycle.deploy("s2", None).await.unwrap_err();
        assert_eq!(err.redirect(), Some(View::Dashboard));
        assert_eq!(err.to_string(), "Engine is OFF!");
    }

    #[tokio::test]
    async fn successful_deploy_marks_the_strategy_running() {
        let api = with_flags(true, true);
        let lifecycle = controller(&api).await;

        let notice = lifecycle.deploy("s2", Some(TradingMode::Live)).await.unwrap();
        assert_eq!(notice.message, "Algo deployed: LIVE");

        let strategy = lifecycle.store().strategy("s2").await.unwrap();
        assert_eq!(strategy.status, StrategyStatus::Running);
        assert_eq!(strategy.mode, Some(TradingMode::Live));
        assert_eq!(
            api.calls().last(),
            Some(&Call::Deploy(DeployRequest {
                email: "trader@example.com".to_string(),
                strategy_id: "s2".to_string(),
                mode: Some(TradingMode::Live),
            }))
        );
    }

    #[tokio::test]
    async fn deploying_an_unknown_strategy_makes_no_call() {
        let api = with_flags(true, true);
        let lifecycle = controller(&api).await;
        let err = lifecycle.deploy("nope", None).await.unwrap_err();
        assert!(matches!(err, ControllerError::StrategyNotFound(_)));
        assert_eq!(api.count("deploy"), 0);
    }

    #[tokio::test]
    async fn stop_and_square_off_mark_the_strategy_stopped() {
        let api = with_flags(true, true);
        let lifecycle = controller(&api).await;

        lifecycle.stop("s1").await.unwrap();
        assert_eq!(lifecycle.store().strategy("s1").await.unwrap().status, StrategyStatus::Stopped);

        let notice = lifecycle.square_off("s3").await.unwrap();
        assert_eq!(notice.message, "Algo Square OFF!");
        let strategy = lifecycle.store().strategy("s3").await.unwrap();
        assert_eq!(strategy.status, StrategyStatus::Stopped);
        assert_eq!(strategy.last_error, None);
    }

    #[tokio::test]
    async fn idle_or_stopped_strategies_are_not_sent_to_the_server() {
        let api = with_flags(true, true);
        let lifecycle = controller(&api).await;

        let err = lifecycle.stop("s2").await.unwrap_err();
        assert!(matches!(err, ControllerError::InvalidInput(_)));

        lifecycle.stop("s1").await.unwrap();
        let err = lifecycle.square_off("s1").await.unwrap_err();
        assert!(matches!(err, ControllerError::InvalidInput(_)));
        let err = lifecycle.stop("missing").await.unwrap_err();
        assert!(matches!(err, ControllerError::StrategyNotFound(_)));

        assert_eq!(api.count("stop"), 1);
        assert_eq!(api.count("square_off"), 0);
    }

    #[tokio::test]
    async fn failed_stop_leaves_the_strategy_running() {
        let api = with_flags(true, true);
        api.fail("stop", 404, "Strategy not found");
        let lifecycle = controller(&api).await;

        let err = lifecycle.stop("s1").await.unwrap_err();
        assert!(matches!(err, ControllerError::Api(ApiError::NotFound(_))));
        assert_eq!(lifecycle.store().strategy("s1").await.unwrap().status, StrategyStatus::Running);
    }

    #[tokio::test]
    async fn broker_keys_are_required_locally_and_401_is_distinct() {
        let api = with_flags(false, false);
        let lifecycle = controller(&api).await;

        let err = lifecycle.connect_broker("key", "  ").await.unwrap_err();
        assert!(matches!(err, ControllerError::InvalidInput(_)));
        assert_eq!(api.count("save_broker_credentials"), 0);

        api.fail("save_broker_credentials", 401, "Invalid API key");
        let err = lifecycle.connect_broker("key", "secret").await.unwrap_err();
        assert!(matches!(err, ControllerError::InvalidBrokerKeys(ref d) if d == "Invalid API key"));
    }

    #[tokio::test]
    async fn empty_strategy_description_is_rejected_locally() {
        let api = with_flags(true, true);
        let lifecycle = controller(&api).await;
        let err = lifecycle.submit_strategy("   ", None).await.unwrap_err();
        assert_eq!(err.to_string(), "Describe your strategy");
        assert_eq!(api.count("submit_strategy"), 0);
    }

    #[tokio::test]
    async fn strategy_submission_invalidates_the_store() {
        let api = with_flags(true, true);
        let lifecycle = controller(&api).await;

        let notice = lifecycle.submit_strategy("Buy BTC on RSI < 30", Some("s1")).await.unwrap();
        assert_eq!(notice.message, "Algorithm updated");
        tokio::time::timeout(std::time::Duration::from_secs(1), lifecycle.store().invalidated())
            .await
            .unwrap();

        api.fail("submit_strategy", 403, "Insufficient credits");
        let err = lifecycle.submit_strategy("Sell ETH", None).await.unwrap_err();
        assert!(matches!(err, ControllerError::InsufficientCredits(CreditKind::Strategy)));
        assert_eq!(err.redirect(), Some(View::Pricing));
    }

    #[tokio::test]
    async fn llm_update_is_reverted_when_the_server_refuses() {
        let api = with_flags(true, true);
        let lifecycle = controller(&api).await;

        lifecycle.update_llm("s1", Llm::Gemini).await.unwrap();
        assert_eq!(lifecycle.store().strategy("s1").await.unwrap().llm.as_deref(), Some("Gemini"));

        api.fail("update_llm", 500, "boom");
        assert!(lifecycle.update_llm("s1", Llm::Grok).await.is_err());
        assert_eq!(lifecycle.store().strategy("s1").await.unwrap().llm.as_deref(), Some("Gemini"));
    }
}
