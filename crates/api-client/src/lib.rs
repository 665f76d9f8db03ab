use crate::error::ApiError;
use async_trait::async_trait;
use configuration::ApiSettings;
use core_types::{BrokerCredentials, User};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use url::Url;

pub mod error;
pub mod requests;
pub mod responses;
// --- Public API ---
pub use requests::{BacktestRequest, DeployRequest, StrategyRequest};
pub use responses::{BacktestResponse, ErrorBody, SuggestionResponse};

/// The abstract interface to the strategy platform API.
///
/// Everything the client does goes through this trait, so the controllers can be
/// driven by the live HTTP implementation or by an in-memory fake in tests.
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Fetches one account with its strategies.
    async fn fetch_user(&self, email: &str) -> Result<User, ApiError>;

    /// Fetches every account. The server decides who may call this.
    async fn fetch_all_users(&self) -> Result<Vec<User>, ApiError>;

    /// Creates the account record for a newly signed-in user. Idempotent.
    async fn register_user(&self, email: &str) -> Result<(), ApiError>;

    /// Switches the terminal flag. Requires broker credentials to turn on.
    async fn set_terminal(&self, email: &str, on: bool) -> Result<(), ApiError>;

    /// Switches the trading engine flag. Requires the terminal to be on.
    async fn set_engine(&self, email: &str, on: bool) -> Result<(), ApiError>;

    /// Stores the broker key pair on the account.
    async fn save_broker_credentials(
        &self,
        email: &str,
        credentials: &BrokerCredentials,
    ) -> Result<(), ApiError>;

    /// Generates a new strategy, or regenerates an existing one, from a description.
    async fn submit_strategy(&self, request: &StrategyRequest) -> Result<(), ApiError>;

    /// Starts a strategy.
    async fn deploy(&self, request: &DeployRequest) -> Result<(), ApiError>;

    /// Halts a running strategy.
    async fn stop(&self, email: &str, strategy_id: &str) -> Result<(), ApiError>;

    /// Squares off a strategy's position and halts it.
    async fn square_off(&self, email: &str, strategy_id: &str) -> Result<(), ApiError>;

    /// Runs a server-side backtest of generated strategy code.
    async fn backtest(&self, request: &BacktestRequest) -> Result<BacktestResponse, ApiError>;

    /// Asks the copilot to continue a partial strategy description.
    async fn autocomplete(&self, email: &str, prompt: &str) -> Result<String, ApiError>;

    /// Reassigns the generation backend of a strategy.
    async fn update_llm(&self, email: &str, strategy_id: &str, llm: &str) -> Result<(), ApiError>;
}

/// A concrete implementation of the `PlatformApi` over HTTP.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpClient {
    pub fn new(settings: &ApiSettings) -> Result<Self, ApiError> {
        Self::build(settings, None)
    }

    /// Like `new`, but every request carries the session's bearer token so the
    /// server can authorize it.
    pub fn with_access_token(settings: &ApiSettings, access_token: &str) -> Result<Self, ApiError> {
        Self::build(settings, Some(access_token))
    }

    fn build(settings: &ApiSettings, access_token: Option<&str>) -> Result<Self, ApiError> {
        let base_url = Url::parse(&settings.resolved_base_url())
            .map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }

        let mut headers = HeaderMap::new();
        if let Some(token) = access_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| ApiError::InvalidData(format!("access token is not a valid header: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout())
            .user_agent(concat!("richacle/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, base_url })
    }

    /// Joins path segments onto the base URL, escaping each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ApiError> {
        Ok(self.client.request(method, self.endpoint(segments)?))
    }

    /// Sends the request and reads the whole body before looking at the status.
    async fn send_raw(&self, builder: RequestBuilder) -> Result<String, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        let url = response.url().path().to_string();
        let text = response.text().await?;

        if status.is_success() {
            tracing::debug!(%status, path = %url, "API request succeeded.");
            Ok(text)
        } else {
            tracing::debug!(%status, path = %url, body = %text, "API request rejected.");
            Err(ApiError::from_response(status.as_u16(), &text))
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let text = self.send_raw(builder).await?;
        serde_json::from_str::<T>(&text).map_err(|e| {
            ApiError::Deserialization(format!("{e}. Original text: {text}"))
        })
    }

    /// For endpoints whose success body carries nothing the client needs.
    async fn send_ack(&self, builder: RequestBuilder) -> Result<(), ApiError> {
        self.send_raw(builder).await.map(|_| ())
    }
}

#[async_trait]
impl PlatformApi for HttpClient {
    async fn fetch_user(&self, email: &str) -> Result<User, ApiError> {
        self.send_json(self.request(Method::GET, &["user", email])?).await
    }

    async fn fetch_all_users(&self) -> Result<Vec<User>, ApiError> {
        self.send_json(self.request(Method::GET, &["users-full"])?).await
    }

    async fn register_user(&self, email: &str) -> Result<(), ApiError> {
        let builder = self.request(Method::POST, &["add-user"])?.form(&[("email", email)]);
        self.send_ack(builder).await
    }

    async fn set_terminal(&self, email: &str, on: bool) -> Result<(), ApiError> {
        let builder = self
            .request(Method::POST, &["api", "terminal"])?
            .form(&[("email", email), ("toggle", if on { "true" } else { "false" })]);
        self.send_ack(builder).await
    }

    async fn set_engine(&self, email: &str, on: bool) -> Result<(), ApiError> {
        let builder = self
            .request(Method::POST, &["api", "engine"])?
            .form(&[("email", email), ("toggle", if on { "true" } else { "false" })]);
        self.send_ack(builder).await
    }

    async fn save_broker_credentials(
        &self,
        email: &str,
        credentials: &BrokerCredentials,
    ) -> Result<(), ApiError> {
        let builder = self.request(Method::POST, &["api", "binance"])?.form(&[
            ("email", email),
            ("apiKey", credentials.api_key.as_str()),
            ("apiSecret", credentials.api_secret.as_str()),
        ]);
        self.send_ack(builder).await
    }

    async fn submit_strategy(&self, request: &StrategyRequest) -> Result<(), ApiError> {
        let builder = self.request(Method::POST, &["api", "strategy"])?.form(request);
        self.send_ack(builder).await
    }

    async fn deploy(&self, request: &DeployRequest) -> Result<(), ApiError> {
        let builder = self.request(Method::POST, &["api", "deploy"])?.json(request);
        self.send_ack(builder).await
    }

    async fn stop(&self, email: &str, strategy_id: &str) -> Result<(), ApiError> {
        let builder = self
            .request(Method::POST, &["api", "stop"])?
            .form(&[("email", email), ("strategyId", strategy_id)]);
        self.send_ack(builder).await
    }

    async fn square_off(&self, email: &str, strategy_id: &str) -> Result<(), ApiError> {
        let builder = self
            .request(Method::POST, &["api", "squareoff"])?
            .form(&[("email", email), ("strategyId", strategy_id)]);
        self.send_ack(builder).await
    }

    async fn backtest(&self, request: &BacktestRequest) -> Result<BacktestResponse, ApiError> {
        let builder = self.request(Method::POST, &["api", "backtest"])?.json(request);
        let response: BacktestResponse = self.send_json(builder).await?;
        if !response.is_success() {
            return Err(ApiError::InvalidData(format!(
                "backtest finished with status '{}'",
                response.status
            )));
        }
        Ok(response)
    }

    async fn autocomplete(&self, email: &str, prompt: &str) -> Result<String, ApiError> {
        let builder = self
            .request(Method::POST, &["api", "autocomplete"])?
            .form(&[("prompt", prompt), ("email", email)]);
        let response: SuggestionResponse = self.send_json(builder).await?;
        Ok(response.suggestion.unwrap_or_default())
    }

    async fn update_llm(&self, email: &str, strategy_id: &str, llm: &str) -> Result<(), ApiError> {
        let builder = self
            .request(Method::POST, &["api", "update-llm"])?
            .form(&[("email", email), ("strategyId", strategy_id), ("llm", llm)]);
        self.send_ack(builder).await
    }
}
