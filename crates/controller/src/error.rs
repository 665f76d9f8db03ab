use crate::notice::Notice;
use api_client::error::ApiError;
use core_types::View;
use thiserror::Error;

/// The kinds of usage credit the server meters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditKind {
    Strategy,
    Backtest,
    Copilot,
}

/// Why the server refused to deploy a strategy, classified from its 403 detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployRejection {
    FreePlan,
    EngineOff,
    LimitReached,
    MissingBrokerKeys,
    Other(String),
}

impl DeployRejection {
    /// Matches the server's detail text. The first matching marker wins.
    pub fn classify(detail: &str) -> Self {
        if detail.contains("FREE plan") {
            DeployRejection::FreePlan
        } else if detail.contains("Engine is OFF") {
            DeployRejection::EngineOff
        } else if detail.contains("Limit reached.") {
            DeployRejection::LimitReached
        } else if detail.contains("Binance") {
            DeployRejection::MissingBrokerKeys
        } else {
            DeployRejection::Other(detail.to_string())
        }
    }

    pub fn message(&self) -> String {
        match self {
            DeployRejection::FreePlan => "Deployment not allowed on FREE plan. Please upgrade!".to_string(),
            DeployRejection::EngineOff => "Engine is OFF!".to_string(),
            DeployRejection::LimitReached => "Limit reached! Upgrade your Plan".to_string(),
            DeployRejection::MissingBrokerKeys => "Binance API keys missing!".to_string(),
            DeployRejection::Other(detail) => format!("Deployment rejected: {detail}"),
        }
    }

    pub fn redirect(&self) -> Option<View> {
        match self {
            DeployRejection::FreePlan | DeployRejection::LimitReached => Some(View::Pricing),
            DeployRejection::EngineOff | DeployRejection::MissingBrokerKeys => Some(View::Dashboard),
            DeployRejection::Other(_) => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Enable Terminal First")]
    TerminalOff,

    #[error("Add Binance keys before enabling terminal!")]
    MissingBrokerKeys,

    #[error("Terminal must be ON before engine")]
    EngineRejected,

    #[error("{}", .0.message())]
    DeployRejected(DeployRejection),

    #[error("Insufficient {} credits", credit_label(.0))]
    InsufficientCredits(CreditKind),

    #[error("Invalid Binance API keys: {0}")]
    InvalidBrokerKeys(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Strategy '{0}' not found")]
    StrategyNotFound(String),

    #[error("A {0} request is already in progress")]
    Busy(&'static str),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Please sign in first")]
    NotSignedIn,

    #[error("API client error: {0}")]
    Api(#[from] ApiError),
}

fn credit_label(kind: &CreditKind) -> &'static str {
    match kind {
        CreditKind::Strategy => "strategy",
        CreditKind::Backtest => "backtest",
        CreditKind::Copilot => "copilot",
    }
}

impl ControllerError {
    /// Where the user should be sent after this failure, if anywhere.
    pub fn redirect(&self) -> Option<View> {
        match self {
            ControllerError::DeployRejected(rejection) => rejection.redirect(),
            ControllerError::InsufficientCredits(_) => Some(View::Pricing),
            ControllerError::NotSignedIn | ControllerError::AccessDenied(_) => Some(View::Login),
            ControllerError::Api(ApiError::Unauthorized(_)) => Some(View::Login),
            _ => None,
        }
    }

    /// A failed request shows the server's own reason when it gave one.
    pub fn notice(&self) -> Notice {
        let message = match self {
            ControllerError::Api(e) => match e.detail().map(str::trim).filter(|d| !d.is_empty()) {
                Some(detail) => detail.to_string(),
                None => self.to_string(),
            },
            _ => self.to_string(),
        };
        Notice::error(message).with_redirect(self.redirect())
    }
}
