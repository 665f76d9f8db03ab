use crate::error::{ControllerError, CreditKind};
use crate::notice::Notice;
use api_client::PlatformApi;
use api_client::error::ApiError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

/// Keys the composer reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Tab,
    ArrowRight,
    Other,
}

/// Appends a suggestion to the input with exactly one space between them.
pub fn join_suggestion(input: &str, suggestion: &str) -> String {
    let head = input.trim_end();
    let tail = suggestion.trim_start();
    if head.is_empty() {
        tail.to_string()
    } else {
        format!("{head} {tail}")
    }
}

/// Editing state of a strategy description and its pending copilot suggestion.
#[derive(Debug, Clone)]
pub struct Composer {
    input: String,
    suggestion: Option<String>,
    copilot_enabled: bool,
    revision: u64,
    min_chars: usize,
}

impl Composer {
    /// Suggestions are only requested once the trimmed input is longer than `min_chars`.
    pub fn new(min_chars: usize) -> Self {
        Self {
            input: String::new(),
            suggestion: None,
            copilot_enabled: true,
            revision: 0,
            min_chars,
        }
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn suggestion(&self) -> Option<&str> {
        self.suggestion.as_deref()
    }

    pub fn copilot_enabled(&self) -> bool {
        self.copilot_enabled
    }

    /// Identifies the current input; a suggestion for an older one is stale.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Replaces the input. Any shown suggestion no longer applies.
    pub fn set_input(&mut self, input: impl Into<String>) -> u64 {
        self.input = input.into();
        self.suggestion = None;
        self.revision += 1;
        self.revision
    }

    pub fn set_copilot(&mut self, enabled: bool) {
        self.copilot_enabled = enabled;
        if !enabled {
            self.suggestion = None;
        }
    }

    pub fn wants_suggestion(&self) -> bool {
        self.copilot_enabled && self.input.trim().chars().count() > self.min_chars
    }

    /// Shows `suggestion` if it was fetched for the current input. Returns whether it was kept.
    pub fn offer(&mut self, revision: u64, suggestion: &str) -> bool {
        if revision != self.revision || !self.copilot_enabled || suggestion.trim().is_empty() {
            return false;
        }
        self.suggestion = Some(suggestion.to_string());
        true
    }

    /// Tab and Right-Arrow accept the suggestion. Returns whether the key was consumed.
    pub fn handle_key(&mut self, key: Key) -> bool {
        match key {
            Key::Tab | Key::ArrowRight => self.accept(),
            Key::Other => false,
        }
    }

    /// Merges the suggestion into the input.
    pub fn accept(&mut self) -> bool {
        match self.suggestion.take() {
            Some(suggestion) => {
                let joined = join_suggestion(&self.input, &suggestion);
                self.set_input(joined);
                true
            }
            None => false,
        }
    }
}

/// Fetches continuations for partial descriptions after the user pauses typing.
pub struct Copilot {
    api: Arc<dyn PlatformApi>,
    email: String,
    debounce: Duration,
}

impl Copilot {
    pub fn new(api: Arc<dyn PlatformApi>, email: impl Into<String>, debounce: Duration) -> Self {
        Self {
            api,
            email: email.into(),
            debounce,
        }
    }

    /// Waits out the debounce, then asks for a suggestion. Dropping the future
    /// before the debounce ends sends nothing.
    pub async fn suggest(&self, prompt: &str) -> Result<String, ControllerError> {
        tokio::time::sleep(self.debounce).await;
        match self.api.autocomplete(&self.email, prompt).await {
            Ok(suggestion) => Ok(suggestion),
            Err(ApiError::Forbidden(_)) => Err(ControllerError::InsufficientCredits(CreditKind::Copilot)),
            Err(e) => Err(e.into()),
        }
    }
}

/// What a background copilot fetch produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopilotEvent {
    Suggested(String),
    /// The copilot switched itself off, e.g. out of credits.
    Disabled(Notice),
    Failed(String),
}

/// A composer wired to a copilot: every input change (typing, accepting a
/// suggestion) and switching the copilot on restarts the debounce and cancels
/// the fetch for the previous input.
pub struct CopilotSession {
    composer: Arc<Mutex<Composer>>,
    copilot: Arc<Copilot>,
    events: mpsc::UnboundedSender<CopilotEvent>,
    pending: Option<JoinHandle<()>>,
}

impl CopilotSession {
    pub fn new(composer: Composer, copilot: Copilot) -> (Self, mpsc::UnboundedReceiver<CopilotEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let session = Self {
            composer: Arc::new(Mutex::new(composer)),
            copilot: Arc::new(copilot),
            events,
            pending: None,
        };
        (session, receiver)
    }

    pub async fn snapshot(&self) -> Composer {
        self.composer.lock().await.clone()
    }

    pub async fn edit(&mut self, input: impl Into<String>) {
        self.composer.lock().await.set_input(input);
        self.schedule().await;
    }

    pub async fn handle_key(&mut self, key: Key) -> bool {
        let accepted = self.composer.lock().await.handle_key(key);
        if accepted {
            // The merged input is new input; it gets its own debounce.
            self.schedule().await;
        }
        accepted
    }

    pub async fn set_copilot(&mut self, enabled: bool) {
        self.composer.lock().await.set_copilot(enabled);
        self.schedule().await;
    }

    /// Cancels any pending fetch and, if the current input wants one, starts
    /// the debounce for it.
    async fn schedule(&mut self) {
        self.cancel_pending();
        let (revision, prompt) = {
            let composer = self.composer.lock().await;
            if !composer.wants_suggestion() {
                return;
            }
            (composer.revision(), composer.input().to_string())
        };

        let composer = Arc::clone(&self.composer);
        let copilot = Arc::clone(&self.copilot);
        let events = self.events.clone();
        self.pending = Some(tokio::spawn(async move {
            let event = match copilot.suggest(&prompt).await {
                Ok(suggestion) => {
                    if !composer.lock().await.offer(revision, &suggestion) {
                        return;
                    }
                    CopilotEvent::Suggested(suggestion)
                }
                Err(e @ ControllerError::InsufficientCredits(_)) => {
                    composer.lock().await.set_copilot(false);
                    tracing::warn!(error = %e, "Copilot disabled.");
                    CopilotEvent::Disabled(e.notice())
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Autocomplete failed.");
                    CopilotEvent::Failed(e.to_string())
                }
            };
            let _ = events.send(event);
        }));
    }

    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for CopilotSession {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}
