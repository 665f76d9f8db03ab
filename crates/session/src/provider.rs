use crate::error::SessionError;
use crate::store::{Session, SessionStore};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use configuration::AuthSettings;
use serde::{Deserialize, Serialize};

/// Supplies the signed-in user to the rest of the client.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// The current session, refreshed if it has expired. `None` means signed out.
    async fn current(&self) -> Result<Option<Session>, SessionError>;

    async fn current_email(&self) -> Result<Option<String>, SessionError> {
        Ok(self.current().await?.map(|session| session.email))
    }
}

// --- Identity provider wire format ---

#[derive(Debug, Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    #[serde(default)]
    expires_at: Option<i64>,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    #[serde(default)]
    email: Option<String>,
}

/// The provider has used several error shapes over time.
#[derive(Debug, Default, Deserialize)]
struct AuthErrorBody {
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

impl AuthErrorBody {
    fn reason(body: &str) -> String {
        let parsed: AuthErrorBody = serde_json::from_str(body).unwrap_or_default();
        parsed
            .error_description
            .or(parsed.msg)
            .or(parsed.message)
            .or(parsed.error)
            .unwrap_or_else(|| body.trim().to_string())
    }
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Result<Session, SessionError> {
        let email = self
            .user
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| SessionError::InvalidResponse("token response has no user email".to_string()))?;
        let expires_at = match self.expires_at.and_then(|secs| DateTime::from_timestamp(secs, 0)) {
            Some(at) => at,
            None => TimeDelta::try_seconds(self.expires_in)
                .and_then(|lifetime| now.checked_add_signed(lifetime))
                .ok_or_else(|| {
                    SessionError::InvalidResponse(format!("token lifetime out of range: {}s", self.expires_in))
                })?,
        };
        Ok(Session {
            email,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
        })
    }
}

/// A client for the hosted identity provider's token endpoint.
#[derive(Clone)]
pub struct AuthClient {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl AuthClient {
    pub fn new(settings: &AuthSettings) -> Result<Self, SessionError> {
        if !settings.is_configured() {
            return Err(SessionError::NotConfigured);
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: settings.url.trim().trim_end_matches('/').to_string(),
            anon_key: settings.anon_key.trim().to_string(),
        })
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, SessionError> {
        self.token_grant("password", &PasswordGrant { email, password }).await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<Session, SessionError> {
        self.token_grant("refresh_token", &RefreshGrant { refresh_token }).await
    }

    async fn token_grant<B: Serialize + Sync>(&self, grant_type: &str, body: &B) -> Result<Session, SessionError> {
        let url = format!("{}/auth/v1/token", self.base_url);
        let response = self
            .client
            .post(&url)
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.anon_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let reason = AuthErrorBody::reason(&text);
            tracing::warn!(%status, grant_type, reason = %reason, "Token grant rejected.");
            return Err(SessionError::Rejected(reason));
        }

        let token: TokenResponse = serde_json::from_str(&text)
            .map_err(|e| SessionError::InvalidResponse(e.to_string()))?;
        token.into_session(Utc::now())
    }
}

/// The session persisted on disk, refreshed through the identity provider when it expires.
pub struct PersistentSession {
    store: SessionStore,
    auth: Option<AuthClient>,
}

impl PersistentSession {
    /// `auth` may be absent when the provider is not configured; an expired
    /// session then simply counts as signed out.
    pub fn new(store: SessionStore, auth: Option<AuthClient>) -> Self {
        Self { store, auth }
    }

    fn auth(&self) -> Result<&AuthClient, SessionError> {
        self.auth.as_ref().ok_or(SessionError::NotConfigured)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, SessionError> {
        let session = self.auth()?.sign_in_with_password(email, password).await?;
        self.store.save(&session).await?;
        tracing::info!(email = %session.email, "Signed in.");
        Ok(session)
    }

    pub async fn sign_out(&self) -> Result<(), SessionError> {
        self.store.clear().await?;
        tracing::info!("Signed out.");
        Ok(())
    }
}

#[async_trait]
impl SessionProvider for PersistentSession {
    async fn current(&self) -> Result<Option<Session>, SessionError> {
        let session = match self.store.load().await {
            Ok(Some(session)) => session,
            Ok(None) => return Ok(None),
            // An unreadable file is a lost session; the next sign-in rewrites it.
            Err(SessionError::Corrupt(e)) => {
                tracing::warn!(error = %e, "Session file is corrupt; signing out.");
                self.store.clear().await?;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        if !session.is_expired(Utc::now()) {
            return Ok(Some(session));
        }

        let Some(auth) = &self.auth else {
            tracing::debug!("Session expired and no identity provider is configured to refresh it.");
            return Ok(None);
        };
        match auth.refresh(&session.refresh_token).await {
            Ok(refreshed) => {
                self.store.save(&refreshed).await?;
                tracing::debug!(email = %refreshed.email, "Session refreshed.");
                Ok(Some(refreshed))
            }
            Err(SessionError::Rejected(reason)) => {
                tracing::warn!(reason = %reason, "Refresh token rejected; signing out.");
                self.store.clear().await?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn token_response_becomes_a_session() {
        let now = Utc::now();
        let token: TokenResponse = serde_json::from_str(
            r#"{"access_token": "a", "refresh_token": "r", "expires_in": 3600,
                "token_type": "bearer", "user": {"id": "u1", "email": "trader@example.com"}}"#,
        )
        .unwrap();
        let session = token.into_session(now).unwrap();
        assert_eq!(session.email, "trader@example.com");
        assert_eq!(session.expires_at, now + Duration::seconds(3600));
    }

    #[test]
    fn absolute_expiry_wins_over_relative() {
        let token: TokenResponse = serde_json::from_str(
            r#"{"access_token": "a", "refresh_token": "r", "expires_in": 3600,
                "expires_at": 1700000000, "user": {"email": "trader@example.com"}}"#,
        )
        .unwrap();
        let session = token.into_session(Utc::now()).unwrap();
        assert_eq!(session.expires_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn token_without_email_is_invalid() {
        let token: TokenResponse = serde_json::from_str(
            r#"{"access_token": "a", "refresh_token": "r", "expires_in": 60, "user": {}}"#,
        )
        .unwrap();
        assert!(matches!(token.into_session(Utc::now()), Err(SessionError::InvalidResponse(_))));
    }

    #[test]
    fn error_reason_prefers_the_description() {
        let reason = AuthErrorBody::reason(
            r#"{"error": "invalid_grant", "error_description": "Invalid login credentials"}"#,
        );
        assert_eq!(reason, "Invalid login credentials");
        assert_eq!(AuthErrorBody::reason(r#"{"msg": "Email not confirmed"}"#), "Email not confirmed");
        assert_eq!(AuthErrorBody::reason("gateway timeout"), "gateway timeout");
    }

    #[test]
    fn auth_client_requires_configuration() {
        assert!(matches!(AuthClient::new(&AuthSettings::default()), Err(SessionError::NotConfigured)));
    }

    #[tokio::test]
    async fn unexpired_session_is_returned_without_a_provider() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));
        let session = Session {
            email: "trader@example.com".to_string(),
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
        };
        store.save(&session).await.unwrap();

        let provider = PersistentSession::new(store, None);
        assert_eq!(provider.current_email().await.unwrap().as_deref(), Some("trader@example.com"));
    }

    #[tokio::test]
    async fn expired_session_without_a_provider_counts_as_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));
        let session = Session {
            email: "trader@example.com".to_string(),
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires_at: Utc::now() - Duration::hours(1),
        };
        store.save(&session).await.unwrap();

        let provider = PersistentSession::new(store, None);
        assert_eq!(provider.current().await.unwrap(), None);
    }

    #[test]
    fn out_of_range_lifetime_is_invalid() {
        let token: TokenResponse = serde_json::from_str(&format!(
            r#"{{"access_token": "a", "refresh_token": "r", "expires_in": {}, "user": {{"email": "trader@example.com"}}}}"#,
            i64::MAX
        ))
        .unwrap();
        assert!(matches!(token.into_session(Utc::now()), Err(SessionError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn corrupt_session_file_counts_as_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{ not json").unwrap();

        let provider = PersistentSession::new(SessionStore::new(&path), None);
        assert_eq!(provider.current().await.unwrap(), None);
        assert!(!path.exists());
        assert_eq!(provider.current_email().await.unwrap(), None);
    }
}
