use crate::error::ControllerError;
use api_client::PlatformApi;
use api_client::error::ApiError;
use core_types::User;
use std::sync::Arc;

/// Users whose email or id contains `query`, ignoring case. A blank query keeps everyone.
pub fn filter_users<'a>(users: &'a [User], query: &str) -> Vec<&'a User> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return users.iter().collect();
    }
    users
        .iter()
        .filter(|u| u.email.to_lowercase().contains(&needle) || u.id.to_lowercase().contains(&needle))
        .collect()
}

/// Read-only listing of every account. The server decides who may see it.
pub struct AdminDirectory {
    api: Arc<dyn PlatformApi>,
    users: Vec<User>,
}

impl AdminDirectory {
    pub fn new(api: Arc<dyn PlatformApi>) -> Self {
        Self { api, users: Vec::new() }
    }

    pub async fn load(&mut self) -> Result<&[User], ControllerError> {
        self.users = match self.api.fetch_all_users().await {
            Ok(users) => users,
            Err(ApiError::Unauthorized(detail) | ApiError::Forbidden(detail)) => {
                tracing::warn!(detail = %detail, "User directory refused.");
                return Err(ControllerError::AccessDenied(detail));
            }
            Err(e) => return Err(e.into()),
        };
        tracing::info!(users = self.users.len(), "User directory loaded.");
        Ok(&self.users)
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn filter(&self, query: &str) -> Vec<&User> {
        filter_users(&self.users, query)
    }
}
