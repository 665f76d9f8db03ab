//! Sign-in state for the client: the persisted session, the identity provider
//! that issues and refreshes it, and the guard deciding which views need it.

pub mod error;
pub mod guard;
pub mod provider;
pub mod store;

pub use error::SessionError;
pub use guard::{guard, requires_session, RouteDecision};
pub use provider::{AuthClient, PersistentSession, SessionProvider};
pub use store::{Session, SessionStore};
