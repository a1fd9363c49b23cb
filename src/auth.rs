use std::sync::RwLock;

use reqwest::{header, RequestBuilder};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{session::SessionStore, state::ClientEvent};

/// What the guard did with an authentication failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Challenge {
    /// The request carried credentials: token and session were wiped.
    SessionCleared,
    /// Anonymous request, nothing to clear.
    Ignored,
}

/// Owns the in-memory bearer token and the forced-logout policy.
///
/// The token lives for the process only. It is the one writer of that token:
/// nothing else in the crate can set or clear it.
pub struct AuthGuard {
    token: RwLock<Option<String>>,
    session: SessionStore,
    events: Option<broadcast::Sender<ClientEvent>>,
}

impl AuthGuard {
    pub fn new(session: SessionStore) -> Self {
        Self {
            token: RwLock::new(None),
            session,
            events: None,
        }
    }

    pub fn with_events(mut self, events: broadcast::Sender<ClientEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn set_token(&self, token: impl Into<String>) {
        let token = token.into();
        let token = (!token.trim().is_empty()).then_some(token);
        *self.token.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = token;
    }

    pub fn clear_token(&self) {
        *self.token.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }

    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Attaches `Authorization: Bearer <token>` when a token is held.
    pub fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Handles a 401. Never asks for a retry: there is no refresh protocol,
    /// so a rejected credential means a hard logout.
    pub async fn challenge(&self, request_had_credentials: bool) -> Challenge {
        if !request_had_credentials {
            return Challenge::Ignored;
        }

        self.clear_token();
        if let Err(err) = self.session.clear().await {
            log::warn!("Failed to clear session after auth failure: {err}");
        }
        log::info!("Credentials rejected by the backend, session cleared");

        if let Some(events) = &self.events {
            let _ = events.send(ClientEvent::session_cleared());
        }
        Challenge::SessionCleared
    }
}

pub fn carries_credentials(headers: &header::HeaderMap) -> bool {
    headers.contains_key(header::AUTHORIZATION)
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
