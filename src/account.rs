use std::sync::Arc;

use tokio::sync::broadcast;

use crate::auth::AuthGuard;
use crate::error::ApiError;
use crate::gateway::Gateway;
use crate::models::{ClientProfile, ClientSession, NewClient, ProfileUpdate};
use crate::session::SessionStore;
use crate::state::ClientEvent;
use crate::workflow::MSG_NO_SESSION;

pub const MSG_ENTER_EMAIL: &str = "Enter your email";
pub const MSG_REQUIRED_FIELDS: &str = "Name and email are required";

/// Registration, lookup login, logout and the profile screen. The only
/// writer of the persisted session besides the auth guard's forced logout.
pub struct AccountService {
    gateway: Arc<dyn Gateway>,
    session: SessionStore,
    guard: Arc<AuthGuard>,
    events: Option<broadcast::Sender<ClientEvent>>,
}

impl AccountService {
    pub fn new(gateway: Arc<dyn Gateway>, session: SessionStore, guard: Arc<AuthGuard>) -> Self {
        Self {
            gateway,
            session,
            guard,
            events: None,
        }
    }

    pub fn with_events(mut self, events: broadcast::Sender<ClientEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub async fn current(&self) -> Result<ClientSession, ApiError> {
        Ok(self.session.load().await?)
    }

    pub async fn register(&self, client: NewClient) -> Result<ClientSession, ApiError> {
        if client.name.trim().is_empty() || client.email.trim().is_empty() {
            return Err(ApiError::validation(MSG_REQUIRED_FIELDS));
        }

        let created = self.gateway.create_client_account(&client).await?;
        let session = ClientSession {
            client_id: created.id,
            user_id: created.user_id,
            name: created.name,
            email: created.email,
            phone: client.phone,
            document_id: client.document_id,
            logged_in: true,
        };
        self.session.save(&session).await?;
        log::info!("Registered client {}", session.client_id);
        Ok(session)
    }

    pub async fn login(&self, email: &str) -> Result<ClientSession, ApiError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ApiError::validation(MSG_ENTER_EMAIL));
        }

        let profile = self.gateway.login_by_email(email).await?;
        let session = ClientSession {
            client_id: profile.id,
            user_id: profile.id,
            name: profile.name,
            email: profile.email,
            phone: profile.phone,
            document_id: profile.document_id,
            logged_in: true,
        };
        self.session.save(&session).await?;
        log::info!("Client {} logged in", session.client_id);
        Ok(session)
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        self.guard.clear_token();
        self.session.clear().await?;
        log::info!("Client logged out");

        if let Some(events) = &self.events {
            let _ = events.send(ClientEvent::session_cleared());
        }
        Ok(())
    }

    /// Fresh profile from the backend, or the copy kept in the session when
    /// the backend cannot be reached.
    pub async fn load_profile(&self) -> Result<ClientProfile, ApiError> {
        let session = self.session.load().await?;
        let client_id = session
            .active_client_id()
            .ok_or_else(|| ApiError::validation(MSG_NO_SESSION))?;

        match self.gateway.get_client_profile(client_id).await {
            Ok(profile) => Ok(profile),
            Err(err) if err.is_auth() => Err(err),
            Err(err) => {
                log::warn!("Profile for client {client_id} unavailable, using session copy: {err}");
                Ok(ClientProfile {
                    id: client_id,
                    name: session.name,
                    gender: String::new(),
                    email: session.email,
                    phone: session.phone,
                    document_id: session.document_id,
                })
            }
        }
    }

    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<ClientProfile, ApiError> {
        let session = self.session.load().await?;
        let client_id = session
            .active_client_id()
            .ok_or_else(|| ApiError::validation(MSG_NO_SESSION))?;
        if update.name.trim().is_empty() || update.email.trim().is_empty() {
            return Err(ApiError::validation(MSG_REQUIRED_FIELDS));
        }

        let profile = self.gateway.update_client_profile(client_id, &update).await?;
        self.session
            .save(&ClientSession {
                name: profile.name.clone(),
                email: profile.email.clone(),
                phone: profile.phone.clone(),
                document_id: profile.document_id.clone(),
                ..session
            })
            .await?;
        log::info!("Profile of client {client_id} updated");
        Ok(profile)
    }
}
