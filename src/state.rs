use std::sync::Arc;

use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use crate::account::AccountService;
use crate::appointments::AppointmentBook;
use crate::auth::AuthGuard;
use crate::config::Config;
use crate::db;
use crate::error::{ApiError, StoreError};
use crate::gateway::{Gateway, RestGateway};
use crate::models::Booking;
use crate::push::{LogNotifier, Notifier, WebPushNotifier};
use crate::reminder::{ReminderScheduler, ReminderWorker};
use crate::session::SessionStore;
use crate::tasks::SqliteTaskQueue;
use crate::workflow::BookingFlow;

pub const EVENT_BOOKING_CREATED: &str = "booking_created";
pub const EVENT_BOOKING_UPDATED: &str = "booking_updated";
pub const EVENT_BOOKING_CANCELLED: &str = "booking_cancelled";
pub const EVENT_SESSION_CLEARED: &str = "session_cleared";

#[derive(Clone, Debug, Default)]
pub struct PushConfig {
    pub public_key: String,
    pub private_key: String,
    pub subject: String,
}

impl PushConfig {
    pub fn enabled(&self) -> bool {
        !(self.public_key.trim().is_empty() || self.private_key.trim().is_empty())
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ClientEvent {
    pub kind: String,
    pub booking_id: Option<i64>,
    pub status: Option<String>,
    pub barber_name: Option<String>,
    pub date: Option<String>,
    pub start_time: Option<String>,
}

impl ClientEvent {
    pub fn from_booking(kind: &str, booking: &Booking) -> Self {
        Self {
            kind: kind.to_string(),
            booking_id: Some(booking.id),
            status: Some(booking.status.to_string()),
            barber_name: Some(booking.barber_name.clone()).filter(|name| !name.is_empty()),
            date: Some(booking.date.clone()),
            start_time: Some(booking.start_time.clone()),
        }
    }

    /// Event for a booking known only by id.
    pub fn for_booking(kind: &str, booking_id: i64) -> Self {
        Self {
            kind: kind.to_string(),
            booking_id: Some(booking_id),
            status: None,
            barber_name: None,
            date: None,
            start_time: None,
        }
    }

    pub fn session_cleared() -> Self {
        Self {
            kind: EVENT_SESSION_CLEARED.to_string(),
            booking_id: None,
            status: None,
            barber_name: None,
            date: None,
            start_time: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Everything the client needs, wired once at startup.
#[derive(Clone)]
pub struct ClientContext {
    pub config: Config,
    pub db: SqlitePool,
    pub session: SessionStore,
    pub guard: Arc<AuthGuard>,
    pub gateway: Arc<dyn Gateway>,
    pub reminders: Arc<ReminderScheduler>,
    pub events: broadcast::Sender<ClientEvent>,
}

impl ClientContext {
    pub async fn connect(config: Config) -> Result<Self, ContextError> {
        let db = db::open(&config.database_url).await?;
        let session = SessionStore::sqlite(db.clone());
        let (events, _) = broadcast::channel(100);

        let guard = Arc::new(AuthGuard::new(session.clone()).with_events(events.clone()));
        let gateway = RestGateway::new(&config.api_url, config.http_timeout, guard.clone())?;
        let queue = Arc::new(SqliteTaskQueue::new(db.clone()));
        let reminders = Arc::new(ReminderScheduler::new(queue, config.reminder_lead));

        Ok(Self {
            config,
            db,
            session,
            guard,
            gateway: Arc::new(gateway),
            reminders,
            events,
        })
    }

    pub fn booking_flow(&self) -> BookingFlow {
        BookingFlow::new(self.gateway.clone(), self.session.clone())
            .with_reminders(self.reminders.clone())
            .with_events(self.events.clone())
    }

    pub fn appointments(&self) -> AppointmentBook {
        AppointmentBook::new(self.gateway.clone(), self.session.clone())
            .with_reminders(self.reminders.clone())
            .with_events(self.events.clone())
    }

    pub fn account(&self) -> AccountService {
        AccountService::new(self.gateway.clone(), self.session.clone(), self.guard.clone())
            .with_events(self.events.clone())
    }

    pub fn notifier(&self) -> Arc<dyn Notifier> {
        if self.config.push.enabled() {
            Arc::new(WebPushNotifier::new(self.db.clone(), self.config.push.clone()))
        } else {
            log::warn!("VAPID keys not configured, reminders will only be logged");
            Arc::new(LogNotifier)
        }
    }

    pub fn reminder_worker(&self) -> ReminderWorker {
        ReminderWorker::new(
            self.reminders.queue().clone(),
            self.notifier(),
            self.config.reminder_poll,
        )
    }

    /// Live feed of client events. Subscribers that fall behind skip the
    /// events they missed.
    pub fn event_stream(&self) -> impl Stream<Item = ClientEvent> + Send + 'static {
        event_stream(&self.events)
    }
}

pub fn event_stream(
    events: &broadcast::Sender<ClientEvent>,
) -> impl Stream<Item = ClientEvent> + Send + 'static {
    BroadcastStream::new(events.subscribe()).filter_map(|result| match result {
        Ok(event) => Some(event),
        Err(err) => {
            log::debug!("Event subscriber lagged: {err}");
            None
        }
    })
}
