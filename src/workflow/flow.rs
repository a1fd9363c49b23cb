use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;

use super::machine::{BookingMachine, Submission, WizardAction, WizardCommand, WizardEvent, WizardSnapshot};
use crate::error::ApiError;
use crate::gateway::Gateway;
use crate::models::{Booking, BookingRequest};
use crate::reminder::ReminderScheduler;
use crate::session::SessionStore;
use crate::state::{ClientEvent, EVENT_BOOKING_CREATED};

pub const MSG_NO_SESSION: &str = "No active session found. Please log in again.";

/// Drives a [`BookingMachine`] against the backend: every command the
/// machine emits is executed here and its result fed back.
pub struct BookingFlow {
    gateway: Arc<dyn Gateway>,
    session: SessionStore,
    reminders: Option<Arc<ReminderScheduler>>,
    events: Option<broadcast::Sender<ClientEvent>>,
    machine: Mutex<BookingMachine>,
}

impl BookingFlow {
    pub fn new(gateway: Arc<dyn Gateway>, session: SessionStore) -> Self {
        Self {
            gateway,
            session,
            reminders: None,
            events: None,
            machine: Mutex::new(BookingMachine::new()),
        }
    }

    pub fn with_reminders(mut self, reminders: Arc<ReminderScheduler>) -> Self {
        self.reminders = Some(reminders);
        self
    }

    pub fn with_events(mut self, events: broadcast::Sender<ClientEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn snapshot(&self) -> WizardSnapshot {
        self.machine().snapshot()
    }

    /// Loads the barber catalog.
    pub async fn start(&self) -> WizardSnapshot {
        let command = self.machine().start();
        self.run(Some(command)).await
    }

    pub async fn dispatch(&self, action: WizardAction) -> WizardSnapshot {
        let command = self.machine().handle(action);
        self.run(command).await
    }

    async fn run(&self, command: Option<WizardCommand>) -> WizardSnapshot {
        if let Some(command) = command {
            let event = self.execute(command).await;
            self.machine().apply(event);
        }
        self.snapshot()
    }

    async fn execute(&self, command: WizardCommand) -> WizardEvent {
        match command {
            WizardCommand::LoadBarbers { ticket } => WizardEvent::BarbersLoaded {
                ticket,
                result: self.gateway.get_active_barbers().await,
            },
            WizardCommand::LoadServices { ticket } => WizardEvent::ServicesLoaded {
                ticket,
                result: self.gateway.get_all_services().await,
            },
            WizardCommand::Submit { ticket, submission } => WizardEvent::Submitted {
                ticket,
                result: self.submit(submission).await,
            },
        }
    }

    async fn submit(&self, submission: Submission) -> Result<Booking, ApiError> {
        let client_id = self
            .session
            .load()
            .await?
            .active_client_id()
            .ok_or_else(|| ApiError::validation(MSG_NO_SESSION))?;

        let request = BookingRequest {
            client_id,
            barber_id: submission.barber_id,
            date: submission.date.clone(),
            start_time: submission.start_time.clone(),
            service_ids: submission.service_ids,
        };
        let booking = self.gateway.create_booking(&request).await?;
        log::info!("Booking {} created for client {client_id}", booking.id);

        if let Some(reminders) = &self.reminders {
            let barber_name = if booking.barber_name.is_empty() {
                submission.barber_name.as_str()
            } else {
                booking.barber_name.as_str()
            };
            reminders
                .schedule(booking.id, barber_name, &submission.date, &submission.start_time)
                .await;
        }
        if let Some(events) = &self.events {
            let _ = events.send(ClientEvent::from_booking(EVENT_BOOKING_CREATED, &booking));
        }
        Ok(booking)
    }

    fn machine(&self) -> MutexGuard<'_, BookingMachine> {
        self.machine
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
