//! The client's booking list: load, cancel (two-phase) and edit.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;

use crate::error::ApiError;
use crate::gateway::Gateway;
use crate::models::{Barber, Booking, BookingStatus, Service};
use crate::reminder::ReminderScheduler;
use crate::session::SessionStore;
use crate::state::{ClientEvent, EVENT_BOOKING_CANCELLED, EVENT_BOOKING_UPDATED};
use crate::workflow::{EditDraft, MSG_NO_SESSION};

pub const MSG_CANNOT_CANCEL: &str = "Cannot cancel this booking.";
pub const MSG_BOOKING_NOT_FOUND: &str = "Booking not found.";
pub const MSG_NOTHING_TO_CANCEL: &str = "No booking selected for cancellation.";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentsState {
    pub bookings: Vec<Booking>,
    pub loading: bool,
    pub error: Option<String>,
    /// Booking awaiting the user's cancel confirmation.
    pub pending_cancel: Option<i64>,
}

pub struct AppointmentBook {
    gateway: Arc<dyn Gateway>,
    session: SessionStore,
    reminders: Option<Arc<ReminderScheduler>>,
    events: Option<broadcast::Sender<ClientEvent>>,
    state: Mutex<AppointmentsState>,
}

impl AppointmentBook {
    pub fn new(gateway: Arc<dyn Gateway>, session: SessionStore) -> Self {
        Self {
            gateway,
            session,
            reminders: None,
            events: None,
            state: Mutex::new(AppointmentsState::default()),
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

    pub fn snapshot(&self) -> AppointmentsState {
        self.state().clone()
    }

    /// Active bookings for the home screen.
    pub fn upcoming(&self) -> Vec<Booking> {
        self.state()
            .bookings
            .iter()
            .filter(|booking| booking.status.is_actionable())
            .cloned()
            .collect()
    }

    pub async fn load(&self) -> Result<Vec<Booking>, ApiError> {
        self.state().loading = true;
        let result = self.fetch().await;

        let mut state = self.state();
        state.loading = false;
        match &result {
            Ok(bookings) => {
                state.bookings = bookings.clone();
                state.error = None;
            }
            Err(err) => state.error = Some(err.to_string()),
        }
        result
    }

    async fn fetch(&self) -> Result<Vec<Booking>, ApiError> {
        let client_id = self.client_id().await?;
        let summaries = self.gateway.get_client_bookings(client_id).await?;

        let mut bookings = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let booking = match self.gateway.get_booking_by_id(summary.booking_id).await {
                Ok(booking) => booking,
                Err(err) => {
                    log::warn!("Booking {} details unavailable: {err}", summary.booking_id);
                    Booking::from(summary)
                }
            };
            if booking.status != BookingStatus::Cancelled {
                bookings.push(booking);
            }
        }

        bookings.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then_with(|| b.start_time.cmp(&a.start_time))
        });
        Ok(bookings)
    }

    /// First phase of a cancellation. Terminal bookings are refused here,
    /// before any confirmation is asked for.
    pub fn request_cancel(&self, booking_id: i64) -> Result<(), ApiError> {
        let mut state = self.state();
        let status = state
            .bookings
            .iter()
            .find(|booking| booking.id == booking_id)
            .map(|booking| booking.status);

        let outcome = match status {
            Some(status) if status.is_actionable() => Ok(()),
            Some(_) => Err(ApiError::Conflict(MSG_CANNOT_CANCEL.to_string())),
            None => Err(ApiError::NotFound(MSG_BOOKING_NOT_FOUND.to_string())),
        };
        match &outcome {
            Ok(()) => state.pending_cancel = Some(booking_id),
            Err(err) => state.error = Some(err.to_string()),
        }
        outcome
    }

    pub fn dismiss_cancel(&self) {
        self.state().pending_cancel = None;
    }

    pub async fn confirm_cancel(&self) -> Result<Booking, ApiError> {
        let Some(booking_id) = self.state().pending_cancel.take() else {
            return Err(ApiError::validation(MSG_NOTHING_TO_CANCEL));
        };

        let booking = match self.gateway.cancel_booking(booking_id).await {
            Ok(booking) => booking,
            Err(err) => {
                self.state().error = Some(err.to_string());
                return Err(err);
            }
        };
        log::info!("Booking {booking_id} cancelled");

        if let Some(reminders) = &self.reminders {
            reminders.cancel(booking_id).await;
        }
        self.publish(ClientEvent::from_booking(EVENT_BOOKING_CANCELLED, &booking));
        let _ = self.load().await;
        Ok(booking)
    }

    pub async fn begin_edit(
        &self,
        booking_id: i64,
        barbers: &[Barber],
        services: &[Service],
    ) -> Result<EditDraft, ApiError> {
        let cached = self
            .state()
            .bookings
            .iter()
            .find(|booking| booking.id == booking_id)
            .cloned();
        let booking = match cached {
            Some(booking) if !booking.services.is_empty() => booking,
            // Loaded from the summary fallback, which carries no services.
            Some(summary) => match self.gateway.get_booking_by_id(booking_id).await {
                Ok(detail) => detail,
                Err(err) => {
                    log::warn!("Booking {booking_id} details still unavailable: {err}");
                    summary
                }
            },
            None => self.gateway.get_booking_by_id(booking_id).await?,
        };

        EditDraft::from_booking(&booking, barbers, services).map_err(|err| {
            self.state().error = Some(err.to_string());
            err
        })
    }

    /// Sends the complete field set. Failures land on the draft so the edit
    /// screen can show them and the user can retry.
    pub async fn save_edit(&self, draft: &mut EditDraft) -> Result<(), ApiError> {
        let result = self.submit_edit(draft).await;
        if let Err(err) = &result {
            draft.error = Some(err.to_string());
        }
        result
    }

    async fn submit_edit(&self, draft: &EditDraft) -> Result<(), ApiError> {
        let client_id = self.client_id().await?;
        let request = draft.request(client_id)?;
        let booking_id = draft.booking_id();

        self.gateway.update_booking(booking_id, &request).await?;
        log::info!("Booking {booking_id} updated to {} {}", request.date, request.start_time);

        if let Some(reminders) = &self.reminders {
            let barber_name = draft
                .barber
                .as_ref()
                .map(|barber| barber.name.as_str())
                .unwrap_or_default();
            reminders
                .reschedule(booking_id, barber_name, &request.date, &request.start_time)
                .await;
        }

        let _ = self.load().await;
        let updated = self
            .state()
            .bookings
            .iter()
            .find(|booking| booking.id == booking_id)
            .map(|booking| ClientEvent::from_booking(EVENT_BOOKING_UPDATED, booking));
        self.publish(updated.unwrap_or_else(|| ClientEvent::for_booking(EVENT_BOOKING_UPDATED, booking_id)));
        Ok(())
    }

    pub fn dismiss_error(&self) {
        self.state().error = None;
    }

    async fn client_id(&self) -> Result<i64, ApiError> {
        self.session
            .load()
            .await?
            .active_client_id()
            .ok_or_else(|| ApiError::validation(MSG_NO_SESSION))
    }

    fn publish(&self, event: ClientEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    fn state(&self) -> MutexGuard<'_, AppointmentsState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
