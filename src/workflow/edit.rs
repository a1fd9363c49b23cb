use std::collections::BTreeSet;

use rust_decimal::Decimal;

use super::machine::{MSG_BARBER_UNAVAILABLE, MSG_SELECT_BARBER, MSG_SELECT_DATETIME, MSG_SELECT_SERVICE};
use crate::error::ApiError;
use crate::models::{normalize_time, Barber, Booking, BookingRequest, Service};

pub const MSG_NOT_EDITABLE: &str = "Only pending or confirmed bookings can be edited.";

/// Local copy of an existing booking being edited. Saving resends every
/// field; the backend has no partial update.
#[derive(Debug, Clone, PartialEq)]
pub struct EditDraft {
    booking_id: i64,
    barbers: Vec<Barber>,
    services: Vec<Service>,
    pub barber: Option<Barber>,
    pub service_ids: BTreeSet<i64>,
    pub date: String,
    pub time: String,
    pub error: Option<String>,
}

impl EditDraft {
    pub fn from_booking(
        booking: &Booking,
        barbers: &[Barber],
        services: &[Service],
    ) -> Result<Self, ApiError> {
        if !booking.status.is_actionable() {
            return Err(ApiError::Conflict(MSG_NOT_EDITABLE.to_string()));
        }

        let barbers: Vec<Barber> = barbers.iter().filter(|barber| barber.active).cloned().collect();
        // Bookings only carry the barber's name.
        let barber = barbers
            .iter()
            .find(|barber| barber.name == booking.barber_name)
            .cloned();

        Ok(Self {
            booking_id: booking.id,
            barbers,
            services: services.to_vec(),
            barber,
            service_ids: booking.service_ids().into_iter().collect(),
            date: booking.date.clone(),
            time: short_time(&booking.start_time),
            error: None,
        })
    }

    pub fn booking_id(&self) -> i64 {
        self.booking_id
    }

    pub fn barbers(&self) -> &[Barber] {
        &self.barbers
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    pub fn select_barber(&mut self, barber_id: i64) {
        match self.barbers.iter().find(|barber| barber.id == barber_id) {
            Some(barber) => {
                self.barber = Some(barber.clone());
                self.error = None;
            }
            None => self.error = Some(MSG_BARBER_UNAVAILABLE.to_string()),
        }
    }

    pub fn toggle_service(&mut self, service_id: i64) {
        if !self.service_ids.remove(&service_id) {
            self.service_ids.insert(service_id);
        }
        self.error = None;
    }

    pub fn set_date(&mut self, date: impl Into<String>) {
        self.date = date.into();
        self.error = None;
    }

    pub fn set_time(&mut self, time: impl Into<String>) {
        self.time = time.into();
        self.error = None;
    }

    pub fn total_price(&self) -> Decimal {
        self.services
            .iter()
            .filter(|service| self.service_ids.contains(&service.id))
            .map(|service| service.price)
            .sum()
    }

    /// The complete update payload. Validation failures never reach the
    /// network.
    pub fn request(&self, client_id: i64) -> Result<BookingRequest, ApiError> {
        let barber = self
            .barber
            .as_ref()
            .ok_or_else(|| ApiError::validation(MSG_SELECT_BARBER))?;
        if self.service_ids.is_empty() {
            return Err(ApiError::validation(MSG_SELECT_SERVICE));
        }
        if self.date.trim().is_empty() || self.time.trim().is_empty() {
            return Err(ApiError::validation(MSG_SELECT_DATETIME));
        }

        Ok(BookingRequest {
            client_id,
            barber_id: barber.id,
            date: self.date.trim().to_string(),
            start_time: normalize_time(self.time.trim()),
            service_ids: self.service_ids.iter().copied().collect(),
        })
    }
}

/// Trims `HH:MM:SS` to the `HH:MM` the time picker shows.
fn short_time(time: &str) -> String {
    match time.get(..5) {
        Some(short) if time.len() > 5 && time.as_bytes()[5] == b':' => short.to_string(),
        _ => time.to_string(),
    }
}
