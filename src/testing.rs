//! Scripted in-process [`Gateway`] for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::ApiError;
use crate::gateway::{Gateway, GatewayResult};
use crate::models::{
    Barber, Booking, BookingRequest, BookingServiceLine, BookingStatus, BookingSummary, Client,
    ClientProfile, NewClient, ProfileUpdate, Service,
};

pub fn barber(id: i64, name: &str, active: bool) -> Barber {
    Barber {
        id,
        user_id: id * 10,
        name: name.to_string(),
        email: format!("{}@barber2go.app", name.to_lowercase()),
        phone: "600000000".to_string(),
        active,
    }
}

pub fn service(id: i64, minutes: u32, price: i64) -> Service {
    Service {
        id,
        name: format!("Service {id}"),
        description: String::new(),
        duration_minutes: minutes,
        price: Decimal::new(price, 0),
    }
}

pub fn booking(id: i64, date: &str, status: BookingStatus) -> Booking {
    Booking {
        id,
        client_name: "Ana".to_string(),
        barber_name: "Luis".to_string(),
        date: date.to_string(),
        status,
        start_time: "10:00:00".to_string(),
        end_time: None,
        created_at: None,
        services: vec![BookingServiceLine {
            service_id: 1,
            name: "Service 1".to_string(),
            minutes: 30,
            price: Decimal::new(25, 0),
        }],
    }
}

pub fn profile(id: i64) -> ClientProfile {
    ClientProfile {
        id,
        name: "Ana Torres".to_string(),
        gender: "F".to_string(),
        email: "ana@example.com".to_string(),
        phone: "611111111".to_string(),
        document_id: "12345678".to_string(),
    }
}

#[derive(Default)]
pub struct ScriptedGateway {
    barbers: Vec<Barber>,
    barbers_error: Option<ApiError>,
    services: Vec<Service>,
    create_error: Option<ApiError>,
    update_error: Option<ApiError>,
    cancel_error: Option<ApiError>,
    login_error: Option<ApiError>,
    profile_error: Option<ApiError>,
    profile: Option<ClientProfile>,
    bookings: Mutex<HashMap<i64, Booking>>,
    detail_failures: Mutex<Vec<i64>>,
    created: Mutex<Vec<BookingRequest>>,
    updated: Mutex<Vec<(i64, BookingRequest)>>,
    cancelled: Mutex<Vec<i64>>,
    profile_updates: Mutex<Vec<(i64, ProfileUpdate)>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    pub fn with_barbers(mut self, barbers: Vec<Barber>) -> Self {
        self.barbers = barbers;
        self
    }

    pub fn with_services(mut self, services: Vec<Service>) -> Self {
        self.services = services;
        self
    }

    pub fn with_bookings(self, bookings: Vec<Booking>) -> Self {
        {
            let mut stored = lock(&self.bookings);
            for booking in bookings {
                stored.insert(booking.id, booking);
            }
        }
        self
    }

    pub fn with_profile(mut self, profile: ClientProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    /// `get_booking_by_id` fails for this id while the summary stays listed.
    pub fn fail_detail(mut self, id: i64) -> Self {
        lock(&self.detail_failures).push(id);
        self
    }

    /// Lets `get_booking_by_id` succeed again for `id`.
    pub fn restore_detail(&self, id: i64) {
        lock(&self.detail_failures).retain(|failing| *failing != id);
    }

    pub fn fail_barbers(mut self, err: ApiError) -> Self {
        self.barbers_error = Some(err);
        self
    }

    pub fn fail_create(mut self, err: ApiError) -> Self {
        self.create_error = Some(err);
        self
    }

    pub fn fail_update(mut self, err: ApiError) -> Self {
        self.update_error = Some(err);
        self
    }

    pub fn fail_cancel(mut self, err: ApiError) -> Self {
        self.cancel_error = Some(err);
        self
    }

    pub fn fail_login(mut self, err: ApiError) -> Self {
        self.login_error = Some(err);
        self
    }

    pub fn fail_profile(mut self, err: ApiError) -> Self {
        self.profile_error = Some(err);
        self
    }

    pub fn created(&self) -> Vec<BookingRequest> {
        lock(&self.created).clone()
    }

    pub fn updated(&self) -> Vec<(i64, BookingRequest)> {
        lock(&self.updated).clone()
    }

    pub fn cancelled(&self) -> Vec<i64> {
        lock(&self.cancelled).clone()
    }

    pub fn profile_updates(&self) -> Vec<(i64, ProfileUpdate)> {
        lock(&self.profile_updates).clone()
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    fn record(&self, call: impl Into<String>) {
        lock(&self.calls).push(call.into());
    }

    fn failure(err: &Option<ApiError>) -> GatewayResult<()> {
        match err {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn create_client_account(&self, client: &NewClient) -> GatewayResult<Client> {
        self.record("create_client_account");
        Ok(Client {
            id: 12,
            user_id: 120,
            name: client.name.clone(),
            email: client.email.clone(),
            created_at: "2025-06-01T10:00:00".to_string(),
        })
    }

    async fn login_by_email(&self, email: &str) -> GatewayResult<ClientProfile> {
        self.record(format!("login_by_email {email}"));
        Self::failure(&self.login_error)?;
        self.profile
            .clone()
            .ok_or_else(|| ApiError::NotFound("No client found with that email.".to_string()))
    }

    async fn get_client_profile(&self, client_id: i64) -> GatewayResult<ClientProfile> {
        self.record(format!("get_client_profile {client_id}"));
        Self::failure(&self.profile_error)?;
        self.profile
            .clone()
            .ok_or_else(|| ApiError::NotFound("Client not found.".to_string()))
    }

    async fn update_client_profile(
        &self,
        client_id: i64,
        update: &ProfileUpdate,
    ) -> GatewayResult<ClientProfile> {
        self.record(format!("update_client_profile {client_id}"));
        Self::failure(&self.profile_error)?;
        lock(&self.profile_updates).push((client_id, update.clone()));
        Ok(ClientProfile {
            id: client_id,
            name: update.name.clone(),
            gender: update.gender.clone(),
            email: update.email.clone(),
            phone: update.phone.clone(),
            document_id: update.document_id.clone(),
        })
    }

    async fn get_active_barbers(&self) -> GatewayResult<Vec<Barber>> {
        self.record("get_active_barbers");
        match &self.barbers_error {
            Some(err) => Err(err.clone()),
            None => Ok(self.barbers.clone()),
        }
    }

    async fn get_barber_by_id(&self, id: i64) -> GatewayResult<Barber> {
        self.barbers
            .iter()
            .find(|barber| barber.id == id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound("Barber not found.".to_string()))
    }

    async fn get_all_services(&self) -> GatewayResult<Vec<Service>> {
        self.record("get_all_services");
        Ok(self.services.clone())
    }

    async fn create_booking(&self, request: &BookingRequest) -> GatewayResult<Booking> {
        self.record("create_booking");
        Self::failure(&self.create_error)?;
        lock(&self.created).push(request.clone());

        let barber_name = self
            .barbers
            .iter()
            .find(|barber| barber.id == request.barber_id)
            .map(|barber| barber.name.clone())
            .unwrap_or_default();
        let mut bookings = lock(&self.bookings);
        let booking = Booking {
            id: 41 + bookings.len() as i64,
            client_name: "Ana".to_string(),
            barber_name,
            date: request.date.clone(),
            status: BookingStatus::Pending,
            start_time: request.start_time.clone(),
            end_time: None,
            created_at: None,
            services: Vec::new(),
        };
        bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn get_all_bookings(&self) -> GatewayResult<Vec<Booking>> {
        Ok(lock(&self.bookings).values().cloned().collect())
    }

    async fn get_client_bookings(&self, client_id: i64) -> GatewayResult<Vec<BookingSummary>> {
        self.record(format!("get_client_bookings {client_id}"));
        let mut summaries: Vec<BookingSummary> = lock(&self.bookings)
            .values()
            .map(|booking| BookingSummary {
                booking_id: booking.id,
                date: booking.date.clone(),
                start_time: booking.start_time.clone(),
                total_minutes: Some(booking.services.iter().map(|line| line.minutes).sum()),
                status: booking.status,
                barber_name: booking.barber_name.clone(),
            })
            .collect();
        summaries.sort_by_key(|summary| summary.booking_id);
        Ok(summaries)
    }

    async fn get_booking_by_id(&self, id: i64) -> GatewayResult<Booking> {
        self.record(format!("get_booking_by_id {id}"));
        if lock(&self.detail_failures).contains(&id) {
            return Err(ApiError::Unknown("Server error (500)".to_string()));
        }
        lock(&self.bookings)
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound("Booking not found.".to_string()))
    }

    async fn cancel_booking(&self, id: i64) -> GatewayResult<Booking> {
        self.record(format!("cancel_booking {id}"));
        Self::failure(&self.cancel_error)?;
        lock(&self.cancelled).push(id);
        let mut bookings = lock(&self.bookings);
        let booking = bookings
            .get_mut(&id)
            .ok_or_else(|| ApiError::NotFound("Booking not found.".to_string()))?;
        booking.status = BookingStatus::Cancelled;
        Ok(booking.clone())
    }

    async fn complete_booking(&self, id: i64) -> GatewayResult<Booking> {
        let mut bookings = lock(&self.bookings);
        let booking = bookings
            .get_mut(&id)
            .ok_or_else(|| ApiError::NotFound("Booking not found.".to_string()))?;
        booking.status = BookingStatus::Completed;
        Ok(booking.clone())
    }

    async fn update_booking(&self, id: i64, request: &BookingRequest) -> GatewayResult<()> {
        self.record(format!("update_booking {id}"));
        Self::failure(&self.update_error)?;
        lock(&self.updated).push((id, request.clone()));
        if let Some(booking) = lock(&self.bookings).get_mut(&id) {
            booking.date = request.date.clone();
            booking.start_time = request.start_time.clone();
        }
        Ok(())
    }
}
