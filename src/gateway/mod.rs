//! Typed request/response contracts of the booking backend.

mod dto;
mod rest;

use async_trait::async_trait;

use crate::error::ApiError;
use crate::models::{
    Barber, Booking, BookingRequest, BookingSummary, Client, ClientProfile, NewClient,
    ProfileUpdate, Service,
};

pub use rest::RestGateway;

pub type GatewayResult<T> = Result<T, ApiError>;

#[async_trait]
pub trait Gateway: Send + Sync {
    async fn create_client_account(&self, client: &NewClient) -> GatewayResult<Client>;
    /// Lookup-only login: there is no password.
    async fn login_by_email(&self, email: &str) -> GatewayResult<ClientProfile>;
    async fn get_client_profile(&self, client_id: i64) -> GatewayResult<ClientProfile>;
    async fn update_client_profile(
        &self,
        client_id: i64,
        update: &ProfileUpdate,
    ) -> GatewayResult<ClientProfile>;

    async fn get_active_barbers(&self) -> GatewayResult<Vec<Barber>>;
    async fn get_barber_by_id(&self, id: i64) -> GatewayResult<Barber>;

    async fn get_all_services(&self) -> GatewayResult<Vec<Service>>;

    async fn create_booking(&self, request: &BookingRequest) -> GatewayResult<Booking>;
    async fn get_all_bookings(&self) -> GatewayResult<Vec<Booking>>;
    async fn get_client_bookings(&self, client_id: i64) -> GatewayResult<Vec<BookingSummary>>;
    async fn get_booking_by_id(&self, id: i64) -> GatewayResult<Booking>;
    async fn cancel_booking(&self, id: i64) -> GatewayResult<Booking>;
    async fn complete_booking(&self, id: i64) -> GatewayResult<Booking>;
    /// Full replacement: every field of `request` is resent.
    async fn update_booking(&self, id: i64, request: &BookingRequest) -> GatewayResult<()>;
}
