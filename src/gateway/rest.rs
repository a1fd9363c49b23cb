//! REST implementation of [`Gateway`] on top of [`reqwest`].
//!
//! Every call goes through [`RestGateway::execute`], which lets the
//! [`AuthGuard`] decorate the request and answer a 401.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::dto::{
    BarberResponse, BookingResponse, ClientBookingSummaryResponse, ClientProfileResponse,
    ClientResponse, CreateBookingBody, CreateClientBody, ErrorBody, ServiceResponse,
    UpdateProfileBody,
};
use super::{Gateway, GatewayResult};
use crate::auth::{carries_credentials, AuthGuard};
use crate::error::{self, ApiError, ErrorMessages};
use crate::models::{
    Barber, Booking, BookingRequest, BookingSummary, Client, ClientProfile, NewClient,
    ProfileUpdate, Service,
};

const PROFILE: ErrorMessages = ErrorMessages::generic("Could not load the profile.");
const BARBERS: ErrorMessages = ErrorMessages::generic("Could not load the barbers.");
const BARBER: ErrorMessages = ErrorMessages::generic("Could not load the barber.");
const SERVICES: ErrorMessages = ErrorMessages::generic("Could not load the services.");
const BOOKINGS: ErrorMessages = ErrorMessages::generic("Could not load the bookings.");
const BOOKING: ErrorMessages = ErrorMessages {
    not_found: Some("Booking not found."),
    ..ErrorMessages::generic("Could not load the booking.")
};

pub struct RestGateway {
    client: reqwest::Client,
    base_url: String,
    guard: Arc<AuthGuard>,
}

impl RestGateway {
    pub fn new(base_url: &str, timeout: Duration, guard: Arc<AuthGuard>) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ApiError::Unknown(format!("Failed to build HTTP client: {err}")))?;
        Ok(Self::with_client(client, base_url, guard))
    }

    /// Reuses an existing [`reqwest::Client`] (connection pooling, custom TLS).
    pub fn with_client(client: reqwest::Client, base_url: &str, guard: Arc<AuthGuard>) -> Self {
        Self {
            client,
            base_url: crate::config::with_trailing_slash(base_url.to_string()),
            guard,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, format!("{}{}", self.base_url, path))
    }

    async fn execute(&self, builder: RequestBuilder, table: &ErrorMessages) -> GatewayResult<Response> {
        let request = self
            .guard
            .authorize(builder)
            .build()
            .map_err(|err| ApiError::Unknown(err.to_string()))?;
        let had_credentials = carries_credentials(request.headers());
        let method = request.method().clone();
        let url = request.url().path().to_string();

        let response = self.client.execute(request).await.map_err(|err| {
            log::warn!("{method} {url} failed: {err}");
            ApiError::from_transport(&err, table.fallback)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            self.guard.challenge(had_credentials).await;
        }

        let backend = response
            .text()
            .await
            .ok()
            .and_then(|body| serde_json::from_str::<ErrorBody>(&body).ok())
            .and_then(|body| body.message);
        log::warn!("{method} {url} returned {status}");
        Err(ApiError::from_status(status, backend, table))
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        table: &ErrorMessages,
    ) -> GatewayResult<T> {
        let response = self.execute(builder, table).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| ApiError::from_transport(&err, table.fallback))
    }
}

#[async_trait]
impl Gateway for RestGateway {
    async fn create_client_account(&self, client: &NewClient) -> GatewayResult<Client> {
        let builder = self
            .request(Method::POST, "clients/user")
            .json(&CreateClientBody::from(client));
        let dto: ClientResponse = self.fetch(builder, &error::REGISTER).await?;
        Ok(dto.into())
    }

    async fn login_by_email(&self, email: &str) -> GatewayResult<ClientProfile> {
        let builder = self
            .request(Method::GET, "clients/login")
            .query(&[("email", email)]);
        let dto: ClientProfileResponse = self.fetch(builder, &error::LOGIN).await?;
        Ok(dto.into())
    }

    async fn get_client_profile(&self, client_id: i64) -> GatewayResult<ClientProfile> {
        let builder = self.request(Method::GET, &format!("clients/{client_id}/profile"));
        let dto: ClientProfileResponse = self.fetch(builder, &PROFILE).await?;
        Ok(dto.into())
    }

    async fn update_client_profile(
        &self,
        client_id: i64,
        update: &ProfileUpdate,
    ) -> GatewayResult<ClientProfile> {
        let builder = self
            .request(Method::PUT, &format!("clients/{client_id}/profile"))
            .json(&UpdateProfileBody::from(update));
        let dto: ClientProfileResponse = self.fetch(builder, &error::UPDATE_PROFILE).await?;
        Ok(dto.into())
    }

    async fn get_active_barbers(&self) -> GatewayResult<Vec<Barber>> {
        let dtos: Vec<BarberResponse> = self
            .fetch(self.request(Method::GET, "barbers/active"), &BARBERS)
            .await?;
        Ok(dtos.into_iter().map(Barber::from).collect())
    }

    async fn get_barber_by_id(&self, id: i64) -> GatewayResult<Barber> {
        let dto: BarberResponse = self
            .fetch(self.request(Method::GET, &format!("barbers/{id}")), &BARBER)
            .await?;
        Ok(dto.into())
    }

    async fn get_all_services(&self) -> GatewayResult<Vec<Service>> {
        let dtos: Vec<ServiceResponse> = self
            .fetch(self.request(Method::GET, "services"), &SERVICES)
            .await?;
        Ok(dtos.into_iter().map(Service::from).collect())
    }

    async fn create_booking(&self, request: &BookingRequest) -> GatewayResult<Booking> {
        let builder = self
            .request(Method::POST, "bookings")
            .json(&CreateBookingBody::from(request));
        let dto: BookingResponse = self.fetch(builder, &error::CREATE_BOOKING).await?;
        Ok(dto.into())
    }

    async fn get_all_bookings(&self) -> GatewayResult<Vec<Booking>> {
        let dtos: Vec<BookingResponse> = self
            .fetch(self.request(Method::GET, "bookings"), &BOOKINGS)
            .await?;
        Ok(dtos.into_iter().map(Booking::from).collect())
    }

    async fn get_client_bookings(&self, client_id: i64) -> GatewayResult<Vec<BookingSummary>> {
        let builder = self.request(Method::GET, &format!("clients/{client_id}/bookings"));
        let dtos: Vec<ClientBookingSummaryResponse> = self.fetch(builder, &BOOKINGS).await?;
        Ok(dtos.into_iter().map(BookingSummary::from).collect())
    }

    async fn get_booking_by_id(&self, id: i64) -> GatewayResult<Booking> {
        let dto: BookingResponse = self
            .fetch(self.request(Method::GET, &format!("bookings/{id}")), &BOOKING)
            .await?;
        Ok(dto.into())
    }

    async fn cancel_booking(&self, id: i64) -> GatewayResult<Booking> {
        let builder = self.request(Method::PUT, &format!("bookings/{id}/cancel"));
        let dto: BookingResponse = self.fetch(builder, &error::CANCEL_BOOKING).await?;
        Ok(dto.into())
    }

    async fn complete_booking(&self, id: i64) -> GatewayResult<Booking> {
        let builder = self.request(Method::PUT, &format!("bookings/{id}/complete"));
        let dto: BookingResponse = self.fetch(builder, &error::COMPLETE_BOOKING).await?;
        Ok(dto.into())
    }

    async fn update_booking(&self, id: i64, request: &BookingRequest) -> GatewayResult<()> {
        let builder = self
            .request(Method::PUT, &format!("bookings/{id}"))
            .json(&CreateBookingBody::from(request));
        self.execute(builder, &error::UPDATE_BOOKING).await?;
        Ok(())
    }
}
