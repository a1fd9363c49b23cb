use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{
    Barber, Booking, BookingRequest, BookingServiceLine, BookingStatus, BookingSummary, Client,
    ClientProfile, NewClient, ProfileUpdate, Service,
};

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarberResponse {
    pub codigo_barbero: i64,
    pub user_id: Option<i64>,
    pub nombres: String,
    pub email: Option<String>,
    pub telefono: Option<String>,
    #[serde(default)]
    pub active: bool,
}

impl From<BarberResponse> for Barber {
    fn from(dto: BarberResponse) -> Self {
        Barber {
            id: dto.codigo_barbero,
            user_id: dto.user_id.unwrap_or(-1),
            name: dto.nombres,
            email: dto.email.unwrap_or_default(),
            phone: dto.telefono.unwrap_or_default(),
            active: dto.active,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub estimated_minutes: u32,
    pub price: Decimal,
}

impl From<ServiceResponse> for Service {
    fn from(dto: ServiceResponse) -> Self {
        Service {
            id: dto.id,
            name: dto.name,
            description: dto.description.unwrap_or_default(),
            duration_minutes: dto.estimated_minutes,
            price: dto.price,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingServiceResponse {
    pub service_id: i64,
    pub name: String,
    pub minutes: u32,
    pub price: Decimal,
}

/// Shape shared by the create/cancel responses and the detail endpoints;
/// the detail variants add `services`, the plain ones `endTime`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponse {
    pub id: i64,
    pub client_name: Option<String>,
    pub barber_name: Option<String>,
    pub fecha_reserva: Option<String>,
    pub status: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub created_at: Option<String>,
    #[serde(default)]
    pub services: Option<Vec<BookingServiceResponse>>,
}

impl From<BookingResponse> for Booking {
    fn from(dto: BookingResponse) -> Self {
        Booking {
            id: dto.id,
            client_name: dto.client_name.unwrap_or_default(),
            barber_name: dto.barber_name.unwrap_or_default(),
            date: dto.fecha_reserva.unwrap_or_default(),
            status: BookingStatus::parse(dto.status.as_deref().unwrap_or_default()),
            start_time: dto.start_time.unwrap_or_default(),
            end_time: dto.end_time,
            created_at: dto.created_at,
            services: dto
                .services
                .unwrap_or_default()
                .into_iter()
                .map(|line| BookingServiceLine {
                    service_id: line.service_id,
                    name: line.name,
                    minutes: line.minutes,
                    price: line.price,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientBookingSummaryResponse {
    pub booking_id: i64,
    pub fecha_reserva: Option<String>,
    pub start_time: Option<String>,
    pub total_minutes: Option<u32>,
    pub status: Option<String>,
    pub barber_name: Option<String>,
}

impl From<ClientBookingSummaryResponse> for BookingSummary {
    fn from(dto: ClientBookingSummaryResponse) -> Self {
        BookingSummary {
            booking_id: dto.booking_id,
            date: dto.fecha_reserva.unwrap_or_default(),
            start_time: dto.start_time.unwrap_or_default(),
            total_minutes: dto.total_minutes,
            status: BookingStatus::parse(dto.status.as_deref().unwrap_or_default()),
            barber_name: dto.barber_name.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingBody<'a> {
    pub client_id: i64,
    pub barber_id: i64,
    pub fecha_reserva: &'a str,
    pub start_time: &'a str,
    pub service_ids: &'a [i64],
}

impl<'a> From<&'a BookingRequest> for CreateBookingBody<'a> {
    fn from(request: &'a BookingRequest) -> Self {
        CreateBookingBody {
            client_id: request.client_id,
            barber_id: request.barber_id,
            fecha_reserva: &request.date,
            start_time: &request.start_time,
            service_ids: &request.service_ids,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientResponse {
    pub codigo_cliente: i64,
    pub user_id: Option<i64>,
    pub nombres: String,
    pub email: Option<String>,
    pub created_at: Option<String>,
}

impl From<ClientResponse> for Client {
    fn from(dto: ClientResponse) -> Self {
        Client {
            id: dto.codigo_cliente,
            user_id: dto.user_id.unwrap_or(-1),
            name: dto.nombres,
            email: dto.email.unwrap_or_default(),
            created_at: dto.created_at.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientProfileResponse {
    pub id: i64,
    pub nombres: String,
    pub genero: Option<String>,
    pub email: Option<String>,
    pub telefono: Option<String>,
    pub dni: Option<String>,
}

impl From<ClientProfileResponse> for ClientProfile {
    fn from(dto: ClientProfileResponse) -> Self {
        ClientProfile {
            id: dto.id,
            name: dto.nombres,
            gender: dto.genero.unwrap_or_default(),
            email: dto.email.unwrap_or_default(),
            phone: dto.telefono.unwrap_or_default(),
            document_id: dto.dni.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClientBody<'a> {
    pub nombres: &'a str,
    pub fecha_nacimiento: &'a str,
    pub dni: &'a str,
    pub genero: &'a str,
    pub email: &'a str,
    pub telefono: &'a str,
}

impl<'a> From<&'a NewClient> for CreateClientBody<'a> {
    fn from(client: &'a NewClient) -> Self {
        CreateClientBody {
            nombres: &client.name,
            fecha_nacimiento: &client.birth_date,
            dni: &client.document_id,
            genero: &client.gender,
            email: &client.email,
            telefono: &client.phone,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UpdateProfileBody<'a> {
    pub nombres: &'a str,
    pub genero: &'a str,
    pub email: &'a str,
    pub telefono: &'a str,
    pub dni: &'a str,
}

impl<'a> From<&'a ProfileUpdate> for UpdateProfileBody<'a> {
    fn from(update: &'a ProfileUpdate) -> Self {
        UpdateProfileBody {
            nombres: &update.name,
            genero: &update.gender,
            email: &update.email,
            telefono: &update.phone,
            dni: &update.document_id,
        }
    }
}
