use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;

pub const STATUS_PENDING: &str = "PENDING";
pub const STATUS_CONFIRMED: &str = "CONFIRMED";
pub const STATUS_CANCELLED: &str = "CANCELLED";
pub const STATUS_COMPLETED: &str = "COMPLETED";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientSession {
    pub client_id: i64,
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub document_id: String,
    pub logged_in: bool,
}

impl Default for ClientSession {
    fn default() -> Self {
        Self {
            client_id: -1,
            user_id: -1,
            name: String::new(),
            email: String::new(),
            phone: String::new(),
            document_id: String::new(),
            logged_in: false,
        }
    }
}

impl ClientSession {
    pub fn active_client_id(&self) -> Option<i64> {
        (self.logged_in && self.client_id > 0).then_some(self.client_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Barber {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Service {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub duration_minutes: u32,
    pub price: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    Unknown,
}

impl BookingStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            STATUS_PENDING => BookingStatus::Pending,
            STATUS_CONFIRMED => BookingStatus::Confirmed,
            STATUS_CANCELLED => BookingStatus::Cancelled,
            STATUS_COMPLETED => BookingStatus::Completed,
            _ => BookingStatus::Unknown,
        }
    }

    /// Only pending and confirmed bookings may be edited or cancelled.
    pub fn is_actionable(self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BookingStatus::Pending => STATUS_PENDING,
            BookingStatus::Confirmed => STATUS_CONFIRMED,
            BookingStatus::Cancelled => STATUS_CANCELLED,
            BookingStatus::Completed => STATUS_COMPLETED,
            BookingStatus::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingServiceLine {
    pub service_id: i64,
    pub name: String,
    pub minutes: u32,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Booking {
    pub id: i64,
    pub client_name: String,
    pub barber_name: String,
    pub date: String,
    pub status: BookingStatus,
    pub start_time: String,
    pub end_time: Option<String>,
    pub created_at: Option<String>,
    pub services: Vec<BookingServiceLine>,
}

impl Booking {
    pub fn service_ids(&self) -> Vec<i64> {
        self.services.iter().map(|line| line.service_id).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingSummary {
    pub booking_id: i64,
    pub date: String,
    pub start_time: String,
    pub total_minutes: Option<u32>,
    pub status: BookingStatus,
    pub barber_name: String,
}

impl From<BookingSummary> for Booking {
    fn from(summary: BookingSummary) -> Self {
        Booking {
            id: summary.booking_id,
            client_name: String::new(),
            barber_name: summary.barber_name,
            date: summary.date,
            status: summary.status,
            start_time: summary.start_time,
            end_time: None,
            created_at: None,
            services: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Client {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientProfile {
    pub id: i64,
    pub name: String,
    pub gender: String,
    pub email: String,
    pub phone: String,
    pub document_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClient {
    pub name: String,
    pub birth_date: String,
    pub document_id: String,
    pub gender: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub name: String,
    pub gender: String,
    pub email: String,
    pub phone: String,
    pub document_id: String,
}

/// Field set sent when creating a booking and, complete, when updating one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub client_id: i64,
    pub barber_id: i64,
    pub date: String,
    pub start_time: String,
    pub service_ids: Vec<i64>,
}

/// Pads `HH:MM` to `HH:MM:SS`; anything else is passed through untouched.
pub fn normalize_time(time: &str) -> String {
    let bytes = time.as_bytes();
    let short = bytes.len() == 5
        && bytes[2] == b':'
        && bytes[..2].iter().all(u8::is_ascii_digit)
        && bytes[3..].iter().all(u8::is_ascii_digit);
    if short {
        format!("{time}:00")
    } else {
        time.to_string()
    }
}
