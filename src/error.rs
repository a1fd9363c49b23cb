use reqwest::StatusCode;

pub const TIMEOUT_MESSAGE: &str = "Request timed out. Check your connection and try again.";
pub const OFFLINE_MESSAGE: &str = "No internet connection. Check your network and try again.";
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";

/// User-facing failure of a workflow step or gateway call.
///
/// `Display` renders only the message, which is what the UI shows.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// A local precondition failed. Never produced by a network round trip,
    /// except for a backend 400 on data the client could not check itself.
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Connectivity(String),
    #[error("{0}")]
    Auth(String),
    #[error("{0}")]
    Unknown(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::Validation(message)
            | ApiError::Conflict(message)
            | ApiError::NotFound(message)
            | ApiError::Connectivity(message)
            | ApiError::Auth(message)
            | ApiError::Unknown(message) => message,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Auth(_))
    }

    /// Maps a transport failure (no HTTP status) to a connectivity message.
    pub fn from_transport(err: &reqwest::Error, fallback: &str) -> Self {
        if err.is_timeout() {
            ApiError::Connectivity(TIMEOUT_MESSAGE.to_string())
        } else if err.is_connect() {
            ApiError::Connectivity(OFFLINE_MESSAGE.to_string())
        } else if err.is_decode() {
            ApiError::Unknown(fallback.to_string())
        } else {
            ApiError::Unknown(err.to_string())
        }
    }

    /// Maps a non-success status. A backend-supplied message wins over the
    /// operation's table.
    pub fn from_status(status: StatusCode, backend: Option<String>, table: &ErrorMessages) -> Self {
        let code = status.as_u16();
        let fallback = || format!("Server error ({code})");
        let pick = |entry: Option<&'static str>| {
            backend
                .clone()
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| entry.map(str::to_string).unwrap_or_else(fallback))
        };

        match code {
            400 if table.bad_request_is_conflict => ApiError::Conflict(pick(table.bad_request)),
            400 => ApiError::Validation(pick(table.bad_request)),
            401 => ApiError::Auth(pick(Some(SESSION_EXPIRED_MESSAGE))),
            404 => ApiError::NotFound(pick(table.not_found)),
            409 => ApiError::Conflict(pick(table.conflict)),
            _ => ApiError::Unknown(pick(None)),
        }
    }
}

/// Per-operation status messages.
#[derive(Debug, Clone, Copy)]
pub struct ErrorMessages {
    pub bad_request: Option<&'static str>,
    pub bad_request_is_conflict: bool,
    pub not_found: Option<&'static str>,
    pub conflict: Option<&'static str>,
    /// Used when the response body could not be decoded.
    pub fallback: &'static str,
}

impl ErrorMessages {
    pub const fn generic(fallback: &'static str) -> Self {
        Self {
            bad_request: None,
            bad_request_is_conflict: false,
            not_found: None,
            conflict: None,
            fallback,
        }
    }
}

pub const CREATE_BOOKING: ErrorMessages = ErrorMessages {
    bad_request: Some("Invalid booking data. Check the date, time and services."),
    bad_request_is_conflict: false,
    not_found: Some("Client or barber not found."),
    conflict: Some("A booking already exists at that time."),
    fallback: "Could not create the booking.",
};

pub const UPDATE_BOOKING: ErrorMessages = ErrorMessages {
    bad_request: Some("Invalid data for updating the booking."),
    bad_request_is_conflict: false,
    not_found: Some("Booking not found."),
    conflict: Some("A booking already exists at that time."),
    fallback: "Could not update the booking.",
};

pub const CANCEL_BOOKING: ErrorMessages = ErrorMessages {
    bad_request: Some("Cannot cancel this booking."),
    bad_request_is_conflict: true,
    not_found: Some("Booking not found."),
    conflict: Some("Cannot cancel this booking."),
    fallback: "Could not cancel the booking.",
};

pub const COMPLETE_BOOKING: ErrorMessages = ErrorMessages {
    bad_request: Some("Cannot complete this booking."),
    bad_request_is_conflict: true,
    not_found: Some("Booking not found."),
    conflict: Some("Cannot complete this booking."),
    fallback: "Could not complete the booking.",
};

pub const LOGIN: ErrorMessages = ErrorMessages {
    bad_request: None,
    bad_request_is_conflict: false,
    not_found: Some("No client found with that email."),
    conflict: None,
    fallback: "Could not log in.",
};

pub const REGISTER: ErrorMessages = ErrorMessages {
    bad_request: Some("Invalid or duplicated data. Check your information."),
    bad_request_is_conflict: false,
    not_found: None,
    conflict: None,
    fallback: "Could not register.",
};

pub const UPDATE_PROFILE: ErrorMessages = ErrorMessages {
    bad_request: Some("Could not update the profile."),
    bad_request_is_conflict: false,
    not_found: Some("Client not found."),
    conflict: Some("Could not update the profile."),
    fallback: "Could not update the profile.",
};

/// Failure of the local persisted stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("{0}")]
    Rejected(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Unknown(err.to_string())
    }
}
