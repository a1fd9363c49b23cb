use crate::error::ApiError;

/// Three-state outcome of a remote operation as seen by the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource<T> {
    Success(T),
    Error(String),
    Pending,
}

impl<T> Resource<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Resource::Pending)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Resource::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Resource::Error(message) => Some(message.as_str()),
            _ => None,
        }
    }
}

impl<T> Default for Resource<T> {
    fn default() -> Self {
        Resource::Pending
    }
}

impl<T> From<Result<T, ApiError>> for Resource<T> {
    fn from(result: Result<T, ApiError>) -> Self {
        match result {
            Ok(value) => Resource::Success(value),
            Err(err) => Resource::Error(err.to_string()),
        }
    }
}
