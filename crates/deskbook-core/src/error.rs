#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("Not authenticated: no bearer token captured yet")]
    AuthMissing,

    #[error("Booking request rejected with HTTP status {status}")]
    RemoteRejected { status: u16 },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Could not reconcile upcoming bookings: {0}")]
    Reconciliation(String),

    #[error("Notification permission not granted")]
    PermissionDenied,

    #[error("Location '{name}' is missing a required {field}")]
    InvalidLocation { name: String, field: &'static str },

    #[error("Invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Invalid value '{value}' for {what}")]
    InvalidValue { what: &'static str, value: String },

    #[error("Invalid host message: {0}")]
    InvalidMessage(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type AppResult<T> = std::result::Result<T, AppError>;
