use diesel::result::{DatabaseErrorKind, Error as DieselError};

#[derive(Debug, thiserror::Error)]
pub enum CrmError {
    #[error("Unknown attribute '{attribute}' for {entity}")]
    UnknownAttribute { entity: &'static str, attribute: String },
    #[error("Attribute '{0}' cannot be modified with this command")]
    ImmutableAttribute(String),
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
    #[error("Access denied: {0}")]
    Unauthorized(String),
    #[error("Invalid assignment: {0}")]
    InvalidAssignment(String),
    #[error("Session expired, please log in again")]
    ExpiredCredential,
    #[error("Invalid session token: {0}")]
    InvalidCredential(String),
    #[error("Not authenticated, please log in first")]
    NotAuthenticated,
    #[error("Login failed: {0}")]
    AuthenticationFailed(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CrmError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownAttribute { .. } => "unknown_attribute",
            Self::ImmutableAttribute(_) => "immutable_attribute",
            Self::InvalidValue { .. } => "invalid_value",
            Self::Unauthorized(_) => "unauthorized",
            Self::InvalidAssignment(_) => "invalid_assignment",
            Self::ExpiredCredential => "expired_credential",
            Self::InvalidCredential(_) => "invalid_credential",
            Self::NotAuthenticated => "not_authenticated",
            Self::AuthenticationFailed(_) => "authentication_failed",
            Self::NotFound(_) => "not_found",
            Self::ConstraintViolation(_) => "constraint_violation",
            Self::Database(_) => "database_error",
            Self::Config(_) => "config_error",
            Self::Io(_) => "io_error",
        }
    }

    /// Failures the user caused and can act on. Everything else is a fault
    /// worth forwarding to the error reporter.
    pub fn is_expected(&self) -> bool {
        !matches!(self, Self::Database(_) | Self::Config(_) | Self::Io(_))
    }
}

impl From<DieselError> for CrmError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => Self::NotFound("no matching record".to_string()),
            DieselError::DatabaseError(kind, info) => match kind {
                DatabaseErrorKind::UniqueViolation
                | DatabaseErrorKind::ForeignKeyViolation
                | DatabaseErrorKind::NotNullViolation
                | DatabaseErrorKind::CheckViolation => {
                    Self::ConstraintViolation(info.message().to_string())
                }
                _ => Self::Database(info.message().to_string()),
            },
            other => Self::Database(other.to_string()),
        }
    }
}

pub type CrmResult<T> = Result<T, CrmError>;
