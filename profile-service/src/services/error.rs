use service_core::axum::http::StatusCode;
use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Mandatory parameter {0} is missing")]
    MissingParameter(String),

    #[error("External id {id} of type {id_type} from provider {provider} not found")]
    ExternalIdentityNotFound {
        id: String,
        id_type: String,
        provider: String,
    },

    #[error("User not found")]
    UserNotFound,

    #[error("User account has been locked or deleted")]
    AccountLocked,

    #[error("You are not authorized to read this profile")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(anyhow::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::MissingParameter(_) => AppError::Client {
                status: StatusCode::BAD_REQUEST,
                code: "MANDATORY_PARAMETER_MISSING",
                message,
            },
            ServiceError::ExternalIdentityNotFound { .. } => AppError::Client {
                status: StatusCode::NOT_FOUND,
                code: "EXTERNAL_ID_NOT_FOUND",
                message,
            },
            ServiceError::UserNotFound => AppError::Client {
                status: StatusCode::NOT_FOUND,
                code: "USER_NOT_FOUND",
                message,
            },
            ServiceError::AccountLocked => AppError::Client {
                status: StatusCode::BAD_REQUEST,
                code: "USER_ACCOUNT_LOCKED",
                message,
            },
            ServiceError::Unauthorized => AppError::Client {
                status: StatusCode::UNAUTHORIZED,
                code: "UNAUTHORIZED",
                message,
            },
            ServiceError::Database(e) => AppError::DatabaseError(e),
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}
