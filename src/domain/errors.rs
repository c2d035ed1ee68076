use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("database operation failed: {0}")]
    Query(String),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(value: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &value {
            // 23505: unique_violation
            if db_err.code().as_deref() == Some("23505") {
                let message = match db_err.constraint() {
                    Some("users_email_key") => "User already exists",
                    Some("users_pan_card_key") => "PAN card is already registered",
                    Some("referral_usages_user_id_key") => "You have already used a referral code",
                    _ => "Record already exists",
                };
                return Self::Conflict(message.to_string());
            }
        }
        Self::Query(value.to_string())
    }
}

#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    Conflict(String),
    NotFound(String),
    Auth(String),
    Unauthenticated,
    Forbidden(String),
    Unexpected(String),
    ServerError,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Registration reports any failure as a 400. Client errors keep their message;
    /// store and IO causes stay in the logs and the body carries a generic message.
    pub fn into_unexpected(self) -> Self {
        match self {
            Self::ServerError => Self::Unexpected("Something went wrong".to_string()),
            other => other,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::Conflict(_)
            | Self::NotFound(_)
            | Self::Auth(_)
            | Self::Unexpected(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Validation(m)
            | Self::Conflict(m)
            | Self::NotFound(m)
            | Self::Auth(m)
            | Self::Forbidden(m)
            | Self::Unexpected(m) => m,
            Self::Unauthenticated => "Please login to continue",
            Self::ServerError => "Something went wrong",
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::Conflict(message) => Self::Conflict(message),
            DatabaseError::NotFound(message) => Self::NotFound(message),
            DatabaseError::Query(_) => Self::ServerError,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed >>> {:?}", self);
        }

        let body = Json(json!({
            "success": false,
            "message": self.message(),
        }));

        (status, body).into_response()
    }
}

#[derive(Debug)]
pub enum JWTError {
    GenerationFailed(jsonwebtoken::errors::ErrorKind),
    DecodeFailed(jsonwebtoken::errors::ErrorKind),
}

impl From<JWTError> for ApiError {
    fn from(value: JWTError) -> Self {
        match value {
            JWTError::GenerationFailed(_) => Self::ServerError,
            JWTError::DecodeFailed(_) => Self::Unauthenticated,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("invalid multipart body: {0}")]
    Multipart(String),
    #[error("file storage failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<UploadError> for ApiError {
    fn from(value: UploadError) -> Self {
        match value {
            UploadError::Multipart(message) => Self::Validation(message),
            UploadError::Io(e) => {
                tracing::error!("file storage failed >>> {}", e);
                Self::ServerError
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_bad_request() {
        for err in [
            ApiError::validation("missing"),
            ApiError::conflict("dup"),
            ApiError::not_found("gone"),
            ApiError::auth("bad"),
            ApiError::Unexpected("boom".into()),
        ] {
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        }
        assert_eq!(ApiError::ServerError.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ApiError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn database_conflict_keeps_its_message() {
        let err: ApiError = DatabaseError::Conflict("User already exists".into()).into();
        assert_eq!(err.message(), "User already exists");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn server_error_becomes_bad_request_on_registration_path() {
        let err: ApiError = DatabaseError::Query("relation \"users\" does not exist".into()).into();
        let err = err.into_unexpected();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "Something went wrong");
    }

    #[test]
    fn registration_keeps_client_error_messages() {
        let err = ApiError::conflict("PAN card is already registered").into_unexpected();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "PAN card is already registered");
    }

    #[test]
    fn missing_row_is_not_found() {
        let err: ApiError = DatabaseError::NotFound("User doesn't exist".into()).into();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert_eq!(err.message(), "User doesn't exist");
    }
}
