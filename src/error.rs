use thiserror::Error;

/// Machine-readable error surfaced to API callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiError {
    pub code: &'static str,
    pub message: &'static str,
    pub status: u16,
}

impl ApiError {
    pub const UNEXPECTED_ERROR: ApiError = ApiError {
        code: "UNEXPECTED_ERROR",
        message: "Unexpected error",
        status: 500,
    };

    pub const NOT_AUTHENTICATED: ApiError = ApiError {
        code: "NOT_AUTHENTICATED",
        message: "You are not authenticated",
        status: 401,
    };

    pub const ACTION_NOT_ALLOWED: ApiError = ApiError {
        code: "ACTION_NOT_ALLOWED",
        message: "Action not allowed",
        status: 403,
    };

    pub const SESSION_EXPIRED: ApiError = ApiError {
        code: "SESSION_EXPIRED",
        message: "Session has expired and must be renewed",
        status: 403,
    };

    pub const VALIDATION_FAILED: ApiError = ApiError {
        code: "VALIDATION_FAILED",
        message: "Validation failed",
        status: 400,
    };

    pub const PUBLISHER_DOES_NOT_EXIST: ApiError = ApiError {
        code: "PUBLISHER_DOES_NOT_EXIST",
        message: "Publisher does not exist",
        status: 404,
    };

    pub const FEED_DOES_NOT_EXIST: ApiError = ApiError {
        code: "FEED_DOES_NOT_EXIST",
        message: "Feed does not exist",
        status: 404,
    };
}

/// Field-level validation error codes, collected into `AppError::Validation`.
pub mod validation_errors {
    pub const NAME_TOO_SHORT: &str = "NAME_TOO_SHORT";
    pub const NAME_TOO_LONG: &str = "NAME_TOO_LONG";
    pub const DESCRIPTION_TOO_SHORT: &str = "DESCRIPTION_TOO_SHORT";
    pub const DESCRIPTION_TOO_LONG: &str = "DESCRIPTION_TOO_LONG";
    pub const URL_INVALID: &str = "URL_INVALID";
    pub const LOGO_URL_INVALID: &str = "LOGO_URL_INVALID";
    pub const LANGUAGE_INVALID: &str = "LANGUAGE_INVALID";
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("feed unreachable: {0}")]
    FeedUnreachable(String),

    #[error("feed parse error for {url}: {message}")]
    FeedParse { url: String, message: String },

    /// Validation failure listing every failed field code, not just the first.
    #[error("validation failed: {}", .0.join(", "))]
    Validation(Vec<&'static str>),

    #[error("{} ({})", .0.message, .0.code)]
    Api(ApiError),

    #[error("portal API error: {0}")]
    PortalApi(String),

    #[error("chat API error: {0}")]
    ChatApi(String),

    #[error("completion API error: {0}")]
    CompletionApi(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        AppError::Database(tokio_rusqlite::Error::Rusqlite(e))
    }
}

impl AppError {
    /// The machine-readable code reported to API callers.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Api(e) => e.code,
            AppError::Validation(_) => ApiError::VALIDATION_FAILED.code,
            _ => ApiError::UNEXPECTED_ERROR.code,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_lists_every_failed_field() {
        let err = AppError::Validation(vec![
            validation_errors::NAME_TOO_SHORT,
            validation_errors::URL_INVALID,
        ]);
        assert_eq!(
            err.to_string(),
            "validation failed: NAME_TOO_SHORT, URL_INVALID"
        );
        assert_eq!(err.code(), "VALIDATION_FAILED");
    }

    #[test]
    fn api_error_carries_code() {
        let err = AppError::Api(ApiError::SESSION_EXPIRED);
        assert_eq!(err.code(), "SESSION_EXPIRED");
    }
}
