use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonical JSON payload for error responses.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApiMessage {
    pub error: String,
}

impl ApiMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Helper for controllers that need to return `(StatusCode, Json<ApiMessage>)`.
pub fn json_error(
    status: StatusCode,
    message: impl Into<String>,
) -> (StatusCode, Json<ApiMessage>) {
    (status, Json(ApiMessage::new(message)))
}

/// Every failure a route can report to the browser.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("login required")]
    LoginRequired,
    #[error("Invalid username or password!")]
    InvalidCredentials,
    #[error("Username and password are required.")]
    MissingCredentials,
    #[error("Username already exists!")]
    DuplicateUsername,
    #[error("No file uploaded")]
    NoFileUploaded,
    #[error("No file selected")]
    NoFileSelected,
    #[error("{0}")]
    BadUpload(String),
    #[error("File too large")]
    FileTooLarge,
    #[error("Uploaded file is not a readable image")]
    UnreadableImage,
    #[error("File not found.")]
    NotFound,
    #[error("Server error, please try again later.")]
    Internal,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::LoginRequired => StatusCode::SEE_OTHER,
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::DuplicateUsername => StatusCode::CONFLICT,
            AppError::MissingCredentials
            | AppError::NoFileUploaded
            | AppError::NoFileSelected
            | AppError::BadUpload(_)
            | AppError::UnreadableImage => StatusCode::BAD_REQUEST,
            AppError::FileTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::LoginRequired = self {
            return Redirect::to("/login").into_response();
        }

        json_error(self.status(), self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::{body::to_bytes, http::header};

    use super::*;

    async fn body_of(err: AppError) -> (StatusCode, ApiMessage) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, serde_json::from_slice(&bytes).expect("json payload"))
    }

    #[tokio::test]
    async fn errors_render_as_json_messages() {
        let (status, payload) = body_of(AppError::DuplicateUsername).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(payload.error, "Username already exists!");

        let (status, payload) = body_of(AppError::NoFileSelected).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload.error, "No file selected");

        let (status, payload) = body_of(AppError::InvalidCredentials).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(payload.error, "Invalid username or password!");

        let (status, payload) = body_of(AppError::FileTooLarge).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(payload.error, "File too large");
    }

    #[test]
    fn login_required_redirects() {
        let response = AppError::LoginRequired.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).map(|v| v.as_bytes()),
            Some(&b"/login"[..])
        );
    }
}
