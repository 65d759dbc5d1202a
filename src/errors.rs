// src/errors.rs
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RestorationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Model gateway error: {0}")]
    Gateway(String),

    #[error("Model returned no restored image: {0}")]
    MissingImage(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RestorationError {
    fn title(&self) -> &'static str {
        match self {
            RestorationError::InvalidInput(_) => "Invalid request",
            RestorationError::NotFound(_) => "Image files not found",
            RestorationError::Gateway(_) => "AI service error",
            RestorationError::MissingImage(_) => "Failed to generate restored image",
            RestorationError::ImageProcessing(_) => "Image processing error",
            RestorationError::Storage(_) => "Temporary storage error",
            RestorationError::Config(_) => "Server misconfigured",
        }
    }
}

impl ResponseError for RestorationError {
    fn status_code(&self) -> StatusCode {
        match self {
            RestorationError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            RestorationError::NotFound(_) => StatusCode::NOT_FOUND,
            RestorationError::Gateway(_) => StatusCode::SERVICE_UNAVAILABLE,
            RestorationError::MissingImage(_)
            | RestorationError::ImageProcessing(_)
            | RestorationError::Storage(_)
            | RestorationError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "success": false,
            "error": self.title(),
            "details": self.to_string()
        }))
    }
}
