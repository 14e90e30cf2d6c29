//! API Error Responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use data_validator::ShapeError;
use feature_engine::{ExtractionError, PresetError};
use serde::Serialize;
use tabular::TabularError;
use thiserror::Error;

/// Any failure of an extraction request
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error(transparent)]
    Tabular(#[from] TabularError),

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error(transparent)]
    Preset(#[from] PresetError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Invalid query string: {0}")]
    InvalidQuery(String),
}

impl ApiError {
    /// Stable error kind reported to clients
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Tabular(TabularError::MissingInput) => "MissingInputError",
            ApiError::Tabular(TabularError::UnsupportedFormat(_)) => "UnsupportedFormatError",
            ApiError::Tabular(TabularError::MalformedInput(_))
            | ApiError::Tabular(TabularError::InconsistentTable(_))
            | ApiError::InvalidQuery(_) => "MalformedInputError",
            ApiError::Tabular(TabularError::Encode(_)) => "EncodeError",
            ApiError::Tabular(TabularError::TooLarge(_)) | ApiError::Shape(_) => "ShapeError",
            ApiError::Preset(_) => "UnknownPresetError",
            ApiError::Extraction(_) => "ExtractionError",
        }
    }
}

/// JSON body of a rejected request
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.kind(),
            detail: self.to_string(),
        };
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}
