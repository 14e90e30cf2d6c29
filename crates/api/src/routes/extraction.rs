//! Feature Extraction Route

use std::sync::Arc;

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::QueryRejection,
        Multipart, Query, State,
    },
    http::header,
    response::{IntoResponse, Response},
};
use tabular::TabularError;
use tracing::debug;

use crate::error::ApiError;
use crate::pipeline::{ExtractionParams, Upload};
use crate::AppState;

/// Multipart field carrying the uploaded table
pub const DATA_FILE_FIELD: &str = "data_file";

/// Extract features from an uploaded table
pub async fn extract_features(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ExtractionParams>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let params = match query {
        Ok(Query(params)) => params,
        Err(rejection) => {
            let err = ApiError::InvalidQuery(rejection.body_text());
            return Err(state.pipeline.reject(err));
        }
    };

    let upload = match multipart {
        Ok(multipart) => read_data_file(multipart).await,
        Err(rejection) => {
            debug!("No multipart body: {}", rejection);
            Upload::Missing
        }
    };

    let output = state.pipeline.run(upload, &params).await?;
    let headers = [
        (header::CONTENT_TYPE, output.format.content_type()),
        (header::CONTENT_DISPOSITION, output.content_disposition()),
    ];
    Ok((headers, output.body).into_response())
}

/// Contents of the `data_file` part
async fn read_data_file(mut multipart: Multipart) -> Upload {
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some(DATA_FILE_FIELD) => {
                return match field.bytes().await {
                    Ok(bytes) => Upload::Received(bytes),
                    Err(err) => unreadable(err),
                };
            }
            Ok(Some(field)) => debug!("Skipping multipart field {:?}", field.name()),
            Ok(None) => return Upload::Missing,
            Err(err) => return unreadable(err),
        }
    }
}

fn unreadable(err: MultipartError) -> Upload {
    debug!("Could not read multipart body: {}", err);
    Upload::Unreadable(TabularError::MalformedInput(format!(
        "Could not read upload: {}",
        err.body_text()
    )))
}
