//! Extraction Request Pipeline
//!
//! Drives one upload through decode, validation, preset resolution,
//! extraction and encoding. The first failing stage ends the request.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use data_validator::ShapeValidator;
use feature_engine::{ExtractionInvoker, FeatureEngine};
use metrics::{counter, histogram};
use serde::Deserialize;
use tabular::{ColumnRoles, DataFormat, TabularError, DEFAULT_DELIMITER};
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::error::ApiError;

/// Preset used when `settings` is absent
pub const DEFAULT_SETTINGS: &str = "comprehensive";

/// Query parameters of an extraction request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractionParams {
    pub input_format: Option<String>,
    pub column_id: Option<String>,
    pub column_kind: Option<String>,
    pub column_sort: Option<String>,
    pub column_value: Option<String>,
    pub settings: Option<String>,
    pub output_format: Option<String>,
    pub output_delimiter: Option<String>,
}

impl ExtractionParams {
    /// Column roles, treating empty names as unset
    pub fn roles(&self) -> ColumnRoles {
        let pick = |value: &Option<String>| value.clone().filter(|v| !v.is_empty());
        ColumnRoles {
            id: pick(&self.column_id),
            kind: pick(&self.column_kind),
            sort: pick(&self.column_sort),
            value: pick(&self.column_value),
        }
    }
}

/// Encoded feature table ready to be sent
#[derive(Debug, Clone)]
pub struct ExtractionOutput {
    pub body: Vec<u8>,
    pub format: DataFormat,
}

impl ExtractionOutput {
    /// `Content-Disposition` header value
    pub fn content_disposition(&self) -> &'static str {
        match self.format {
            DataFormat::Csv => "attachment;filename=features.csv",
            DataFormat::Json => "attachment;filename=features.json",
            DataFormat::Parquet => "attachment;filename=features.parquet",
        }
    }
}

/// What a request carried in its upload part
#[derive(Debug, Clone)]
pub enum Upload {
    Missing,
    Received(Bytes),
    /// The body was present but could not be read to the end
    Unreadable(TabularError),
}

impl From<Option<Bytes>> for Upload {
    fn from(payload: Option<Bytes>) -> Self {
        payload.map_or(Upload::Missing, Upload::Received)
    }
}

/// Stateless request orchestrator
#[derive(Debug, Clone)]
pub struct Pipeline {
    validator: ShapeValidator,
    invoker: ExtractionInvoker,
}

impl Pipeline {
    pub fn new(validator: ShapeValidator, invoker: ExtractionInvoker) -> Self {
        Self { validator, invoker }
    }

    pub fn from_config(config: &GatewayConfig, engine: Arc<dyn FeatureEngine>) -> Self {
        Self::new(
            ShapeValidator::new(config.shape_limits()),
            ExtractionInvoker::new(engine, config.extraction_timeout()),
        )
    }

    /// Run one request and record its outcome
    pub async fn run(
        &self,
        upload: impl Into<Upload>,
        params: &ExtractionParams,
    ) -> Result<ExtractionOutput, ApiError> {
        let started = Instant::now();
        let result = self.execute(upload.into(), params).await;
        record_outcome(result.as_ref(), started.elapsed());
        result
    }

    /// Record a request turned away before it reached the pipeline
    pub fn reject(&self, err: ApiError) -> ApiError {
        record_outcome(Err(&err), Duration::ZERO);
        err
    }

    async fn execute(
        &self,
        upload: Upload,
        params: &ExtractionParams,
    ) -> Result<ExtractionOutput, ApiError> {
        let payload = match upload {
            Upload::Received(payload) if !payload.is_empty() => payload,
            Upload::Missing | Upload::Received(_) => return Err(TabularError::MissingInput.into()),
            Upload::Unreadable(err) => return Err(err.into()),
        };

        let input_format: DataFormat = params.input_format.as_deref().unwrap_or("csv").parse()?;
        let limits = self.validator.limits().decode_limits();
        let table = tabular::decode(&payload, input_format, &limits)?;
        debug!(
            "Decoded {} upload: {} rows x {} columns",
            input_format,
            table.num_rows(),
            table.num_columns()
        );

        let roles = params.roles();
        self.validator.validate(&table)?;
        self.validator.validate_roles(&table, &roles)?;

        let directives =
            feature_engine::resolve(params.settings.as_deref().unwrap_or(DEFAULT_SETTINGS))?;
        debug!(
            "Resolved preset {} to {} calculators",
            directives.preset,
            directives.calculators.len()
        );

        let output_format: DataFormat = params.output_format.as_deref().unwrap_or("csv").parse()?;
        let delimiter = match params.output_delimiter.as_deref() {
            Some(raw) => tabular::parse_delimiter(raw)?,
            None => DEFAULT_DELIMITER,
        };

        let features = self.invoker.invoke(table, roles, directives).await?;
        let body = tabular::encode(&features, output_format, delimiter)?;

        Ok(ExtractionOutput {
            body,
            format: output_format,
        })
    }
}

fn record_outcome(result: Result<&ExtractionOutput, &ApiError>, elapsed: Duration) {
    let outcome = match result {
        Ok(output) => {
            info!(
                "Extraction served {} bytes as {} in {:?}",
                output.body.len(),
                output.format,
                elapsed
            );
            "ok"
        }
        Err(err) => {
            warn!("Extraction rejected ({}): {}", err.kind(), err);
            err.kind()
        }
    };
    counter!("extraction_requests_total", "outcome" => outcome).increment(1);
    histogram!("extraction_duration_seconds").record(elapsed.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;
    use feature_engine::{EngineError, EngineRequest};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tabular::FeatureTable;

    #[derive(Default)]
    struct CountingEngine {
        calls: AtomicUsize,
    }

    impl FeatureEngine for CountingEngine {
        fn extract(&self, request: &EngineRequest<'_>) -> Result<FeatureTable, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let id = request.table.columns()[0].clone();
            let mut features = FeatureTable::new(id.name.clone(), id.cells.clone());
            features
                .push_column("value__mean", vec![0.0; id.len()])
                .map_err(|e| EngineError::Internal(e.to_string()))?;
            Ok(features)
        }
    }

    fn pipeline(engine: Arc<CountingEngine>) -> Pipeline {
        Pipeline::from_config(&GatewayConfig::default(), engine)
    }

    fn params(query: &[(&str, &str)]) -> ExtractionParams {
        let mut params = ExtractionParams::default();
        for &(key, value) in query {
            let value = Some(value.to_string());
            match key {
                "input_format" => params.input_format = value,
                "column_id" => params.column_id = value,
                "settings" => params.settings = value,
                "output_format" => params.output_format = value,
                "output_delimiter" => params.output_delimiter = value,
                _ => unreachable!(),
            }
        }
        params
    }

    async fn kind_of(
        pipeline: &Pipeline,
        payload: Option<&'static str>,
        query: &[(&str, &str)],
    ) -> &'static str {
        pipeline
            .run(payload.map(|s| Bytes::from_static(s.as_bytes())), &params(query))
            .await
            .unwrap_err()
            .kind()
    }

    #[tokio::test]
    async fn test_stage_order() {
        let engine = Arc::new(CountingEngine::default());
        let pipeline = pipeline(engine.clone());

        assert_eq!(kind_of(&pipeline, None, &[]).await, "MissingInputError");
        assert_eq!(kind_of(&pipeline, Some(""), &[]).await, "MissingInputError");
        assert_eq!(
            kind_of(&pipeline, Some("id\n1\n"), &[("input_format", "xml")]).await,
            "UnsupportedFormatError"
        );
        assert_eq!(
            kind_of(&pipeline, Some("id,value\n1,1\n"), &[("input_format", "json")]).await,
            "MalformedInputError"
        );
        assert_eq!(
            kind_of(
                &pipeline,
                Some("a,b,c,d,e,f,g\n1,2,3,4,5,6,7\n"),
                &[("settings", "nope")]
            )
            .await,
            "ShapeError"
        );
        assert_eq!(
            kind_of(
                &pipeline,
                Some("id,value\n1,1\n"),
                &[("settings", "nope"), ("output_format", "xml")]
            )
            .await,
            "UnknownPresetError"
        );
        assert_eq!(
            kind_of(&pipeline, Some("id,value\n1,1\n"), &[("output_format", "xml")]).await,
            "UnsupportedFormatError"
        );
        assert_eq!(
            kind_of(&pipeline, Some("id,value\n1,1\n"), &[("output_delimiter", "||")]).await,
            "EncodeError"
        );
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unreadable_upload_is_malformed() {
        let engine = Arc::new(CountingEngine::default());
        let pipeline = pipeline(engine.clone());

        let err = pipeline
            .run(
                Upload::Unreadable(TabularError::MalformedInput(
                    "Could not read upload: length limit exceeded".to_string(),
                )),
                &params(&[("input_format", "xml")]),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "MalformedInputError");
        assert!(err.to_string().contains("length limit"));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_oversized_upload_stops_while_decoding() {
        let engine = Arc::new(CountingEngine::default());
        let pipeline = pipeline(engine.clone());

        let mut csv = String::from("id,value\n");
        for i in 0..5000 {
            csv.push_str(&format!("{},{}\n", i, i));
        }
        let err = pipeline
            .run(Some(Bytes::from(csv)), &params(&[("input_format", "csv")]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ShapeError");
        assert!(err.to_string().contains("100 rows"));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_success_output() {
        let engine = Arc::new(CountingEngine::default());
        let pipeline = pipeline(engine.clone());

        let output = pipeline
            .run(
                Some(Bytes::from_static(b"id,value\n1,1\n2,5\n")),
                &params(&[("column_id", "id"), ("output_format", "json")]),
            )
            .await
            .unwrap();

        assert_eq!(output.format, DataFormat::Json);
        assert_eq!(output.content_disposition(), "attachment;filename=features.json");
        let rows: serde_json::Value = serde_json::from_slice(&output.body).unwrap();
        assert_eq!(rows.as_array().unwrap().len(), 2);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_engine_failure_is_extraction_error() {
        let config = GatewayConfig {
            extraction_timeout_secs: 5,
            ..Default::default()
        };
        let pipeline = Pipeline::from_config(&config, Arc::new(feature_engine::StatisticalEngine));
        let err = pipeline
            .run(Some(Bytes::from_static(b"id,value\n1,1\n")), &params(&[]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ExtractionError");
        assert!(err.to_string().contains("column_id"));
    }

    #[test]
    fn test_empty_role_names_unset() {
        let params = ExtractionParams {
            column_id: Some("id".to_string()),
            column_kind: Some(String::new()),
            ..Default::default()
        };
        let roles = params.roles();
        assert_eq!(roles.id.as_deref(), Some("id"));
        assert!(roles.kind.is_none());
    }
}
