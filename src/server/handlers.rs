use super::types::PredictParams;
use crate::{Error, config::StorageConfig, paths::ResolvedPaths, pipeline::Pipeline};
use axum::{extract::State, http::StatusCode};
use std::sync::Arc;
use tracing::{error, info, warn};

pub const GREETING: &str = "Welcome to CAE Detectron Predict API";

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub storage: StorageConfig,
}

/// Liveness probe.
pub async fn welcome() -> (StatusCode, &'static str) {
    (StatusCode::OK, GREETING)
}

pub async fn predict(
    State(state): State<AppState>,
    params: PredictParams,
) -> Result<(StatusCode, String), Error> {
    info!(
        "Received predict request: {} -> {}",
        params.input_dataset, params.output_dataset
    );

    let paths = ResolvedPaths::resolve(
        &state.storage,
        &params.input_dataset,
        &params.output_dataset,
    )
    .inspect_err(|e| warn!("Rejected predict request: {}", e))?;

    match state
        .pipeline
        .predict(&paths.input_path, &paths.output_path)
        .await
    {
        Ok(()) => {
            info!("Wrote prediction to {}", paths.output_path.display());
            Ok((StatusCode::ACCEPTED, paths.output_path.display().to_string()))
        }
        Err(e) if e.is_client_error() => {
            warn!(
                "Prediction rejected for {}: {}",
                paths.input_path.display(),
                e
            );
            Err(e)
        }
        Err(e) => {
            error!(
                "Prediction failed for {} -> {}: {}",
                paths.input_path.display(),
                paths.output_path.display(),
                e
            );
            Err(e)
        }
    }
}
