pub mod handlers;
mod types;

pub use types::{INTERNAL_ERROR, INVALID_PARAMETERS, PredictParams};

use crate::{Result, config::Config, model::SegmentationModel, pipeline::Pipeline};
use axum::{
    Router,
    routing::{get, post},
};
use handlers::AppState;
use std::{net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing::info;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::welcome))
        .route("/predict", post(handlers::predict))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(config: Config, model: Arc<dyn SegmentationModel>) -> Result<()> {
    let pipeline = Pipeline::new(model, config.render.clone());

    // Create application state
    let app_state = AppState {
        pipeline: Arc::new(pipeline),
        storage: config.storage.clone(),
    };

    let app = router(app_state);

    // Start server
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);

    info!(
        "Serving predictions on {} (input: {}, output: {})",
        addr,
        config.storage.input_root.display(),
        config.storage.output_root.display()
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
