//! HTTP server for baitd

use crate::config::{Config, WriterKind};
use crate::ingest::{Extractor, ServiceTranscriber};
use crate::orchestrator::{
    Classifier, ClassifierSet, ConclusionWriter, LlmClassifier, LlmClient, LlmConclusionWriter,
    SequencerSettings, StageSequencer, TemplateConclusionWriter,
};
use crate::routes;
use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::Router;
use bait_shared::Stage;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
pub struct AppState {
    pub sequencer: Arc<StageSequencer>,
    pub extractor: Arc<Extractor>,
    /// Budget for one traversal, stages included
    pub request_timeout: Duration,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        sequencer: Arc<StageSequencer>,
        extractor: Arc<Extractor>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            sequencer,
            extractor,
            request_timeout,
            start_time: Instant::now(),
        }
    }

    /// Wire the production stages from config.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Arc::new(LlmClient::new(&config.llm).context("creating LLM client")?);
        let stages = &config.llm.stages;

        let classifiers = ClassifierSet::from_fn(|stage| {
            let classifier: Arc<dyn Classifier> =
                Arc::new(LlmClassifier::new(stage, client.clone(), stages.get(stage).clone()));
            classifier
        });

        let writer: Arc<dyn ConclusionWriter> = match config.conclusion.writer {
            WriterKind::Llm => Arc::new(LlmConclusionWriter::new(
                client.clone(),
                stages.get(Stage::Conclusion).clone(),
            )),
            WriterKind::Template => Arc::new(TemplateConclusionWriter),
        };

        let sequencer = StageSequencer::new(
            classifiers,
            writer,
            SequencerSettings::from_config(config),
        );

        let transcriber = Arc::new(ServiceTranscriber::new(
            client,
            &config.ingest.transcription_model,
        ));
        let extractor = Extractor::new(&config.ingest, transcriber);

        info!(
            "  Stages: {:?} backend at {}, conclusion writer {:?}",
            config.llm.backend, config.llm.endpoint, config.conclusion.writer
        );

        Ok(Self::new(
            Arc::new(sequencer),
            Arc::new(extractor),
            Duration::from_secs(config.daemon.request_timeout_secs),
        ))
    }
}

/// Build the router with all routes and layers.
pub fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .merge(routes::analyze_routes())
        .merge(routes::api_routes())
        .merge(routes::health_routes())
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server
pub async fn run(state: AppState, config: &Config) -> Result<()> {
    let app = router(Arc::new(state), config.daemon.max_upload_bytes);

    let addr = &config.daemon.listen_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("  Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("  Shutting down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("  Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}
