//! CKD Predictor - Main Entry Point
//!
//! `train` fits the random forest offline and writes the artifact bundle,
//! `predict` scores one record from the command line and `serve` answers
//! scoring requests from NATS with a pool of concurrent workers.

use anyhow::{Context, Result};
use ckd_predictor::{
    config::{AppConfig, LoggingConfig},
    consumer::{decode_request, RequestConsumer},
    feature_extractor::FeatureRecord,
    metrics::{MetricsReporter, ServingMetrics},
    models::inference::Predictor,
    producer::PredictionPublisher,
    training::train_from_csv,
    types::{PatientSnapshot, PredictionRecord, ScoringReply},
};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn};

#[derive(Parser)]
#[command(
    name = "ckd-predictor",
    about = "Chronic kidney disease random-forest trainer and scoring service",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Train on the labelled CSV and write the artifact bundle
    Train {
        /// Dataset path (overrides training.data_path)
        #[arg(short, long)]
        data: Option<String>,
    },

    /// Score one patient record with the saved bundle
    Predict {
        /// JSON object of feature name to value; the reference patient when omitted
        #[arg(short, long)]
        record: Option<PathBuf>,
    },

    /// Answer scoring requests from NATS
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };

    init_logging(&config.logging, cli.verbose)?;

    match cli.command {
        Commands::Train { data } => {
            let mut training = config.training.clone();
            if let Some(data) = data {
                training.data_path = data;
            }
            info!("Starting CKD model training");
            train_from_csv(&training, Path::new(&config.artifacts.models_dir))?;
        }
        Commands::Predict { record } => predict_once(&config, record.as_deref())?,
        Commands::Serve => serve(config).await?,
    }

    Ok(())
}

fn init_logging(logging: &LoggingConfig, verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("ckd_predictor={}", level).parse()?);

    if logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    Ok(())
}

fn predict_once(config: &AppConfig, record_path: Option<&Path>) -> Result<()> {
    let predictor = Predictor::load(&config.artifacts.models_dir)?;
    info!(
        run_id = %predictor.run_id(),
        features = predictor.feature_names().len(),
        "Artifact bundle loaded"
    );

    let record: FeatureRecord = match record_path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("{} is not a JSON feature record", path.display()))?
        }
        None => {
            info!("No record given, scoring the reference patient");
            PatientSnapshot::reference().to_record()?
        }
    };

    let prediction = predictor.predict(&record)?;
    info!(
        label = prediction.label,
        ckd_probability = prediction.ckd_probability,
        "Prediction: {}",
        if prediction.has_ckd() { "CKD" } else { "Not CKD" }
    );
    println!("{}", serde_json::to_string_pretty(&prediction)?);

    Ok(())
}

async fn serve(config: AppConfig) -> Result<()> {
    info!("Starting CKD scoring service");

    // Artifacts are loaded once; every worker shares the same read-only bundle
    let predictor = Arc::new(Predictor::load(&config.artifacts.models_dir)?);
    info!(
        run_id = %predictor.run_id(),
        features = predictor.feature_names().len(),
        dir = %config.artifacts.models_dir,
        "Artifact bundle loaded"
    );

    let metrics = Arc::new(ServingMetrics::new());

    let client = async_nats::connect(&config.nats.url)
        .await
        .with_context(|| format!("Failed to connect to NATS at {}", config.nats.url))?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = RequestConsumer::new(client.clone(), &config.nats.request_subject);
    let publisher = Arc::new(PredictionPublisher::new(
        client.clone(),
        &config.nats.prediction_subject,
    ));

    let num_workers = config.serving.workers.max(1);
    info!(
        "Starting scoring loop with {} parallel workers, publishing to {}",
        num_workers,
        publisher.subject()
    );

    let semaphore = Arc::new(Semaphore::new(num_workers));
    let model_name: Arc<str> = Arc::from(config.serving.model_name.as_str());

    let reporter = MetricsReporter::new(metrics.clone(), config.serving.metrics_interval_secs);
    let reporter_handle = tokio::spawn(reporter.start());

    let mut subscription = consumer.subscribe().await?;

    // One signal future for the whole loop, raced against both waits
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let message = tokio::select! {
            message = subscription.next() => match message {
                Some(message) => message,
                None => {
                    warn!("Request subscription closed");
                    break;
                }
            },
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
        };

        let Some(permit) = acquire_worker(semaphore.clone(), shutdown.as_mut()).await? else {
            warn!("Shutdown signal received while all workers were busy");
            if let Some(reply_to) = message.reply.clone() {
                let reply = ScoringReply::error("scoring service is shutting down");
                if let Err(e) = publisher.reply(reply_to, &reply).await {
                    error!(error = %e, "Failed to send reply");
                }
            }
            break;
        };

        let predictor = predictor.clone();
        let publisher = publisher.clone();
        let metrics = metrics.clone();
        let model_name = model_name.clone();

        tokio::spawn(async move {
            let start_time = Instant::now();

            let reply = match decode_request(&message.payload) {
                Ok(request) => match predictor.predict(&request.features) {
                    Ok(prediction) => {
                        metrics.record_prediction(
                            start_time.elapsed(),
                            prediction.label,
                            prediction.ckd_probability,
                        );

                        let record = PredictionRecord::new(
                            request.patient_id,
                            &*model_name,
                            predictor.run_id().to_string(),
                            request.features,
                            prediction,
                        )
                        .with_metadata("source", "nats");

                        if let Err(e) = publisher.publish(&record).await {
                            error!(
                                prediction_id = %record.id,
                                error = %e,
                                "Failed to publish prediction"
                            );
                        }

                        debug!(
                            patient_id = record.patient_id,
                            label = prediction.label,
                            ckd_probability = prediction.ckd_probability,
                            latency_us = start_time.elapsed().as_micros() as u64,
                            "Request scored"
                        );

                        ScoringReply::from_record(&record)
                    }
                    Err(e) => {
                        metrics.record_failure();
                        if e.is_request_error() {
                            warn!(patient_id = request.patient_id, error = %e, "Rejected scoring request");
                        } else {
                            error!(patient_id = request.patient_id, error = %e, "Inference failed");
                        }
                        ScoringReply::error(e.to_string())
                    }
                },
                Err(e) => {
                    metrics.record_failure();
                    warn!(error = %e, "Failed to deserialize scoring request");
                    ScoringReply::error(format!("{:#}", e))
                }
            };

            if let Some(reply_to) = message.reply.clone() {
                if let Err(e) = publisher.reply(reply_to, &reply).await {
                    error!(error = %e, "Failed to send reply");
                }
            }

            drop(permit);
        });
    }

    // Wait for in-flight requests before flushing
    let _drained = semaphore
        .acquire_many(num_workers as u32)
        .await
        .context("Worker pool closed")?;
    reporter_handle.abort();

    if let Err(e) = publisher.flush().await {
        error!(error = %e, "Failed to flush NATS connection");
    }

    info!("Scoring service shutting down...");
    metrics.print_summary();

    Ok(())
}

/// Wait for a free worker slot; `None` when `shutdown` completes first
async fn acquire_worker(
    semaphore: Arc<Semaphore>,
    shutdown: Pin<&mut impl Future>,
) -> Result<Option<OwnedSemaphorePermit>> {
    tokio::select! {
        permit = semaphore.acquire_owned() => Ok(Some(permit.context("Worker pool closed")?)),
        _ = shutdown => Ok(None),
    }
}
