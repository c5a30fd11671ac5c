//! Tax Document Classifier - Entry point
//!
//! Serves the classifier over HTTP or MCP stdio, chosen by `TAXDOC_TRANSPORT`.

use std::sync::Arc;
use taxdoc_classifier::{
    load_detector, run_http, run_mcp, Classifier, OcrEngine, ServerConfig, TesseractCli,
    Transport,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // stderr only: stdout carries MCP frames
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taxdoc_classifier=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = ServerConfig::from_env()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        transport = ?config.transport,
        "Starting tax document classifier"
    );

    let detector = load_detector(&config.model_path, config.model_input_size)?;
    let ocr = TesseractCli::probe(&config.tesseract_cmd, config.tesseract_lang.clone())
        .map(|engine| Arc::new(engine) as Arc<dyn OcrEngine>);
    let classifier = Classifier::with_pdfium(detector, ocr);

    match config.transport {
        Transport::Http => run_http(&config, classifier).await,
        Transport::Mcp => run_mcp(classifier, config.sources.clone()).await,
    }
}
