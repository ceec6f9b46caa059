//! Engram Server - persistent memory for AI assistants
//!
//! Wires the memory engine together and serves the HTTP API the protocol
//! bridge consumes: capture, retrieval, semantic search, consolidation, and
//! stats. All upstream services (embedding model, generative model, vector
//! store) are external; misconfiguration is fatal at startup.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use engram_core::{
    event_queue, AssociationTracker, ConsolidationEngine, EngramConfig, InMemoryStore, Journal,
    MemoryProcessor, OllamaEmbedder, OllamaGenerator, QdrantStore, VectorStore,
};
use engram_server::api::{router, AppState};

/// Parse command-line arguments. Returns whether to run with the in-memory
/// store (diagnostics mode). Exits on `--help`/`--version`.
fn parse_args() -> bool {
    let mut in_memory = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => {
                println!("Engram Server v{}", env!("CARGO_PKG_VERSION"));
                println!();
                println!("Persistent memory engine with an HTTP journal API.");
                println!();
                println!("USAGE:");
                println!("    engram-server [OPTIONS]");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help        Print help information");
                println!("    -V, --version     Print version information");
                println!("    --in-memory       Use the in-memory vector store (diagnostics)");
                println!();
                println!("ENVIRONMENT:");
                println!("    RUST_LOG                    Log level filter (debug, info, warn, error)");
                println!("    ENGRAM_HTTP_ADDR            Bind address (default 127.0.0.1:8543)");
                println!("    ENGRAM_QDRANT_URL           Vector store endpoint (default http://localhost:6333)");
                println!("    ENGRAM_OLLAMA_URL           Model endpoint (default http://localhost:11434)");
                println!("    ENGRAM_EMBEDDING_MODEL      Embedding model name");
                println!("    ENGRAM_GENERATIVE_MODEL     Consolidation model name");
                println!();
                println!("See the repository README for the full variable list.");
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("engram-server {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--in-memory" => in_memory = true,
            arg => {
                eprintln!("error: unknown argument '{arg}'");
                eprintln!("Try 'engram-server --help' for more information.");
                std::process::exit(1);
            }
        }
    }
    in_memory
}

#[tokio::main]
async fn main() {
    let in_memory = parse_args();

    // Logging to stderr; stdout stays clean for process supervisors
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    info!("Engram Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = match EngramConfig::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!("fatal configuration error: {e}");
            std::process::exit(1);
        }
    };

    // Vector store
    let store: Arc<dyn VectorStore> = if in_memory {
        warn!("running with the in-memory vector store; nothing will persist");
        Arc::new(InMemoryStore::new())
    } else {
        Arc::new(QdrantStore::new(
            &config.qdrant_url,
            config.embedding_dimensions,
            config.store_timeout,
        ))
    };
    if let Err(e) = store.ensure_collections(config.embedding_dimensions).await {
        error!("failed to initialize vector store collections: {e}");
        std::process::exit(1);
    }
    info!(
        dimensions = config.embedding_dimensions,
        "vector store collections ready"
    );

    // Upstream model clients
    let embedder = Arc::new(OllamaEmbedder::new(
        &config.ollama_url,
        &config.embedding_model,
        config.embedding_dimensions,
        config.embed_timeout,
    ));
    let generator = Arc::new(OllamaGenerator::new(
        &config.ollama_url,
        &config.generative_model,
        config.llm_timeout,
    ));
    info!(
        embedding_model = %config.embedding_model,
        generative_model = %config.generative_model,
        "model clients ready"
    );

    // Engine wiring: queue -> journal -> tracker -> consolidation -> worker
    let (handle, queue) = event_queue(config.queue_capacity);
    let journal = Arc::new(Journal::new(
        Arc::clone(&store),
        embedder,
        handle,
        &config,
    ));
    let tracker = AssociationTracker::new(Arc::clone(&store), Arc::clone(&config));
    let engine = Arc::new(ConsolidationEngine::new(
        Arc::clone(&journal),
        generator,
        Arc::clone(&config),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = MemoryProcessor::new(
        Arc::clone(&journal),
        tracker,
        Arc::clone(&engine),
        &config,
    )
    .spawn(queue, shutdown_rx);

    // HTTP surface
    let state = AppState {
        journal,
        engine,
        store,
        config: Arc::clone(&config),
    };
    let app = router(state);

    let listener = match tokio::net::TcpListener::bind(&config.http_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %config.http_addr, "failed to bind: {e}");
            std::process::exit(1);
        }
    };
    info!(addr = %config.http_addr, prefix = %config.api_prefix, "journal API listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("server error: {e}");
        std::process::exit(1);
    }

    // Let the worker drain the queue before exit
    let _ = shutdown_tx.send(true);
    let drain_budget = config.drain_timeout + Duration::from_secs(5);
    if tokio::time::timeout(drain_budget, worker).await.is_err() {
        warn!("worker did not stop within the drain budget");
    }

    info!("Engram Server shutting down");
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl+c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
