//! Census - network topology metadata service

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use census::{
    config::Args,
    db::{DocumentStore, MemoryStore, MongoStore},
    engine::Engine,
    schema::SchemaRegistry,
    server::{self, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("census={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Print startup banner
    info!("======================================");
    info!("  Census - Topology Metadata Service");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Base URL: {}", args.base_url());
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {}", args.mongodb_uri);
    info!("Sweep interval: {}s", args.sweep_interval_secs);
    info!("======================================");

    // Compile the embedded schema corpus
    let schemas = match SchemaRegistry::new() {
        Ok(registry) => registry,
        Err(e) => {
            error!("Schema registry failed to initialize: {}", e);
            std::process::exit(1);
        }
    };

    // Connect to MongoDB (in-memory fallback in dev mode)
    let store: Arc<dyn DocumentStore> =
        match MongoStore::connect(&args.mongodb_uri, &args.mongodb_db).await {
            Ok(store) => {
                info!("MongoDB connected successfully");
                Arc::new(store)
            }
            Err(e) => {
                if args.dev_mode {
                    warn!("MongoDB connection failed (dev mode, using in-memory store): {}", e);
                    Arc::new(MemoryStore::new())
                } else {
                    error!("MongoDB connection failed: {}", e);
                    std::process::exit(1);
                }
            }
        };

    let engine = Engine::new(store, schemas, &args.base_url());
    let state = Arc::new(AppState::new(args, engine));

    // Run the server
    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
