//! Hydroponic Assistant HTTP Server
//!
//! Axum server exposing the chat agent, the `text_to_sql` façade and the
//! database maintenance endpoints.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{LlmProvider, MemorySessionStore, ToolRegistry};
use agent_runtime::{OllamaConfig, OllamaProvider};
use hydro_advisor::{
    tools::TextToSqlTool, DatasetStore, HydroConfig, QueryResolver, SchemaSummarizer, TextToSql,
};

use crate::handlers::{
    chat_handler, delete_chat, health_check, list_models, query_handler, reset_database,
    schema_handler,
};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    // Initialize LLM provider
    let ollama_config = OllamaConfig::from_env();
    let generation = ollama_config.generation_options();
    let provider = Arc::new(OllamaProvider::from_config(ollama_config));

    match provider.health_check().await {
        Ok(true) => {
            tracing::info!("✓ Connected to Ollama");
            if let Ok(models) = provider.list_models().await {
                for model in models {
                    tracing::info!("  Model: {}", model.id);
                }
            }
        }
        Ok(false) | Err(_) => {
            tracing::warn!("⚠ Ollama not available - chat will fail");
            tracing::warn!("  Make sure Ollama is running: ollama serve");
        }
    }

    // Build the database on first start
    let hydro_config = HydroConfig::from_env()?;
    let store = Arc::new(DatasetStore::from_config(&hydro_config));

    let bootstrap = store.clone();
    match tokio::task::spawn_blocking(move || bootstrap.ensure_initialized()).await? {
        Ok(Some(report)) => {
            tracing::info!(
                source = %report.source,
                loaded = report.loaded.len(),
                failed = report.failed.len(),
                "✓ Database built"
            );
        }
        Ok(None) => {
            tracing::info!(path = %store.db_path().display(), "✓ Using existing database");
        }
        Err(e) => {
            tracing::warn!(error = %e, "⚠ Database not available - queries will fail");
            tracing::warn!(
                "  Put one CSV per sheet in {} and call POST /api/database/reset",
                hydro_config.source_dir.display()
            );
        }
    }

    let facade = Arc::new(TextToSql::new(
        store.clone(),
        Arc::new(QueryResolver::hydroponics()),
    ));

    // Initialize tools
    let mut tools = ToolRegistry::new();
    tools.register(TextToSqlTool::new(facade.clone()));

    tracing::info!("Registered {} tools:", tools.len());
    for name in tools.names() {
        tracing::info!("  • {}", name);
    }

    // Build application state
    let state = AppState {
        provider,
        tools: Arc::new(tools),
        facade,
        summarizer: Arc::new(SchemaSummarizer::new(store)),
        sessions: Arc::new(MemorySessionStore::new()),
        generation,
        sample_limit: hydro_config.sample_limit,
    };

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        // Health & info
        .route("/health", get(health_check))
        .route("/api/models", get(list_models))

        // Agent API
        .route("/api/chat", post(chat_handler))
        .route("/api/chat/{id}", delete(delete_chat))

        // Data API
        .route("/api/query", post(query_handler))
        .route("/api/schema", get(schema_handler))
        .route("/api/database/reset", post(reset_database))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🌱 hydro-server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET    /health              - Health check");
    tracing::info!("  GET    /api/models          - List available models");
    tracing::info!("  POST   /api/chat            - Send message");
    tracing::info!("  DELETE /api/chat/{{id}}       - Start a new conversation");
    tracing::info!("  POST   /api/query           - Run text_to_sql directly");
    tracing::info!("  GET    /api/schema          - Database schema summary");
    tracing::info!("  POST   /api/database/reset  - Rebuild database from source");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
