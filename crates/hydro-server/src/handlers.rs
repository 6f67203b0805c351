//! HTTP Handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use agent_core::{
    provider::ModelInfo, Agent, AgentConfig, AgentError, GenerationOptions, Message, SaveOutcome,
    Session, SessionId, SessionStore, ToolResult,
};
use hydro_advisor::{
    assistant_prompt, svckit::TOOL_NAME, HydroError, LoadReport, QueryAnswer, SchemaSnapshot,
};

use crate::state::AppState;

type ApiError = (StatusCode, Json<ErrorResponse>);

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub ollama_connected: bool,
    pub database_ready: bool,
    pub model: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub message: String,
    pub conversation_id: String,
    pub model: String,
    /// SQL run by `text_to_sql` while answering, in call order
    pub queries: Vec<String>,
    /// False when a database reset dropped the conversation mid-reply
    pub saved: bool,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub question: String,
}

#[derive(Debug, Deserialize)]
pub struct SchemaParams {
    #[serde(default)]
    pub sample_limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SchemaResponse {
    pub summary: String,
    pub snapshot: SchemaSnapshot,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub report: LoadReport,
    pub sessions_cleared: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

fn api_error(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

fn agent_error(e: &AgentError) -> ApiError {
    tracing::error!("Agent error: {}", e);
    let status = if e.is_retryable() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    api_error(status, e.user_message(), "AGENT_ERROR")
}

fn hydro_error(e: &HydroError) -> ApiError {
    tracing::error!("Database error: {}", e);
    let (status, code) = match e {
        HydroError::SourceMissing(_) => (StatusCode::SERVICE_UNAVAILABLE, "SOURCE_MISSING"),
        HydroError::NotInitialized(_) => (StatusCode::SERVICE_UNAVAILABLE, "DATABASE_NOT_READY"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
    };
    api_error(status, e.user_message(), code)
}

/// Run SQLite work on the blocking pool
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> hydro_advisor::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result.map_err(|e| hydro_error(&e)),
        Err(e) => {
            tracing::error!("Blocking task failed: {}", e);
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "An unexpected error occurred.",
                "TASK_FAILED",
            ))
        }
    }
}

/// Queries `text_to_sql` actually ran; unmatched questions are skipped
fn executed_queries(results: &[ToolResult]) -> Vec<String> {
    results
        .iter()
        .filter(|r| r.name == TOOL_NAME)
        .filter_map(|r| r.data.clone())
        .filter_map(|data| serde_json::from_value::<QueryAnswer>(data).ok())
        .filter(QueryAnswer::is_match)
        .map(|answer| answer.query)
        .collect()
}

/// System prompt for a new conversation, describing the live schema
async fn conversation_prompt(state: &AppState) -> String {
    let summarizer = state.summarizer.clone();
    let limit = state.sample_limit;

    match blocking(move || summarizer.summarize(limit)).await {
        Ok(schema) => assistant_prompt(&schema),
        Err((_, Json(e))) => {
            tracing::warn!(error = %e.error, "Starting conversation without a schema summary");
            assistant_prompt("(the database is not available right now)")
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let ollama_connected = state.provider.health_check().await.unwrap_or(false);

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        ollama_connected,
        database_ready: state.store().is_initialized(),
        model: state.generation.model.clone(),
    })
}

/// Models the provider can serve
pub async fn list_models(State(state): State<AppState>) -> Result<Json<Vec<ModelInfo>>, ApiError> {
    let models = state.provider.list_models().await.map_err(|e| agent_error(&e))?;
    Ok(Json(models))
}

/// Chat endpoint. A conversation keeps its history and its system prompt
/// between calls; an unknown `conversation_id` starts a new one under that id.
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = payload.message.trim();
    if message.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Message must not be empty",
            "EMPTY_MESSAGE",
        ));
    }

    let id = payload
        .conversation_id
        .as_deref()
        .map_or_else(SessionId::new, SessionId::from_string);
    let (existing, version) = state
        .sessions
        .load_versioned(&id)
        .map_err(|e| agent_error(&e))?;

    let model = payload
        .model
        .clone()
        .or_else(|| existing.as_ref().map(|s| s.model.clone()))
        .unwrap_or_else(|| state.generation.model.clone());

    let mut config = AgentConfig {
        generation: GenerationOptions {
            model: model.clone(),
            ..state.generation.clone()
        },
        ..Default::default()
    };
    if existing.is_none() {
        config.system_prompt = conversation_prompt(&state).await;
    }
    let agent = Agent::new(state.provider.clone(), state.tools.clone(), config);

    let mut session = existing.unwrap_or_else(|| {
        tracing::info!(conversation_id = %id, "Starting conversation");
        Session::new(id, &model, agent.build_system_prompt())
    });
    session.model = model;

    session.conversation.push(Message::user(message));
    let reply = agent
        .run(&mut session.conversation)
        .await
        .map_err(|e| agent_error(&e))?;

    session.touch();
    let saved = match state
        .sessions
        .save_if_current(&session, version)
        .map_err(|e| agent_error(&e))?
    {
        SaveOutcome::Saved => true,
        SaveOutcome::Cleared => {
            // The prompt describes a schema that no longer exists.
            tracing::warn!(conversation_id = %session.id, "Database was reset mid-reply, conversation not kept");
            false
        }
        SaveOutcome::Conflict => {
            tracing::warn!(conversation_id = %session.id, "Conversation changed mid-reply");
            return Err(api_error(
                StatusCode::CONFLICT,
                "This conversation changed while answering. Please send the message again.",
                "CONVERSATION_CHANGED",
            ));
        }
    };

    tracing::info!(
        conversation_id = %session.id,
        iterations = reply.iterations,
        tool_calls = reply.tool_results.len(),
        "Answered chat message"
    );

    Ok(Json(ChatResponse {
        queries: executed_queries(&reply.tool_results),
        message: reply.content,
        conversation_id: session.id.to_string(),
        model: session.model,
        saved,
    }))
}

/// Forget a conversation
pub async fn delete_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let removed = state
        .sessions
        .delete(&SessionId::from_string(&id))
        .map_err(|e| agent_error(&e))?;

    if removed {
        tracing::info!(conversation_id = %id, "Conversation cleared");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(api_error(
            StatusCode::NOT_FOUND,
            "Conversation not found",
            "CONVERSATION_NOT_FOUND",
        ))
    }
}

/// Run the text-to-SQL façade without the model in the loop
pub async fn query_handler(
    State(state): State<AppState>,
    Json(payload): Json<QueryRequest>,
) -> Result<Json<QueryAnswer>, ApiError> {
    let facade = state.facade.clone();
    let answer = blocking(move || Ok(facade.answer(&payload.question))).await?;
    Ok(Json(answer))
}

/// Schema summary as prompt text plus the structured snapshot
pub async fn schema_handler(
    State(state): State<AppState>,
    Query(params): Query<SchemaParams>,
) -> Result<Json<SchemaResponse>, ApiError> {
    let summarizer = state.summarizer.clone();
    let limit = params.sample_limit.unwrap_or(state.sample_limit);

    let snapshot = blocking(move || summarizer.snapshot(limit)).await?;
    Ok(Json(SchemaResponse {
        summary: snapshot.to_prompt_text(),
        snapshot,
    }))
}

/// Rebuild the database from the workbook. Conversations are dropped: their
/// prompts describe the old schema.
pub async fn reset_database(State(state): State<AppState>) -> Result<Json<ResetResponse>, ApiError> {
    let store = state.store().clone();
    let report = blocking(move || store.reset()).await?;

    let sessions_cleared = state.sessions.clear().map_err(|e| agent_error(&e))?;
    tracing::info!(
        loaded = report.loaded.len(),
        failed = report.failed.len(),
        sessions_cleared,
        "Database reset"
    );

    Ok(Json(ResetResponse {
        report,
        sessions_cleared,
    }))
}
