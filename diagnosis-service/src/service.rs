use axum::{
    Router,
    extract::{Path, Request, State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode},
    middleware::{Next, from_fn},
    response::{Json, Response},
    routing::{get, post},
};
use diagnostic_flow::{
    Article, EuropePmcClient, FlowError, InMemorySessionStorage, LiteratureSource, Recommender,
    RecommendedTest, RigAdvisor, SessionStorage,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

use crate::{
    config::ServiceConfig,
    models::{
        EXPECTED_STRING_ARRAY, LiteratureRequest, NO_KEYWORDS, NextTestRequest, NextTestResponse,
        ReceiveResponse, SYMPTOMS_REQUIRED, SessionResponse,
    },
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "session_id": id
        })),
    )
}

fn upstream_error(message: &str) -> ApiError {
    (StatusCode::BAD_GATEWAY, Json(json!({ "error": message })))
}

fn internal_error(message: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
}

/// Map a library error onto the HTTP status the caller should see
fn flow_error(e: FlowError) -> ApiError {
    match &e {
        FlowError::Validation(message) => bad_request_error(message),
        FlowError::SessionNotFound(id) => not_found_error("Session not found", id),
        FlowError::Upstream(_) => {
            error!("Upstream dependency failed: {}", e);
            upstream_error(&e.to_string())
        }
        FlowError::Parse(_) | FlowError::Config(_) => {
            error!("Request failed: {}", e);
            internal_error(&e.to_string())
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub recommender: Arc<Recommender>,
    pub literature: Arc<dyn LiteratureSource>,
    pub session_storage: Arc<dyn SessionStorage>,
    pub literature_max_results: usize,
    pub session_history_limit: usize,
}

pub fn create_app(config: &ServiceConfig) -> anyhow::Result<Router> {
    let app_state = create_app_state(config)?;
    Ok(build_router(app_state))
}

fn create_app_state(config: &ServiceConfig) -> anyhow::Result<AppState> {
    let advisor =
        RigAdvisor::new(config.openrouter_api_key.clone()).with_model(config.model.clone());
    info!("Using model {}", advisor.model());

    let recommender = Recommender::new(Arc::new(advisor), config.cost_ladder());
    let literature = EuropePmcClient::new(config.http_timeout)?;
    info!("Literature source: {}", literature.name());

    Ok(AppState {
        recommender: Arc::new(recommender),
        literature: Arc::new(literature),
        session_storage: Arc::new(
            InMemorySessionStorage::new().with_max_sessions(config.max_sessions),
        ),
        literature_max_results: config.literature_max_results,
        session_history_limit: config.session_history_limit,
    })
}

/// Middleware to add correlation ID to all requests
async fn correlation_id_middleware(mut request: Request, next: Next) -> Response {
    let correlation_id = Uuid::new_v4().to_string();

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert("x-correlation-id", value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    next.run(request).instrument(span).await
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/receive", post(receive))
        .route("/api/next-test", post(next_test))
        .route(
            "/api/sessions/{session_id}",
            get(get_session).delete(delete_session),
        )
        .route("/literature", post(literature))
        .layer(from_fn(correlation_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root() -> &'static str {
    "server working"
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Echo a list of strings, uppercased.
async fn receive(payload: Result<Json<Value>, JsonRejection>) -> ApiResult<ReceiveResponse> {
    let Ok(Json(Value::Array(items))) = payload else {
        return Err(bad_request_error(EXPECTED_STRING_ARRAY));
    };

    let processed = items
        .iter()
        .map(|item| item.as_str().map(str::to_uppercase))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| bad_request_error(EXPECTED_STRING_ARRAY))?;

    info!("Received {} strings", processed.len());

    Ok(Json(ReceiveResponse {
        status: "success".to_string(),
        received_count: processed.len(),
        processed,
    }))
}

/// Suggest the next `n` diagnostic tests for the given symptoms.
async fn next_test(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<NextTestResponse> {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            warn!("Unreadable next-test body: {}", rejection);
            return Err(bad_request_error(SYMPTOMS_REQUIRED));
        }
    };
    let request = NextTestRequest::try_from(body).map_err(flow_error)?;

    let session_id = request
        .session_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let session = state
        .session_storage
        .append(&session_id, &request.symptoms, state.session_history_limit)
        .await
        .map_err(flow_error)?;

    info!(
        session_id = %session_id,
        symptoms = request.symptoms.len(),
        history = session.symptoms.len(),
        min_cost = request.min_cost,
        n = request.n,
        "Recommending next tests"
    );

    let recommendations = state
        .recommender
        .recommend_tests(&request.recommendation_request(), request.n)
        .await;

    let diseases = recommendations
        .first()
        .map(|rec| rec.diseases.to_vec())
        .unwrap_or_default();

    Ok(Json(NextTestResponse {
        session_id,
        all_symptoms: session.symptoms,
        diseases,
        tests: recommendations.iter().map(RecommendedTest::from).collect(),
    }))
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionResponse> {
    info!("Getting symptom history for session: {}", session_id);

    match state.session_storage.get(&session_id).await {
        Ok(Some(session)) => Ok(Json(session.into())),
        Ok(None) => Err(flow_error(FlowError::SessionNotFound(session_id))),
        Err(e) => {
            error!("Failed to load session {}: {}", session_id, e);
            Err(flow_error(e))
        }
    }
}

async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    match state.session_storage.delete(&session_id).await {
        Ok(true) => {
            info!("Deleted session {}", session_id);
            Ok(StatusCode::NO_CONTENT)
        }
        Ok(false) => Err(flow_error(FlowError::SessionNotFound(session_id))),
        Err(e) => Err(flow_error(e)),
    }
}

/// Search the literature index for the given keywords.
async fn literature(
    State(state): State<AppState>,
    payload: Result<Json<LiteratureRequest>, JsonRejection>,
) -> ApiResult<Vec<Article>> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("Unreadable literature body: {}", rejection);
            return Err(bad_request_error(NO_KEYWORDS));
        }
    };

    let query = request
        .keywords
        .as_ref()
        .and_then(|k| k.to_query())
        .ok_or_else(|| bad_request_error(NO_KEYWORDS))?;

    info!(
        source = state.literature.name(),
        query = %query,
        "Searching literature"
    );

    let articles = state
        .literature
        .search(&query, state.literature_max_results)
        .await
        .map_err(flow_error)?;

    Ok(Json(articles))
}
