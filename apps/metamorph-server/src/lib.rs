//! HTTP surface for the registry and the transformation orchestrator.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use metamorph_api::{
    ApiError, CreatePlanRequest, ErrorCode, OrchestratorApi, RegistryApi, TransitionRequest,
};
use metamorph_config::MetamorphConfig;
use metamorph_core::lifecycle::LifecycleClient;
use metamorph_core::types::{HeartbeatRequest, ServiceDescriptor, ServiceQuery, ServiceStatus};
use metamorph_runtime::{
    HealthMonitor, HttpLifecycleClient, NoopRoutingApplier, Orchestrator, PlanExecutor,
    TransitionTracker,
};
use metamorph_stores::{InMemoryPlanStore, InMemoryServiceRegistry, InMemoryStateStore};

#[derive(Clone)]
struct AppState {
    registry: RegistryApi,
    orchestrator: OrchestratorApi,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ListParams {
    status: Option<ServiceStatus>,
}

#[derive(Debug, Deserialize)]
struct ChangesParams {
    #[serde(default = "default_changes_limit")]
    limit: usize,
}

fn default_changes_limit() -> usize {
    100
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    #[serde(default = "default_history_limit")]
    limit: usize,
}

fn default_history_limit() -> usize {
    10
}

/// Wire up the stores, runtime, and HTTP router, then serve until shutdown.
pub async fn run_server(config: MetamorphConfig) -> anyhow::Result<()> {
    let registry = Arc::new(InMemoryServiceRegistry::new());
    let state_store = Arc::new(InMemoryStateStore::new());
    let plan_store = Arc::new(InMemoryPlanStore::new());
    let transitions = Arc::new(TransitionTracker::new(Arc::new(NoopRoutingApplier)));
    let lifecycle: Arc<dyn LifecycleClient> = Arc::new(HttpLifecycleClient::new());

    let executor = Arc::new(
        PlanExecutor::new(
            registry.clone(),
            state_store.clone(),
            lifecycle,
            transitions.clone(),
        )
        .with_transition_timing(
            config.transitions.timeout(),
            config.transitions.poll_interval(),
        ),
    );
    let orchestrator = Arc::new(Orchestrator::new(
        plan_store,
        state_store.clone(),
        registry.clone(),
        executor,
    ));
    orchestrator
        .ensure_initialized()
        .await
        .context("seed architecture history failed")?;

    let monitor = HealthMonitor::new(
        registry.clone(),
        config.registry.heartbeat_timeout(),
        config.registry.health_check_interval(),
    );
    let _health = monitor.spawn();

    let state = AppState {
        registry: RegistryApi::new(registry),
        orchestrator: OrchestratorApi::new(orchestrator, state_store, transitions),
    };
    let app = router(state);

    let listen: SocketAddr = config
        .server
        .listen
        .parse()
        .context("parse server.listen failed")?;
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .context("bind server listener failed")?;
    tracing::info!(%listen, "metamorph-server listening");
    axum::serve(listener, app)
        .await
        .context("server terminated with error")
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/services", post(register_service).get(list_services))
        .route(
            "/services/{id}",
            get(get_service).put(update_service).delete(deregister_service),
        )
        .route("/services/{id}/heartbeat", post(service_heartbeat))
        .route("/services/{id}/history", get(service_history))
        .route("/services/query", post(query_services))
        .route("/status", get(orchestrator_status))
        .route("/status/changes", get(status_changes))
        .route("/status/summary", get(status_summary))
        .route("/capabilities", get(capabilities))
        .route("/architecture/current", get(current_architecture))
        .route("/architecture/history", get(architecture_history))
        .route("/transformations", post(create_plan).get(list_plans))
        .route("/transformations/{id}", get(get_plan).delete(delete_plan))
        .route("/transformations/{id}/generate", post(generate_plan))
        .route("/transformations/{id}/execute", post(execute_plan))
        .route("/transitions", post(submit_transition))
        .route("/transitions/{id}", get(get_transition))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status":"ok"}))
}

async fn register_service(
    State(state): State<AppState>,
    Json(descriptor): Json<ServiceDescriptor>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let resp = state
        .registry
        .register(descriptor)
        .await
        .map_err(map_api_error)?;
    Ok((StatusCode::CREATED, Json(resp)))
}

async fn list_services(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let services = state
        .registry
        .list(params.status)
        .await
        .map_err(map_api_error)?;
    Ok(Json(services))
}

async fn get_service(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let service = state.registry.get(&id).await.map_err(map_api_error)?;
    Ok(Json(service))
}

async fn update_service(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(descriptor): Json<ServiceDescriptor>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    state
        .registry
        .update(&id, descriptor)
        .await
        .map_err(map_api_error)?;
    Ok(Json(serde_json::json!({"service_id": id, "outcome": "updated"})))
}

async fn deregister_service(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let removed = state.registry.deregister(&id).await.map_err(map_api_error)?;
    Ok(Json(removed))
}

async fn service_heartbeat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(heartbeat): Json<HeartbeatRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    state
        .registry
        .heartbeat(&id, &heartbeat)
        .await
        .map_err(map_api_error)?;
    Ok(Json(serde_json::json!({"service_id": id, "outcome": "acknowledged"})))
}

async fn service_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let history = state.registry.history(&id).await.map_err(map_api_error)?;
    Ok(Json(history))
}

async fn query_services(
    State(state): State<AppState>,
    Json(query): Json<ServiceQuery>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let services = state.registry.query(&query).await.map_err(map_api_error)?;
    Ok(Json(services))
}

async fn status_changes(
    State(state): State<AppState>,
    Query(params): Query<ChangesParams>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let changes = state
        .registry
        .status_changes(params.limit)
        .await
        .map_err(map_api_error)?;
    Ok(Json(changes))
}

async fn status_summary(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let summary = state.registry.summary().await.map_err(map_api_error)?;
    Ok(Json(summary))
}

async fn capabilities(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let report = state.registry.capabilities().await.map_err(map_api_error)?;
    Ok(Json(report))
}

async fn current_architecture(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let snapshot = state
        .orchestrator
        .current_state()
        .await
        .map_err(map_api_error)?;
    Ok(Json(snapshot))
}

async fn architecture_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let history = state
        .orchestrator
        .state_history(params.limit)
        .await
        .map_err(map_api_error)?;
    Ok(Json(history))
}

async fn create_plan(
    State(state): State<AppState>,
    Json(request): Json<CreatePlanRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let plan = state
        .orchestrator
        .create_plan(request)
        .await
        .map_err(map_api_error)?;
    Ok((StatusCode::CREATED, Json(plan)))
}

async fn list_plans(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let plans = state.orchestrator.list_plans().await.map_err(map_api_error)?;
    Ok(Json(plans))
}

async fn get_plan(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let plan = state.orchestrator.get_plan(&id).await.map_err(map_api_error)?;
    Ok(Json(plan))
}

async fn delete_plan(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    state
        .orchestrator
        .delete_plan(&id)
        .await
        .map_err(map_api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn generate_plan(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let accepted = state.orchestrator.generate(&id).await.map_err(map_api_error)?;
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

async fn execute_plan(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let accepted = state.orchestrator.execute(&id).await.map_err(map_api_error)?;
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

async fn submit_transition(
    State(state): State<AppState>,
    Json(request): Json<TransitionRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let resp = state
        .orchestrator
        .submit_transition(request)
        .await
        .map_err(map_api_error)?;
    Ok((StatusCode::ACCEPTED, Json(resp)))
}

async fn get_transition(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let transition = state
        .orchestrator
        .transition(&id)
        .await
        .map_err(map_api_error)?;
    Ok(Json(transition))
}

async fn orchestrator_status(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let status = state.orchestrator.status().await.map_err(map_api_error)?;
    Ok(Json(status))
}

fn map_api_error(err: ApiError) -> (StatusCode, Json<ErrorBody>) {
    let (status, code) = match err.code() {
        ErrorCode::NotFound => (StatusCode::NOT_FOUND, "not_found"),
        ErrorCode::InvalidState => (StatusCode::CONFLICT, "invalid_state"),
        ErrorCode::Conflict => (StatusCode::CONFLICT, "conflict"),
        ErrorCode::InvalidArgument => (StatusCode::BAD_REQUEST, "invalid_argument"),
        ErrorCode::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    };
    (
        status,
        Json(ErrorBody {
            code: code.to_string(),
            message: err.to_string(),
        }),
    )
}
