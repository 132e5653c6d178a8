use axum::{
    Router,
    body::Bytes,
    extract::{Json, Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::borrow::Cow;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::core::{RawSimulationInput, SimulationConstants, simulate};
use crate::error::{StoreError, StoreResult};
use crate::report::{
    REPORT_CONTENT_TYPE, ReportContext, render_report, report_filename, validate_email,
};
use crate::store::{Scenario, ScenarioStore};

const INDEX_HTML: &str = include_str!("../../web/index.html");
const STYLES_CSS: &str = include_str!("../../web/styles.css");
const APP_JS: &str = include_str!("../../web/app.js");

/// Store calls are synchronous SQLite work behind a mutex, so handlers run them
/// on the blocking pool through `with_store`.
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn ScenarioStore>,
    constants: SimulationConstants,
}

impl AppState {
    pub fn new(store: Arc<dyn ScenarioStore>, constants: SimulationConstants) -> Self {
        Self { store, constants }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(msg) => {
                log::warn!("Rejected request: {msg}");
                error_response(StatusCode::BAD_REQUEST, &msg)
            }
            ApiError::NotFound(msg) => error_response(StatusCode::NOT_FOUND, &msg),
            ApiError::Store(StoreError::NotFound { .. }) => {
                error_response(StatusCode::NOT_FOUND, "Scenario not found")
            }
            ApiError::Store(e) => internal_error(&e),
            ApiError::Task(e) => internal_error(&e),
        }
    }
}

fn internal_error(e: &dyn std::error::Error) -> Response {
    log::error!("Store failure: {e}");
    json_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorResponse {
            error: "Internal server error".to_string(),
            details: Some(e.to_string()),
        },
    )
}

type ApiResult = Result<Response, ApiError>;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SaveScenarioPayload {
    scenario_name: Option<Value>,
    #[serde(flatten)]
    inputs: RawSimulationInput,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReportPayload {
    email: Option<Value>,
    scenario_id: Option<Value>,
    #[serde(flatten)]
    inputs: RawSimulationInput,
}

#[derive(Debug, Serialize)]
struct DeleteResponse {
    deleted: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Trimmed, non-empty string content of a loosely-typed field.
fn non_blank(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Absent or null means "no scenario". Anything else must name one.
fn requested_scenario_id(value: Option<&Value>) -> Result<Option<&str>, ApiError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => non_blank(Some(v)).map(Some).ok_or_else(|| {
            ApiError::Validation("scenario_id must be a non-empty string".to_string())
        }),
    }
}

/// Request bodies are parsed leniently: a numeric literal too large for an
/// `f64` becomes `null`, which the engine treats as a missing field.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    fn invalid(e: impl std::fmt::Display) -> ApiError {
        ApiError::Validation(format!("Invalid JSON body: {e}"))
    }
    let text = std::str::from_utf8(body).map_err(invalid)?;
    serde_json::from_str(&null_out_of_range_numbers(text)).map_err(invalid)
}

fn null_out_of_range_numbers(text: &str) -> Cow<'_, str> {
    let bytes = text.as_bytes();
    let mut rewritten: Option<String> = None;
    let mut copied = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        match b {
            b'"' => {
                in_string = true;
                i += 1;
            }
            b'-' | b'0'..=b'9' => {
                let start = i;
                while i < bytes.len()
                    && matches!(bytes[i], b'-' | b'+' | b'.' | b'e' | b'E' | b'0'..=b'9')
                {
                    i += 1;
                }
                let literal = &text[start..i];
                if literal.parse::<f64>().is_ok_and(f64::is_infinite) {
                    let out = rewritten.get_or_insert_with(|| String::with_capacity(text.len()));
                    out.push_str(&text[copied..start]);
                    out.push_str("null");
                    copied = i;
                }
            }
            _ => i += 1,
        }
    }
    match rewritten {
        Some(mut out) => {
            out.push_str(&text[copied..]);
            Cow::Owned(out)
        }
        None => Cow::Borrowed(text),
    }
}

/// Runs a store call on the blocking pool so SQLite I/O never stalls the
/// async workers.
async fn with_store<T, F>(state: &AppState, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&dyn ScenarioStore) -> StoreResult<T> + Send + 'static,
{
    let store = Arc::clone(&state.store);
    let result = tokio::task::spawn_blocking(move || op(store.as_ref())).await?;
    Ok(result?)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/styles.css", get(styles_handler))
        .route("/app.js", get(app_js_handler))
        .route("/health", get(health_handler))
        .route("/simulate", post(simulate_handler))
        .route(
            "/scenarios",
            get(list_scenarios_handler).post(save_scenario_handler),
        )
        .route(
            "/scenarios/:id",
            get(get_scenario_handler).delete(delete_scenario_handler),
        )
        .route("/report/generate", post(generate_report_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

pub async fn run_http_server(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let app = router(state);
    let listener = TcpListener::bind(addr).await?;
    log::info!("Invoice ROI API listening on http://{addr}");
    log::info!("Local access: http://127.0.0.1:{}/", addr.port());

    axum::serve(listener, app).await
}

async fn index_handler() -> impl IntoResponse {
    with_cache_control(Html(INDEX_HTML))
}

async fn styles_handler() -> impl IntoResponse {
    with_cache_control((
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        STYLES_CSS,
    ))
}

async fn app_js_handler() -> impl IntoResponse {
    with_cache_control((
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        APP_JS,
    ))
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult {
    let raw: RawSimulationInput = parse_body(&body)?;
    let output = simulate(&raw, &state.constants);
    Ok(json_response(StatusCode::OK, output.public_view()))
}

async fn save_scenario_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult {
    let payload: SaveScenarioPayload = parse_body(&body)?;
    let name = non_blank(payload.scenario_name.as_ref())
        .ok_or_else(|| ApiError::Validation("scenario_name is required".to_string()))?;

    let output = simulate(&payload.inputs, &state.constants);
    let scenario = Scenario::new(name, &output);
    let scenario = with_store(&state, move |store| {
        store.insert(&scenario)?;
        Ok(scenario)
    })
    .await?;
    log::info!("Saved scenario {} ({name})", scenario.id);

    Ok(json_response(StatusCode::CREATED, scenario))
}

async fn list_scenarios_handler(State(state): State<AppState>) -> ApiResult {
    let scenarios = with_store(&state, |store| store.list_all()).await?;
    log::debug!("Listed {} scenarios", scenarios.len());
    Ok(json_response(StatusCode::OK, scenarios))
}

async fn get_scenario_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult {
    let scenario = with_store(&state, move |store| store.get_by_id(&id)).await?;
    Ok(json_response(StatusCode::OK, scenario))
}

async fn delete_scenario_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult {
    let target = id.clone();
    with_store(&state, move |store| store.delete_by_id(&target)).await?;
    log::info!("Deleted scenario {id}");
    Ok(json_response(StatusCode::OK, DeleteResponse { deleted: id }))
}

async fn generate_report_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult {
    let payload: ReportPayload = parse_body(&body)?;
    let email = non_blank(payload.email.as_ref())
        .filter(|email| validate_email(email))
        .ok_or_else(|| ApiError::Validation("A valid email address is required".to_string()))?;

    let requested = requested_scenario_id(payload.scenario_id.as_ref())?;
    let (scenario_name, inputs, results) = match requested {
        Some(id) => {
            let id = id.to_string();
            let scenario = with_store(&state, move |store| store.get_by_id(&id))
                .await
                .map_err(|e| match e {
                    ApiError::Store(StoreError::NotFound { id }) => {
                        ApiError::NotFound(format!("Scenario '{id}' not found"))
                    }
                    other => other,
                })?;
            (Some(scenario.scenario_name), scenario.inputs, scenario.results)
        }
        None => {
            let output = simulate(&payload.inputs, &state.constants);
            (None, output.inputs, output.results)
        }
    };

    let html = render_report(&ReportContext {
        email,
        scenario_name: scenario_name.as_deref(),
        inputs: &inputs,
        results: &results,
        generated_at: Utc::now(),
    });
    let filename = report_filename(scenario_name.as_deref());
    log::info!("Generated report {filename} for {email}");

    let disposition = format!("attachment; filename=\"{filename}\"");
    Ok(with_cache_control((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, REPORT_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        html,
    )))
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
            details: None,
        },
    )
}
