//! REST API for the box planning service.
//!
//! Provides HTTP endpoints for communication with the frontend.
//! Uses Axum as the web framework and supports CORS.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Json, Multipart, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::{StatusCode, Uri, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use utoipa::{IntoParams, OpenApi, ToSchema};

use crate::catalog::TemplateCatalog;
use crate::config::{ApiConfig, PlannerConfig};
use crate::export::{ExportConfig, render_csv};
use crate::ingest::{IngestError, counts_from_rows, rows_from_xlsx};
use crate::model::{BoxTemplate, InventoryCounts, PackingPlan, PlanSummary, ValidationError};
use crate::optimizer::{plan_inventory, plan_inventory_with_progress};
use crate::types::{ItemSize, UnitCounts};

#[derive(Clone)]
struct ApiState {
    planner: PlannerConfig,
    export: ExportConfig,
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>box-planner API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                window.ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                    presets: [SwaggerUIBundle.presets.apis],
                });
            };
        </script>
    </body>
    </html>"##;

const CSV_FILENAME: &str = "packing-plan.csv";

/// Multipart field carrying the workbook.
const UPLOAD_FIELD: &str = "file";

/// Largest accepted workbook upload (10 MiB).
const UPLOAD_LIMIT: usize = 10 * 1024 * 1024;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Embedded Web Assets (HTML, CSS, JS)
#[derive(RustEmbed)]
#[folder = "web/"]
struct WebAssets;

/// Units to plan, keyed by size identifier (`60`, `250`, `340`, `750`).
///
/// Missing or `null` sizes count as 0, negative values are clamped to 0
/// and fractions are truncated.
#[derive(Deserialize, Clone, Debug, Default, ToSchema)]
#[serde(transparent)]
pub struct CountsRequest(pub BTreeMap<String, Option<f64>>);

impl CountsRequest {
    fn into_inventory(self, limit: u32) -> Result<InventoryCounts, ValidationError> {
        let mut raw: Vec<(ItemSize, f64)> = Vec::with_capacity(self.0.len());
        for (key, value) in self.0 {
            let size = key.parse::<ItemSize>()?;
            // "60" and "60ml" name the same size.
            if raw.iter().any(|(seen, _)| *seen == size) {
                return Err(ValidationError::DuplicateSize(size));
            }
            raw.push((size, value.unwrap_or(0.0)));
        }

        let inventory = InventoryCounts::from_raw(raw);
        inventory.ensure_within(limit)?;
        Ok(inventory)
    }
}

/// Spreadsheet rows, each an object of column name to cell value.
///
/// Relevant columns: `Enhed` (unit), `Navn` (product name), `Antal` (quantity).
#[derive(Deserialize, ToSchema)]
#[schema(
    example = json!({
        "rows": [
            { "Enhed": "kolli", "Navn": "Honning 250 ml", "Antal": 8 },
            { "Enhed": "kolli", "Navn": "Saft 750 ml", "Antal": 1 }
        ]
    })
)]
pub struct IngestRequest {
    #[schema(value_type = Vec<Object>)]
    pub rows: Vec<serde_json::Value>,
}

/// Multipart form for `POST /ingest/upload`.
#[derive(ToSchema)]
#[allow(dead_code)]
struct SpreadsheetUpload {
    /// `.xlsx` workbook; only the first sheet is read.
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CatalogQuery {
    /// Build the catalog for an inventory that holds only 750 ml units.
    pub pure_750: Option<bool>,
}

/// Response structure with the planned boxes.
#[derive(Serialize, ToSchema)]
pub struct PlanResponse {
    pub counts: UnitCounts,
    pub boxes: Vec<PlanBoxRow>,
    pub summary: PlanSummary,
}

/// Single box of a plan.
///
/// # Fields
/// * `index` - Box number (1-based)
/// * `name` - Template name or partial box label
/// * `partial` - Whether the box was filled from leftovers
#[derive(Serialize, ToSchema)]
pub struct PlanBoxRow {
    pub index: usize,
    pub name: String,
    pub c60: u32,
    pub c250: u32,
    pub c340: u32,
    pub c750: u32,
    pub partial: bool,
}

#[derive(Serialize, ToSchema)]
pub struct IngestResponse {
    pub counts: UnitCounts,
    pub pretty: String,
    pub plan: PlanResponse,
}

#[derive(Serialize, ToSchema)]
pub struct CatalogResponse {
    pub pure_750: bool,
    pub templates: Vec<BoxTemplate>,
}

impl PlanResponse {
    pub fn from_plan(plan: PackingPlan) -> Self {
        let PackingPlan {
            inventory,
            boxes,
            summary,
        } = plan;

        Self {
            counts: inventory.units(),
            boxes: boxes
                .into_iter()
                .enumerate()
                .map(|(i, packed)| PlanBoxRow {
                    index: i + 1,
                    partial: packed.is_partial(),
                    name: packed.name,
                    c60: packed.units.c60,
                    c250: packed.units.c250,
                    c340: packed.units.c340,
                    c750: packed.units.c750,
                })
                .collect(),
            summary,
        }
    }
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

fn validation_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid input data",
        details,
    )
}

fn ingest_error(err: IngestError) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid spreadsheet rows",
        err.to_string(),
    )
}

fn parse_counts_request(
    payload: Result<Json<CountsRequest>, JsonRejection>,
    planner: &PlannerConfig,
) -> Result<InventoryCounts, Response> {
    let Json(payload) = payload.map_err(json_deserialize_error)?;
    payload
        .into_inventory(planner.max_units_per_size)
        .map_err(|err| validation_error(err.to_string()))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handle_plan,
        handle_plan_stream,
        handle_plan_csv,
        handle_ingest,
        handle_ingest_upload,
        handle_catalog
    ),
    components(
        schemas(
            CountsRequest,
            IngestRequest,
            SpreadsheetUpload,
            PlanResponse,
            PlanBoxRow,
            PlanSummary,
            UnitCounts,
            IngestResponse,
            CatalogResponse,
            BoxTemplate,
            ErrorResponse
        )
    ),
    tags((name = "planning", description = "Endpoints for box planning"))
)]
struct ApiDoc;

fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        // API endpoints
        .route("/plan", post(handle_plan))
        .route("/plan/stream", post(handle_plan_stream))
        .route("/plan/csv", post(handle_plan_csv))
        .route("/ingest", post(handle_ingest))
        .route(
            "/ingest/upload",
            post(handle_ingest_upload).layer(DefaultBodyLimit::max(UPLOAD_LIMIT)),
        )
        .route("/catalog", get(handle_catalog))
        // API documentation
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        // Web-UI (embedded)
        .route("/", get(serve_index))
        .route("/{*path}", get(serve_static))
        .layer(cors)
        .with_state(state)
}

/// Starts the API server.
///
/// Configures CORS for cross-origin requests from the frontend.
/// Runs until the server is terminated.
pub async fn start_api_server(
    config: ApiConfig,
    planner: PlannerConfig,
    export: ExportConfig,
) -> std::io::Result<()> {
    let app = router(ApiState { planner, export });

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|err| {
        error!("❌ Could not bind API server to {}: {}", addr, err);
        err
    })?;

    let display_host = config.display_host().to_string();
    info!(
        "🚀 Server running on http://{}:{}",
        display_host,
        config.port()
    );
    if config.binds_to_all_interfaces() && config.uses_default_host() {
        info!("💡 Local access: http://localhost:{}", config.port());
    }
    info!("📦 API Endpoints: POST /plan, POST /plan/stream, POST /plan/csv, POST /ingest, POST /ingest/upload, GET /catalog");
    info!("📑 Documentation: GET /docs, GET /docs/openapi.json");
    info!(
        "📐 Limit: {} units per size",
        planner.max_units_per_size
    );

    axum::serve(listener, app).await
}

/// Handler for POST /plan endpoint.
///
/// Takes per-size unit counts and returns the minimum-box plan.
#[utoipa::path(
    post,
    path = "/plan",
    request_body = CountsRequest,
    responses(
        (status = 200, description = "Plan computed", body = PlanResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid counts or unknown size",
            body = ErrorResponse
        )
    ),
    tag = "planning"
)]
async fn handle_plan(
    State(state): State<ApiState>,
    payload: Result<Json<CountsRequest>, JsonRejection>,
) -> impl IntoResponse {
    let inventory = match parse_counts_request(payload, &state.planner) {
        Ok(inventory) => inventory,
        Err(response) => return response,
    };

    info!("📥 New plan request: {}", inventory.pretty());
    let plan = match run_blocking(move || Ok(plan_inventory(&inventory))).await {
        Ok(plan) => plan,
        Err(response) => return response,
    };
    info!(
        "📦 Result: {} boxes ({} partial)",
        plan.box_count(),
        plan.partial_box_count()
    );

    (StatusCode::OK, Json(PlanResponse::from_plan(plan))).into_response()
}

/// Handler for POST /plan/stream endpoint (SSE).
///
/// Streams plan events in real-time as Server-Sent Events (text/event-stream).
#[utoipa::path(
    post,
    path = "/plan/stream",
    request_body = CountsRequest,
    responses(
        (
            status = 200,
            description = "Streams plan events in real-time",
            content_type = "text/event-stream",
            body = String
        ),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid counts or unknown size",
            body = ErrorResponse
        )
    ),
    tag = "planning"
)]
async fn handle_plan_stream(
    State(state): State<ApiState>,
    payload: Result<Json<CountsRequest>, JsonRejection>,
) -> impl IntoResponse {
    let inventory = match parse_counts_request(payload, &state.planner) {
        Ok(inventory) => inventory,
        Err(response) => return response,
    };

    let (tx, rx) = mpsc::channel::<String>(32);

    tokio::task::spawn_blocking(move || {
        if tx.is_closed() {
            return;
        }
        let _ = plan_inventory_with_progress(&inventory, |evt| {
            if tx.is_closed() {
                return;
            }
            if let Ok(json) = serde_json::to_string(evt) {
                // A closed receiver just means the client went away.
                let _ = tx.blocking_send(json);
            }
        });
    });

    let stream = ReceiverStream::new(rx)
        .map(|msg| Ok::<_, std::convert::Infallible>(Event::default().data(msg)));
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

/// Handler for POST /plan/csv endpoint.
///
/// Returns the plan as a delimited text table for download.
#[utoipa::path(
    post,
    path = "/plan/csv",
    request_body = CountsRequest,
    responses(
        (status = 200, description = "Plan as CSV", content_type = "text/csv", body = String),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid counts or unknown size",
            body = ErrorResponse
        )
    ),
    tag = "planning"
)]
async fn handle_plan_csv(
    State(state): State<ApiState>,
    payload: Result<Json<CountsRequest>, JsonRejection>,
) -> impl IntoResponse {
    let inventory = match parse_counts_request(payload, &state.planner) {
        Ok(inventory) => inventory,
        Err(response) => return response,
    };

    let export = state.export;
    let csv = match run_blocking(move || Ok(render_csv(&plan_inventory(&inventory), &export))).await
    {
        Ok(csv) => csv,
        Err(response) => return response,
    };
    let disposition = format!("attachment; filename=\"{CSV_FILENAME}\"");

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response()
}

/// Handler for POST /ingest endpoint.
///
/// Derives counts from spreadsheet rows and plans them in one step.
#[utoipa::path(
    post,
    path = "/ingest",
    request_body = IngestRequest,
    responses(
        (status = 200, description = "Counts detected and planned", body = IngestResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Malformed rows or counts above the limit",
            body = ErrorResponse
        )
    ),
    tag = "planning"
)]
async fn handle_ingest(
    State(state): State<ApiState>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(err) => return json_deserialize_error(err),
    };

    let limit = state.planner.max_units_per_size;
    match run_blocking(move || ingest_rows(&request.rows, limit)).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(response) => response,
    }
}

/// Handler for POST /ingest/upload endpoint.
///
/// Reads the first sheet of an uploaded `.xlsx` workbook, detects the
/// units and plans them.
#[utoipa::path(
    post,
    path = "/ingest/upload",
    request_body(content = SpreadsheetUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Counts detected and planned", body = IngestResponse),
        (status = BAD_REQUEST, description = "Broken multipart body", body = ErrorResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Missing file, unreadable workbook or counts above the limit",
            body = ErrorResponse
        )
    ),
    tag = "planning"
)]
async fn handle_ingest_upload(
    State(state): State<ApiState>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let upload = loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some(UPLOAD_FIELD) => match field.bytes().await {
                Ok(bytes) => break bytes,
                Err(err) => return upload_error(err),
            },
            Ok(Some(_)) => continue,
            Ok(None) => {
                return error_response(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "Invalid upload",
                    format!("Expected a '{UPLOAD_FIELD}' field with an .xlsx workbook"),
                );
            }
            Err(err) => return upload_error(err),
        }
    };

    info!("📄 Workbook received ({} bytes)", upload.len());
    let limit = state.planner.max_units_per_size;
    let result = run_blocking(move || {
        let rows = rows_from_xlsx(&upload).map_err(ingest_error)?;
        ingest_rows(&rows, limit)
    })
    .await;

    match result {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(response) => response,
    }
}

fn upload_error(err: MultipartError) -> Response {
    error_response(StatusCode::BAD_REQUEST, "Invalid upload", err.to_string())
}

/// Counts, validates and plans spreadsheet rows.
fn ingest_rows(rows: &[serde_json::Value], limit: u32) -> Result<IngestResponse, Response> {
    let inventory = counts_from_rows(rows).map_err(ingest_error)?;
    inventory
        .ensure_within(limit)
        .map_err(|err| validation_error(err.to_string()))?;

    info!("📥 Ingested {} rows: {}", rows.len(), inventory.pretty());
    let plan = plan_inventory(&inventory);
    info!("📦 Result: {} boxes", plan.box_count());

    Ok(IngestResponse {
        counts: inventory.units(),
        pretty: inventory.pretty(),
        plan: PlanResponse::from_plan(plan),
    })
}

/// Runs CPU-bound planning work off the async worker threads.
async fn run_blocking<T, F>(task: F) -> Result<T, Response>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, Response> + Send + 'static,
{
    tokio::task::spawn_blocking(task).await.unwrap_or_else(|err| {
        error!("❌ Planning task failed: {}", err);
        Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Planning failed",
            err.to_string(),
        ))
    })
}

/// Handler for GET /catalog endpoint.
///
/// Lists the deduplicated templates the optimizer chooses from.
#[utoipa::path(
    get,
    path = "/catalog",
    params(CatalogQuery),
    responses((status = 200, description = "Template catalog", body = CatalogResponse)),
    tag = "planning"
)]
async fn handle_catalog(Query(query): Query<CatalogQuery>) -> impl IntoResponse {
    let pure_750 = query.pure_750.unwrap_or(false);
    let catalog = TemplateCatalog::generate(pure_750);
    Json(CatalogResponse {
        pure_750,
        templates: catalog.as_slice().to_vec(),
    })
}

/// Serves the index.html main page
async fn serve_index() -> Response {
    match WebAssets::get("index.html") {
        Some(content) => Html(content.data).into_response(),
        None => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
    }
}

/// Serves static assets (JS, CSS, etc.)
async fn serve_static(uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');

    match WebAssets::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            ([(header::CONTENT_TYPE, mime.as_ref())], content.data).into_response()
        }
        None => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
    }
}

async fn serve_openapi_json() -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui() -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}
