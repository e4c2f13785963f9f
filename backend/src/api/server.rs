//! HTTP Server for the census API.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                          |
//! |--------|-------------------|--------------------------------------|
//! | GET    | `/health`         | Health check                         |
//! | POST   | `/api/census`     | Upload a census CSV, get tables back |
//! | GET    | `/api/logs`       | SSE stream for real-time logs        |
//!
//! `POST /api/census` takes a multipart form:
//!
//! | Field        | Meaning                                              |
//! |--------------|------------------------------------------------------|
//! | `file`       | The census CSV (required)                            |
//! | `by`         | Cleaner grouping, comma-separated                    |
//! | `summaryBy`  | Summarizer grouping, comma-separated                 |
//! | `where`      | Condition clause, e.g. `state != Lakes` (repeatable) |
//! | `keepTotals` | `true` to keep the pre-aggregated `Total` rows       |

use axum::{
    extract::{Multipart, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, log_success, LOG_BROADCASTER};
use super::types::{error_response, CensusResponse};
use crate::config::split_columns;
use crate::error::{ServerError, ServerResult};
use crate::transform::condition::Condition;
use crate::transform::pipeline::{process_bytes, PipelineOptions};

/// Start the HTTP server. `defaults` apply to fields a request leaves out.
pub async fn start_server(port: u16, defaults: PipelineOptions) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(defaults);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    eprintln!("🚀 Census server running on http://localhost:{}", port);
    eprintln!("   POST /api/census - Upload census CSV");
    eprintln!("   GET  /api/logs   - SSE log stream");
    eprintln!("   GET  /health     - Health check");
    eprintln!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the application router.
pub fn router(defaults: PipelineOptions) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/census", post(census_upload))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(Arc::new(defaults))
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(error_response(&self.to_string()))).into_response()
    }
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "census",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "census": "POST /api/census",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Census upload endpoint
async fn census_upload(
    State(defaults): State<Arc<PipelineOptions>>,
    mut multipart: Multipart,
) -> ServerResult<Json<CensusResponse>> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut options = PipelineOptions::clone(&defaults);
    let mut clauses: Vec<String> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        if name == "file" {
            file_name = field.file_name().map(|s| s.to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
            file_data = Some(bytes.to_vec());
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
        apply_form_field(&mut options, &mut clauses, &name, &text)?;
    }

    let bytes = file_data.ok_or_else(|| ServerError::BadRequest("No file provided".to_string()))?;

    if !clauses.is_empty() {
        let extra = Condition::parse_all(&clauses).map_err(|e| ServerError::BadRequest(e.to_string()))?;
        options.condition = Some(match options.condition.take() {
            Some(existing) => Condition::all_of(vec![existing, extra]),
            None => extra,
        });
    }

    log_info(format!(
        "📄 New upload: {} ({} bytes)",
        file_name.as_deref().unwrap_or("unknown"),
        bytes.len()
    ));

    let condition = options.effective_condition().to_string();
    let grouping = options.grouping.clone();
    let summary_grouping = options.summary_grouping.clone();

    let output = tokio::task::spawn_blocking(move || process_bytes(&bytes, &options))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
        .map_err(|e| {
            log_error(format!("Pipeline failed: {}", e));
            ServerError::from(e)
        })?;

    log_success(format!(
        "{} cleaned group(s), {} summary row(s)",
        output.cleaned.len(),
        output.summary.as_ref().map_or(0, |s| s.len())
    ));

    Ok(Json(CensusResponse::new(output, grouping, summary_grouping, condition)))
}

/// Apply one non-file form field to the request options.
fn apply_form_field(
    options: &mut PipelineOptions,
    clauses: &mut Vec<String>,
    name: &str,
    value: &str,
) -> ServerResult<()> {
    let value = value.trim();
    match name {
        "by" => {
            let cols = split_columns(value);
            if !cols.is_empty() {
                options.grouping = cols;
            }
        }
        "summaryBy" => {
            let cols = split_columns(value);
            options.summary_grouping = if cols.is_empty() { None } else { Some(cols) };
        }
        "where" => clauses.extend(value.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from)),
        "keepTotals" => {
            options.keep_totals = match value.to_ascii_lowercase().as_str() {
                "" | "0" | "false" | "no" | "off" => false,
                "1" | "true" | "yes" | "on" => true,
                other => return Err(ServerError::BadRequest(format!("Invalid keepTotals value: '{}'", other))),
            };
        }
        // Unknown fields are ignored
        _ => {}
    }
    Ok(())
}
