pub mod attendance;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod ical;
pub mod invoices;
pub mod layout;
pub mod models;
pub mod openapi;
pub mod schedule;
pub mod settings;
pub mod storage;
pub mod store;
pub mod validation;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post, put},
};
use handlers::{
    attendance_counts, create_room, create_session, delete_document, delete_override, delete_room,
    delete_session, edit_schedule, get_invoices, get_payroll, get_schedule, get_schedule_ical,
    get_student_scores, healthz_live, healthz_ready, list_documents, list_rooms, list_sessions,
    move_schedule, root, update_invoice_status, update_room, update_salary_status,
    update_session_scores, upload_document,
};
use tower_http::LatencyUnit;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, info};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::ical::ScheduleExporter;
use crate::openapi::ApiDoc;
use crate::settings::Settings;
use crate::storage::StorageClient;
use crate::store::Datasheet;

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub store: Arc<Datasheet>,
    pub storage: Arc<StorageClient>,
    pub exporter: Arc<ScheduleExporter>,
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;

    let env_filter = if settings.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .without_time()
        .init();

    let state = AppState {
        settings: settings.clone(),
        store: Arc::new(Datasheet::new()),
        storage: Arc::new(StorageClient::new(
            settings.storage_base_url.clone(),
            settings.cdn_base_url.clone(),
            settings.storage_access_key.clone(),
        )),
        exporter: Arc::new(ScheduleExporter::new(settings.center_name.clone())),
    };

    let app = build_router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], state.settings.port));
    info!("Starting Tuition Center API on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        );

    let mut router = Router::new()
        .route("/", get(root))
        .route("/healthz/live", get(healthz_live))
        .route("/healthz/ready", get(healthz_ready))
        .route("/schedule", get(get_schedule))
        .route("/schedule.ical", get(get_schedule_ical))
        .route("/schedule/move", post(move_schedule))
        .route("/schedule/edit", post(edit_schedule))
        .route("/schedule/overrides/{id}", delete(delete_override))
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/{id}", put(update_room).delete(delete_room))
        .route("/attendance/counts", get(attendance_counts))
        .route("/attendance/sessions", get(list_sessions).post(create_session))
        .route("/attendance/sessions/{id}", delete(delete_session))
        .route("/attendance/sessions/{id}/scores", put(update_session_scores))
        .route("/attendance/scores", get(get_student_scores))
        .route("/invoices", get(get_invoices))
        .route("/invoices/status", put(update_invoice_status))
        .route("/payroll", get(get_payroll))
        .route("/payroll/status", put(update_salary_status))
        .route("/documents", get(list_documents).post(upload_document))
        .route("/documents/{id}", delete(delete_document))
        .with_state(state.clone());

    if state.settings.enable_swagger {
        let openapi = ApiDoc::openapi();
        let swagger = SwaggerUi::new("/docs").url("/openapi.json", openapi);
        router = router.merge(swagger);
    }

    router.layer(trace_layer)
}
