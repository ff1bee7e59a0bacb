//! Axum JSON API over the data bridge: sync trigger, dashboard, client
//! directory/overview and the notification center.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use databridge_core::{Clock, Notification, SystemClock};
use databridge_insights::{HealthWeights, Insights};
use databridge_storage::Store;
use databridge_sync::{maybe_build_scheduler, BridgeConfig, Notifier, SyncEngine};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{error, info};

pub const CRATE_NAME: &str = "databridge-web";

/// The engine lock also guards every notification write, so request
/// handlers and the scheduler never interleave read-modify-write cycles.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub engine: Arc<Mutex<SyncEngine>>,
    pub insights: Arc<Insights>,
}

impl AppState {
    pub fn new(store: Store, weights: HealthWeights) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), weights)
    }

    pub fn with_clock(store: Store, clock: Arc<dyn Clock>, weights: HealthWeights) -> Self {
        let engine = SyncEngine::with_clock(store.clone(), Arc::clone(&clock));
        let insights = Insights::with_clock(store.clone(), clock).with_weights(weights);
        Self {
            store,
            engine: Arc::new(Mutex::new(engine)),
            insights: Arc::new(insights),
        }
    }

    /// Runs `work` against the notifier on the blocking pool while holding
    /// the engine lock.
    async fn with_notifier<T, F>(&self, work: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Notifier) -> T + Send + 'static,
    {
        let engine = Arc::clone(&self.engine).lock_owned().await;
        run_blocking(move || work(engine.notifier())).await
    }
}

#[derive(Debug, Deserialize, Default)]
struct NotificationsQuery {
    #[serde(default)]
    unread: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NotificationsBody {
    notifications: Vec<Notification>,
    unread_count: usize,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/sync", post(sync_handler))
        .route("/api/dashboard", get(dashboard_handler))
        .route("/api/clients", get(clients_handler))
        .route("/api/clients/{name}", get(client_overview_handler))
        .route(
            "/api/notifications",
            get(notifications_handler).delete(clear_notifications_handler),
        )
        .route("/api/notifications/read-all", post(mark_all_read_handler))
        .route("/api/notifications/{id}", delete(delete_notification_handler))
        .route("/api/notifications/{id}/read", post(mark_read_handler))
        .with_state(Arc::new(state))
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    let config = BridgeConfig::from_env();
    let port: u16 = std::env::var("DATABRIDGE_WEB_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);

    let store = config.open_store()?;
    let weights = HealthWeights::from_yaml_file(&config.health_rules_path())?;
    let state = AppState::new(store, weights);

    let scheduler = maybe_build_scheduler(&config, Arc::clone(&state.engine)).await?;
    if let Some(sched) = &scheduler {
        sched.start().await.context("starting sync scheduler")?;
        info!(cron = %config.sync_cron, "sync scheduler started");
    }

    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("binding port {port}"))?;
    info!(port, data_dir = %config.data_dir.display(), "serving data bridge api");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn sync_handler(State(state): State<Arc<AppState>>) -> Response {
    let engine = Arc::clone(&state.engine).lock_owned().await;
    match run_blocking(move || engine.run_all()).await {
        Ok(report) => Json(report).into_response(),
        Err(err) => server_error(err),
    }
}

async fn dashboard_handler(State(state): State<Arc<AppState>>) -> Response {
    let insights = Arc::clone(&state.insights);
    match run_blocking(move || insights.dashboard_stats()).await {
        Ok(stats) => Json(stats).into_response(),
        Err(err) => server_error(err),
    }
}

async fn clients_handler(State(state): State<Arc<AppState>>) -> Response {
    let insights = Arc::clone(&state.insights);
    match run_blocking(move || insights.all_client_names()).await {
        Ok(names) => Json(names).into_response(),
        Err(err) => server_error(err),
    }
}

async fn client_overview_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Response {
    let insights = Arc::clone(&state.insights);
    match run_blocking(move || insights.client_overview(&name)).await {
        Ok(overview) => Json(overview).into_response(),
        Err(err) => server_error(err),
    }
}

/// Reads strictly so a corrupt collection shows up as a 500 instead of an
/// empty bell menu.
async fn notifications_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NotificationsQuery>,
) -> Response {
    let store = state.store.clone();
    let loaded = run_blocking(move || store.try_load::<Notification>())
        .await
        .and_then(|res| res.context("loading notifications"));
    let all = match loaded {
        Ok(all) => all,
        Err(err) => return server_error(err),
    };
    let unread_count = all.iter().filter(|n| !n.read).count();
    let notifications = if query.unread {
        all.into_iter().filter(|n| !n.read).collect()
    } else {
        all
    };
    Json(NotificationsBody {
        notifications,
        unread_count,
    })
    .into_response()
}

async fn mark_read_handler(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.with_notifier(move |n| n.mark_read(&id)).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => not_found("notification not found"),
        Err(err) => server_error(err),
    }
}

async fn mark_all_read_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.with_notifier(|n| n.mark_all_read()).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => server_error(err),
    }
}

async fn delete_notification_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.with_notifier(move |n| n.delete(&id)).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => not_found("notification not found"),
        Err(err) => server_error(err),
    }
}

async fn clear_notifications_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.with_notifier(|n| n.clear()).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => server_error(err),
    }
}

/// Store access is synchronous file I/O; keep it off the async workers.
async fn run_blocking<T, F>(work: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .context("blocking task failed")
}

fn not_found(message: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
}

fn server_error(err: anyhow::Error) -> Response {
    error!(error = %format!("{err:#}"), "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": format!("{err:#}") })),
    )
        .into_response()
}
