//! `PanelServer`: wiring of hub, status machine, log pipeline and catalog
//! behind an Axum HTTP + WebSocket router.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderValue, Method};
use axum::response::Json;
use axum::routing::get;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, run_scanner};
use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::logtail::{FileTailer, LogBuffer, TailError, run_log_pipeline, run_tailer};
use crate::routes;
use crate::shutdown::ShutdownCoordinator;
use crate::status::{
    ActionExecutor, LivenessProbe, StatusFeed, StatusMachine, StatusUpdates, run_reconciler,
    run_status_forwarder,
};
use crate::websocket::{Hub, default_router};

/// Buffered status changes per SSE subscriber.
const STATUS_FEED_CAPACITY: usize = 64;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Connection registry and fan-out.
    pub hub: Arc<Hub>,
    /// Status owner.
    pub machine: Arc<StatusMachine>,
    /// Recent log lines.
    pub logs: Arc<LogBuffer>,
    /// Mod catalog.
    pub catalog: Arc<Catalog>,
    /// Status changes for SSE subscribers.
    pub feed: StatusFeed,
    /// Log lines in a snapshot.
    pub snapshot_lines: usize,
    /// When the panel started.
    pub start_time: Instant,
}

/// Inputs consumed by [`PanelServer::spawn_background`].
struct Background {
    updates: StatusUpdates,
    tailer: FileTailer,
}

/// The panel server.
pub struct PanelServer {
    config: ServerConfig,
    state: AppState,
    shutdown: Arc<ShutdownCoordinator>,
    background: Mutex<Option<Background>>,
}

impl PanelServer {
    /// Detect the initial status, prime the log buffer, read the catalog and
    /// construct every shared component. Nothing runs until
    /// [`spawn_background`](Self::spawn_background) and [`listen`](Self::listen).
    pub async fn build(
        config: ServerConfig,
        executor: Arc<dyn ActionExecutor>,
        probe: Arc<dyn LivenessProbe>,
    ) -> Self {
        let initial = StatusMachine::detect_initial(probe.as_ref()).await;
        let (machine, updates) = StatusMachine::new(initial, executor, probe, config.status);
        let machine = Arc::new(machine);

        let logs = Arc::new(LogBuffer::new(config.logs.buffer_lines));
        let tailer = FileTailer::open_at_end(&config.logs.path).await;
        match tailer.prime(config.logs.snapshot_lines).await {
            Ok(lines) => {
                debug!(count = lines.len(), "primed log buffer");
                for line in lines {
                    let _ = logs.push(line);
                }
            }
            Err(TailError::Missing(path)) => {
                warn!(path = %path.display(), "log file missing at startup");
            }
            Err(e) => warn!(error = %e, "failed to prime log buffer"),
        }

        let catalog = Arc::new(Catalog::new(&config.catalog));
        if let Err(e) = catalog.refresh().await {
            warn!(error = %e, dir = %catalog.dir().display(), "initial catalog read failed");
        }

        let router = default_router(
            Arc::clone(&machine),
            Arc::clone(&logs),
            Arc::clone(&catalog),
            config.logs.snapshot_lines,
        );
        let hub = Arc::new(Hub::new(config.hub, router));

        let state = AppState {
            hub,
            machine,
            logs,
            catalog,
            feed: StatusFeed::new(STATUS_FEED_CAPACITY),
            snapshot_lines: config.logs.snapshot_lines,
            start_time: Instant::now(),
        };
        info!(status = %initial, "panel server built");

        Self {
            config,
            state,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            background: Mutex::new(Some(Background { updates, tailer })),
        }
    }

    /// Start the status forwarder, log tailer and flusher, reconciler and
    /// catalog scanner. Only the first call has an effect.
    pub fn spawn_background(&self) {
        let Some(Background { updates, tailer }) = self.background.lock().take() else {
            warn!("background tasks already running");
            return;
        };
        let token = self.shutdown.token();
        let state = &self.state;

        self.shutdown.spawn(
            "status_forwarder",
            run_status_forwarder(
                updates,
                Arc::clone(&state.hub),
                state.feed.clone(),
                token.clone(),
            ),
        );

        let (lines_tx, lines_rx) = mpsc::channel(self.config.logs.queue_capacity.max(1));
        self.shutdown.spawn(
            "log_tailer",
            run_tailer(tailer, lines_tx, self.config.logs.poll_interval, token.clone()),
        );
        self.shutdown.spawn(
            "log_pipeline",
            run_log_pipeline(
                lines_rx,
                Arc::clone(&state.logs),
                Arc::clone(&state.hub),
                self.config.logs.flush_interval,
                token.clone(),
            ),
        );
        self.shutdown.spawn(
            "reconciler",
            run_reconciler(
                Arc::clone(&state.machine),
                self.config.reconcile_interval,
                token.clone(),
            ),
        );
        self.shutdown.spawn(
            "catalog_scanner",
            run_scanner(
                Arc::clone(&state.catalog),
                Arc::clone(&state.hub),
                self.config.catalog.scan_interval,
                token,
            ),
        );
        info!(tasks = self.shutdown.task_count(), "background tasks started");
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .nest("/api/v2", routes::api_routes())
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer(&self.config.allowed_origins))
    }

    /// Bind and serve until shutdown. Returns the bound address and the
    /// serve task.
    pub async fn listen(&self) -> io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;
        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();
        let token = self.shutdown.token();

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                warn!(error = %e, "http server error");
            }
        });
        info!(%addr, "mcpanel listening");
        Ok((addr, handle))
    }

    /// Cancel actions, close every client and stop background tasks.
    pub async fn graceful_shutdown(&self, timeout: Option<Duration>) {
        self.state.machine.shutdown();
        self.state.hub.close_all().await;
        self.shutdown.graceful_shutdown(timeout).await;
    }

    /// Shared handler state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Connection registry.
    pub fn hub(&self) -> &Arc<Hub> {
        &self.state.hub
    }

    /// Status owner.
    pub fn machine(&self) -> &Arc<StatusMachine> {
        &self.state.machine
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Permissive when no origins are configured.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any)
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.hub.connection_count().await;
    Json(health::health_check(
        state.start_time,
        connections,
        state.machine.status(),
    ))
}
