//! HTTP server lifecycle around a [`DispatchService`].
//!
//! Deferred startup: `new()` wires shared state, `start()` binds the TCP
//! listener, and `serve()` starts the dispatch pool and accepts requests until
//! the shutdown future resolves.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::handlers::{
    get_task_handler, get_worker_handler, health_handler, list_tasks_handler,
    list_workers_handler, liveness_handler, readiness_handler, register_worker_handler,
    submit_task_handler, AppState,
};
use super::middleware::build_http_layers;
use super::shutdown::ShutdownController;
use crate::service::DispatchService;

/// Owns the listener and the shared state handed to handlers.
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    service: Arc<DispatchService>,
    shutdown: Arc<ShutdownController>,
}

impl NetworkModule {
    /// Creates the module without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig, service: Arc<DispatchService>) -> Self {
        Self {
            config,
            listener: None,
            service,
            shutdown: Arc::new(ShutdownController::new()),
        }
    }

    #[must_use]
    pub fn service(&self) -> Arc<DispatchService> {
        Arc::clone(&self.service)
    }

    /// Other components use this to read health state or trigger shutdown.
    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Assembles the router with all routes and middleware.
    ///
    /// Routes:
    /// - `GET /health`, `GET /health/live`, `GET /health/ready`
    /// - `POST /employees`, `GET /employees`, `GET /employees/{id}`
    /// - `POST /tasks`, `GET /tasks`, `GET /tasks/{id}`
    pub fn build_router(&self) -> Router {
        router(
            &self.config,
            AppState {
                service: Arc::clone(&self.service),
                shutdown: Arc::clone(&self.shutdown),
                start_time: Instant::now(),
            },
        )
    }

    /// Binds the TCP listener and returns the bound port (OS-assigned when
    /// the configured port is 0).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        info!("TCP listener bound to {}:{}", self.config.host, port);

        self.listener = Some(listener);
        Ok(port)
    }

    /// Starts the dispatch pool and serves HTTP until `shutdown` resolves or
    /// [`ShutdownController::trigger_shutdown`] is called.
    ///
    /// Shutdown order:
    /// 1. Health state moves to Draining and readiness fails
    /// 2. The HTTP server stops accepting and finishes open requests
    /// 3. The dispatch pool drains under its drain deadline
    /// 4. Health state moves to Stopped
    ///
    /// # Errors
    ///
    /// Returns an error if the server hits a fatal I/O error.
    ///
    /// # Panics
    ///
    /// Panics if `start()` was not called before `serve()`.
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let router = self.build_router();
        let listener = self
            .listener
            .expect("start() must be called before serve()");
        let service = self.service;
        let shutdown_ctrl = self.shutdown;

        service.start();
        shutdown_ctrl.set_ready();

        let trigger = Arc::clone(&shutdown_ctrl);
        tokio::spawn(async move {
            shutdown.await;
            trigger.trigger_shutdown();
        });

        let mut signal = shutdown_ctrl.shutdown_receiver();
        info!("Serving dispatch API");

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = signal.wait_for(|stopped| *stopped).await;
            })
            .await;

        shutdown_ctrl.trigger_shutdown();
        let report = service.shutdown().await;
        if report.drained {
            info!(elapsed_ms = report.elapsed.as_millis(), "dispatch queue drained");
        } else {
            warn!(
                aborted_tasks = report.aborted_tasks,
                elapsed_ms = report.elapsed.as_millis(),
                "drain deadline expired, remaining tasks failed"
            );
        }
        shutdown_ctrl.set_stopped();

        served?;
        Ok(())
    }
}

fn router(config: &NetworkConfig, state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .route(
            "/employees",
            get(list_workers_handler).post(register_worker_handler),
        )
        .route("/employees/{id}", get(get_worker_handler))
        .route("/tasks", get(list_tasks_handler).post(submit_task_handler))
        .route("/tasks/{id}", get(get_task_handler))
        .layer(build_http_layers(config))
        .with_state(state)
}
