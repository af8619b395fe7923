use crate::{create_router, AppState};
use anyhow::{Context, Result};
use recipe_core::{wait_for_configured_store, Settings};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};

pub struct Server {
    state: AppState,
    addr: SocketAddr,
}

impl Server {
    /// Waits for the database (per `database.wait_*`) and prepares state.
    pub async fn new(settings: Settings) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
            .parse()
            .with_context(|| {
                format!(
                    "invalid listen address {}:{}",
                    settings.server.host, settings.server.port
                )
            })?;

        let db_config = settings.database.clone();
        let store = tokio::task::spawn_blocking(move || wait_for_configured_store(&db_config))
            .await
            .context("database wait task panicked")??;

        Ok(Self {
            state: AppState::new(store, settings),
            addr,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn run(self) -> Result<()> {
        let router = create_router(self.state);

        info!("Starting recipe API server on {}", self.addr);

        let listener = {
            let socket = if self.addr.is_ipv6() {
                tokio::net::TcpSocket::new_v6()
            } else {
                tokio::net::TcpSocket::new_v4()
            }?;

            let _ = socket.set_reuseaddr(true);
            let _ = socket.set_keepalive(true);

            socket
                .bind(self.addr)
                .with_context(|| format!("binding {}", self.addr))?;
            socket.listen(1024)?
        };

        info!("Server listening on http://{}", self.addr);
        info!("  POST /api/user/create - Register");
        info!("  POST /api/user/token - Obtain auth token");
        info!("  GET  /api/recipe/recipes - Recipes (Authorization: Token <key>)");
        info!("  GET  /api/schema - OpenAPI document");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("server error")?;

        info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }

    // Give in-flight requests a moment before the listener closes.
    tokio::time::sleep(Duration::from_millis(100)).await;
}
