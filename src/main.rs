use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use marketplace_core as app;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = app::config::load_config()?;
    app::config::init_tracing(cfg.log_level());

    let db = app::db::establish_connection(&cfg.database_url).await?;
    if cfg.auto_migrate {
        app::db::run_migrations(&db).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    let db = Arc::new(db);

    let (event_sender, event_rx) = app::events::channel(1024);
    tokio::spawn(app::events::process_events(event_rx));

    // The catalog boundary is injected; deployments wire a real adapter,
    // local runs get the in-memory implementation.
    let catalog: Arc<dyn app::catalog::CatalogProvider> =
        Arc::new(app::catalog::StaticCatalog::new());

    let services = app::AppServices::build(db.clone(), event_sender.clone(), catalog, &cfg);

    let sweeps = app::scheduler::Scheduler::new(
        &cfg,
        services.reservations.clone(),
        services.settlement.clone(),
    )
    .spawn();

    let state = app::AppState {
        db,
        config: cfg.clone(),
        event_sender,
        services,
    };

    let router = app::operational_router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for handle in sweeps {
        handle.abort();
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
