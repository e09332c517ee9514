use std::sync::Arc;

use adaptive_math_backend::config::Config;
use adaptive_math_backend::create_app_with;
use adaptive_math_backend::logging::init_tracing;
use adaptive_math_backend::services::llm_provider::GenerativeBackend;
use adaptive_math_backend::state::AppState;
use adaptive_math_backend::workers::WorkerManager;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    let _log_guard = init_tracing(&config.log_level);

    let backend = Arc::new(GenerativeBackend::from_config(&config));
    tokio::spawn({
        let backend = Arc::clone(&backend);
        async move { backend.initialize().await }
    });

    let addr = config.bind_addr();
    let sweep_schedule = config.session_sweep_schedule.clone();
    let session_ttl = config.session_ttl;
    let (use_llm, queue_target) = (config.use_llm, config.queue_target);

    let state = AppState::new(config, backend);

    let worker_manager = match WorkerManager::new(Arc::clone(state.practice())).await {
        Ok(manager) => {
            if let Err(e) = manager.start(&sweep_schedule, session_ttl).await {
                tracing::error!(error = %e, "failed to start workers");
            }
            Some(manager)
        }
        Err(e) => {
            tracing::warn!(error = %e, "worker manager not initialized");
            None
        }
    };

    let app = create_app_with(state);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "failed to bind listener");
            return;
        }
    };
    tracing::info!(%addr, use_llm, queue_target, "adaptive-math-backend listening");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    if let Err(e) = server.await {
        tracing::error!(error = %e, "server error");
    }

    tracing::info!("HTTP server stopped, initiating graceful shutdown sequence");

    if let Some(ref manager) = worker_manager {
        manager.stop().await;
    }

    tracing::info!("Graceful shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
