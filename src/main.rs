use danci_study_engine::config::Config;
use danci_study_engine::db::Store;
use danci_study_engine::logging;
use danci_study_engine::services::plan_suggester::PlanSuggester;
use danci_study_engine::state::AppState;
use danci_study_engine::workers::WorkerManager;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    let _log_guard = logging::init_tracing(&config.log_level);

    let store = match Store::connect(&config.database_path).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(
                path = %config.database_path.display(),
                error = %e,
                "failed to open study database"
            );
            std::process::exit(1);
        }
    };

    let suggester = PlanSuggester::new(
        config.plan_suggester_url.clone(),
        config.plan_suggester_timeout,
    );
    if !suggester.is_available() {
        tracing::info!("PLAN_SUGGESTER_URL not set, plans are built deterministically");
    }

    let state = AppState::new(store, suggester, config.target_language.clone());

    let worker_manager = match WorkerManager::new(state.clone(), config.session_tick).await {
        Ok(manager) => {
            if let Err(e) = manager.start().await {
                tracing::error!(error = %e, "failed to start workers");
            }
            Some(manager)
        }
        Err(e) => {
            tracing::warn!(error = %e, "worker manager not initialized");
            None
        }
    };

    let app = danci_study_engine::build_router(state);

    let addr = config.bind_addr();
    tracing::info!(%addr, "study engine listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind listener failed");

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
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
