use anyhow::Result;
use ragserve::bootstrap::RagRuntime;
use ragserve::server::{self, AppState, RagState};
use ragserve::{bootstrap, Config};
use std::sync::Arc;
use tokio::sync::Mutex;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load()?;
    let state = AppState::new();
    let runtime_slot: Arc<Mutex<Option<RagRuntime>>> = Arc::new(Mutex::new(None));

    // Index in the background so the listener comes up immediately; /query
    // answers 503 until this finishes.
    let init_state = state.clone();
    let init_config = config.clone();
    let init_slot = Arc::clone(&runtime_slot);
    tokio::spawn(async move {
        init_state.set(RagState::Loading).await;
        match bootstrap::initialize(&init_config).await {
            Ok(runtime) => {
                log::info!("Initialization complete; queries are live");
                init_state.set(RagState::Loaded(runtime.engine.clone())).await;
                *init_slot.lock().await = Some(runtime);
            }
            Err(e) => {
                log::error!("Initialization failed: {}", e);
                init_state.set(RagState::Failed(e.to_string())).await;
            }
        }
    });

    tokio::select! {
        result = server::run(config.server.port, state) => result?,
        _ = tokio::signal::ctrl_c() => {
            log::info!("Shutdown signal received");
            // Stop watching and let any in-flight scan finish before exiting.
            if let Some(runtime) = runtime_slot.lock().await.take() {
                runtime.shutdown().await;
            }
        }
    }

    Ok(())
}
