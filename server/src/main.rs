use std::sync::Arc;

use minigolf_server::auth::TokenStore;
use minigolf_server::config::ServerConfig;
use minigolf_server::player::PlayerIds;
use minigolf_server::registry::GameRegistry;
use minigolf_server::state::Collaborators;
use minigolf_server::store::{FileMapStore, MapStore, MemoryMapStore};
use minigolf_server::ws::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ServerConfig::from_env();

    // Validate configuration before starting
    if let Err(e) = config.validate() {
        tracing::error!("Invalid server configuration: {}", e);
        std::process::exit(1);
    }

    let store: Arc<dyn MapStore> = match &config.map_dir {
        Some(dir) => match FileMapStore::open(dir) {
            Ok(store) => {
                tracing::info!("Storing maps in {}", dir);
                Arc::new(store)
            }
            Err(e) => {
                tracing::error!("Cannot open map directory {}: {}", dir, e);
                std::process::exit(1);
            }
        },
        None => Arc::new(MemoryMapStore::new()),
    };

    let collaborators = Collaborators {
        player_ids: PlayerIds::new(),
        store,
        credentials: Arc::new(TokenStore::new(config.rng_seed)),
    };

    let listen_addr = config.listen_addr.clone();
    let registry = GameRegistry::new(config, collaborators);
    tokio::spawn(registry.clone().run_idle_sweep());

    let app = minigolf_server::router(AppState::new(registry));

    tracing::info!("Starting minigolf server on {}", listen_addr);

    let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", listen_addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}
