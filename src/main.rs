use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quiz_srs::config::Config;
use quiz_srs::srs::Scheduler;
use quiz_srs::state::AppState;
use quiz_srs::{handlers, store};

#[tokio::main]
async fn main() {
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "quiz_srs=debug,tower_http=debug".into()),
    )
    .with(tracing_subscriber::fmt::layer())
    .init();

  let config = Config::load();
  tracing::info!(
    "Using {} storage at {}",
    config.backend.as_str(),
    config.storage_path.display()
  );

  let state_store = store::open_store(&config).expect("Failed to open review state store");
  let scheduler = Arc::new(Scheduler::new(state_store).with_timeout(config.store_timeout));
  let state = AppState::new(scheduler);

  let app = handlers::router(state).layer(TraceLayer::new_for_http());

  let bind_addr = config.bind_addr();
  let listener = tokio::net::TcpListener::bind(&bind_addr)
    .await
    .unwrap_or_else(|_| panic!("Failed to bind to {}", bind_addr));

  tracing::info!("Server running on http://localhost:{}", config.server_port);

  axum::serve(listener, app)
    .await
    .expect("Server failed to start");
}
