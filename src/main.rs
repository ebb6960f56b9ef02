use log::*;
use service::{config::Config, logging::Logger, AppState};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::new();

    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to start logger: {e}");
        return ExitCode::FAILURE;
    }

    info!(
        "Starting live_visitors v{} in {} mode",
        env!("CARGO_PKG_VERSION"),
        config.runtime_env()
    );
    debug!("Allowed origins: {:?}", config.allowed_origins);

    let app_state = AppState::new(config);

    // Open streams are not drained on exit; the registry lives in memory only.
    match web::init_server(app_state).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Server stopped with an error: {e}");
            ExitCode::FAILURE
        }
    }
}
