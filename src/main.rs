use std::process;

use log::{error, info};
use recipe_api::{config::Config, routes, AppState};
use tokio::signal;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e}");
            process::exit(1);
        }
    };
    let address = config.bind_address;

    let state = match AppState::connect(config).await {
        Ok(state) => state,
        Err(e) => {
            error!("Startup failed: {e}");
            process::exit(1);
        }
    };

    let server = warp::serve(routes(state)).try_bind_with_graceful_shutdown(address, shutdown_signal());
    let (address, server) = match server {
        Ok(bound) => bound,
        Err(e) => {
            error!("Could not bind {address}: {e}");
            process::exit(1);
        }
    };

    info!("Server running on {address}");
    server.await;
    info!("Server shut down");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install terminate handler: {e}");
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
