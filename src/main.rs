use actix_web::{web, App, HttpServer, middleware::Logger};
use actix_cors::Cors;
use cookbook_auth::{AppState, Settings, AppError, configure_routes};
use cookbook_auth::config::CorsConfig;
use dotenv::dotenv;
use std::net::TcpListener;
use std::time::Duration;
use tracing::{info, debug};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn build_cors(config: &CorsConfig) -> Cors {
    if !config.enabled {
        // CORS disabled - use most restrictive settings
        return Cors::default();
    }

    let cors = if config.allow_any_origin {
        Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
    } else {
        config
            .allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec!["Authorization", "Content-Type"])
    };

    cors.max_age(config.max_age as usize)
}

#[actix_web::main]
async fn main() -> cookbook_auth::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();

    // Load configuration
    let config = Settings::new()?;
    info!("Configuration loaded successfully ({})", config.environment);

    // Initialize application state
    let state = AppState::new(config.clone()).await?;
    let state = web::Data::new(state);

    // Periodically drop admission records that no longer matter
    let cleanup_state = state.clone();
    let cleanup_every = Duration::from_secs(config.rate_limit.cleanup_interval_seconds.max(1));
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(cleanup_every).await;
            let removed = cleanup_state.auth_service.admission().cleanup().await;
            if removed > 0 {
                debug!("Dropped {} stale admission records", removed);
            }
        }
    });

    let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))?;
    info!("Starting server at {}:{}", config.server.host, config.server.port);

    let cors_config = config.cors.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(build_cors(&cors_config))
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(configure_routes)
    })
    .listen(listener)?
    .workers(config.server.workers as usize)
    .run()
    .await
    .map_err(|e| AppError::InternalError(e.to_string()))?;

    Ok(())
}
