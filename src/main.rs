use tracing::{error, info};

use social_media_api::{
    config::Config,
    db::Database,
    middleware::init_tracing,
    routes::create_router,
    server::serve,
    state::AppState,
};

#[tokio::main]
async fn main() {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize structured logging
    if let Err(e) = init_tracing(&config.environment) {
        eprintln!("Failed to initialize tracing: {}", e);
        std::process::exit(1);
    }
    info!("Configuration loaded successfully");

    // Initialize database connection pool
    let database = match Database::connect(&config.database).await {
        Ok(db) => {
            info!("Database connection pool established");
            db
        }
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    let server_config = config.server.clone();
    let state = AppState::new(config, database.clone());

    // Create the Axum router with all endpoints
    let app = create_router(state);

    info!("Starting the server on {}", server_config.addr);

    let result = serve(&server_config, app).await;
    database.close();

    if let Err(e) = result {
        error!("Server error: {:#}", e);
        std::process::exit(1);
    }
}
