use axum::http::HeaderValue;
use axum::Router;
use coderoom::config::Config;
use coderoom::docs::ApiDoc;
use coderoom::routes::api::create_api_routes;
use coderoom::ws::registry::RoomRegistry;
use coderoom::{clients, db, services, ws};
use std::panic;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use utoipa::OpenApi;

#[tokio::main]
async fn main() {
    // Set panic hook for better error messages
    panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
    }));

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            // Default to info level, but allow debug for our app
            "coderoom=debug,tower_http=debug,axum::rejection=trace,info".into()
        }))
        .init();

    info!("Starting server...");

    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        warn!("Using default configuration");
        Config::default()
    });

    // Initialize database connection if URL is provided
    if let Some(db_url) = &config.db_url {
        match db::dbsessions::init_db(db_url).await {
            Ok(_) => info!("Database initialized successfully"),
            Err(e) => {
                error!("Failed to initialize database: {}", e);
                warn!("Session persistence will not be available");
            }
        }
    } else {
        warn!("No database URL configured - session persistence will not be available");
    }

    // Session gate cache for the realtime join path
    ws::handler::init_session_gate().await;

    // Upstream relays are optional; the endpoints answer 500 when unset
    if let Some(url) = config.exec_service_url.clone() {
        if clients::exec_client::init_exec_client(url).is_ok() {
            info!("Execution service client initialized");
        }
    } else {
        warn!("No execution service URL configured - /execute will be unavailable");
    }
    if let (Some(url), Some(secret)) = (
        config.identity_service_url.clone(),
        config.identity_jwt_secret.clone(),
    ) {
        if clients::identity_client::init_identity_client(
            url,
            secret,
            config.cloud_service_name.clone(),
        )
        .is_ok()
        {
            info!("Identity provider client initialized");
        }
    } else {
        warn!("No identity provider configured - /auth/token will be unavailable");
    }

    // Room registry lives for the whole process
    let registry = Arc::new(RoomRegistry::new());

    // Periodic reclamation of expired sessions
    tokio::spawn(services::lifecycle::expiry_sweep(config.sweep_interval_secs));

    // CORS: explicit origins when configured, permissive otherwise
    let cors = match &config.cors_origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::permissive(),
    };

    // Create API routes
    let api_routes = create_api_routes(registry.clone());

    // Combine all routes
    let app_routes = Router::new()
        // Mount API routes
        .nest("/api", api_routes)
        // Mount Swagger UI
        .merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger")
                .url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        // Add tracing layer
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start the HTTP server
    let listener = tokio::net::TcpListener::bind(config.server_address())
        .await
        .unwrap_or_else(|_| panic!("Failed to bind to {}", config.server_address()));

    info!("Server running on http://{}", config.server_address());
    info!(
        "Realtime channel available at ws://{}/api/v1/ws",
        config.server_address()
    );
    info!(
        "Swagger UI available at http://{}/swagger",
        config.server_address()
    );

    axum::serve(listener, app_routes)
        .await
        .expect("Server failed to start");
}
