//! services/api/src/bin/api.rs

use axum::{
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        Method,
    },
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ully_api::{
    adapters::{
        AnthropicChatAdapter, ChatProxyAdapter, FfmpegCameraAdapter, FfmpegThumbnailAdapter,
        FileKeyValueStore, FixedLocationAdapter, LocalFileReader, PgKeyValueStore,
        TracingAlertSink, WttrWeatherAdapter,
    },
    config::{ChatBackend, Config},
    error::ApiError,
    web::{self, rest::ApiDoc, state::AppState},
};
use ully_core::{
    ports::{ChatService, KeyValueStore},
    CaptureController, ChatSession, HistoryStore, SystemClock, WeatherLocationProvider,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Pick the Key-Value Store ---
    let storage: Arc<dyn KeyValueStore> = match &config.database_url {
        Some(database_url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;
            let store = PgKeyValueStore::new(db_pool);
            info!("Running database migrations...");
            store.run_migrations().await?;
            info!("Database migrations complete.");
            Arc::new(store)
        }
        None => {
            info!("No DATABASE_URL set; storing chats under {}", config.data_dir.display());
            Arc::new(FileKeyValueStore::new(config.data_dir.clone()))
        }
    };

    // --- 3. Initialize Service Adapters ---
    let http = reqwest::Client::builder().build()?;

    let chat: Arc<dyn ChatService> = match &config.chat_backend {
        ChatBackend::Proxy { url, token } => {
            info!("Chat requests go through the proxy at {}", url);
            Arc::new(ChatProxyAdapter::new(http.clone(), url.clone(), token.clone()))
        }
        ChatBackend::Anthropic {
            api_key,
            model,
            timeout,
        } => {
            info!("Chat requests go directly to the provider with model {}", model);
            Arc::new(AnthropicChatAdapter::new(
                http.clone(),
                api_key.clone(),
                model.clone(),
                *timeout,
            ))
        }
    };

    let location = Arc::new(FixedLocationAdapter::new(config.home_location));
    let weather = Arc::new(WttrWeatherAdapter::new(
        http.clone(),
        config.weather_base_url.clone(),
    ));
    let camera = Arc::new(FfmpegCameraAdapter::new(
        config.camera_device.clone(),
        config.camera_input_format.clone(),
        config.capture_dir.clone(),
    ));
    let thumbnailer = Arc::new(FfmpegThumbnailAdapter::new(config.capture_dir.join("frames")));
    let alerts = Arc::new(TracingAlertSink::new());

    // --- 4. Assemble the Chat Session & Capture Controller ---
    let clock = Arc::new(SystemClock);
    let history = Arc::new(HistoryStore::new(storage, clock.clone()));
    let weather_provider = Arc::new(WeatherLocationProvider::with_default_cache(
        location, weather, clock,
    ));
    let session = ChatSession::new(chat, history, weather_provider);
    session.mount().await;

    let capture = CaptureController::new(camera, alerts.clone());

    // --- 5. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        session,
        capture,
        alerts,
        thumbnailer,
        files: Arc::new(LocalFileReader),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // --- 6. Create the Web Router ---
    let api_router = web::router(app_state).layer(cors);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
