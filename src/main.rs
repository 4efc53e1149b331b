mod availability;
mod billing;
mod db;
mod error;
mod models;
mod outbox;
mod query;
mod rates;
mod reservations;
mod validation;

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use availability::RedisAvailabilityGuard;
use error::ApiError;
use models::{Room, RoomStatus, RoomType};
use outbox::OutboxRelay;
use query::{build_room_query, RoomQueryParams, RoomQueryValidator};
use rates::PgRateResolver;
use reservations::{
    check_in_handler, check_out_handler, walk_in_handler, CommandConfig,
    ReservationCommandService,
};

/// OpenAPI documentation structure
///
/// Covers the read-side room inventory endpoints. The lifecycle command
/// endpoints are documented by the ingress contract they implement.
#[derive(OpenApi)]
#[openapi(
    paths(
        get_rooms,
        get_room_by_id,
    ),
    components(
        schemas(Room, RoomType, RoomStatus)
    ),
    tags(
        (name = "rooms", description = "Room inventory endpoints")
    ),
    info(
        title = "Stayflow API",
        version = "1.0.0",
        description = "Reservation lifecycle command processor for front-desk operations",
    )
)]
struct ApiDoc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub reservation_commands: ReservationCommandService,
    pub rooms_repo: reservations::RoomsRepository,
}

/// Handler for GET /api/rooms
/// Lists room inventory with filters, sorting and pagination
#[utoipa::path(
    get,
    path = "/api/rooms",
    responses(
        (status = 200, description = "Filtered room inventory", body = Vec<Room>),
        (status = 400, description = "Invalid query parameters"),
        (status = 500, description = "Internal server error")
    ),
    tag = "rooms"
)]
async fn get_rooms(
    State(state): State<AppState>,
    Query(params): Query<RoomQueryParams>,
) -> Result<Json<Vec<Room>>, ApiError> {
    let validated = RoomQueryValidator::validate(params).map_err(|e| {
        tracing::debug!("Room query validation failed: {}", e);
        ApiError::ValidationError(validator::ValidationErrors::new())
    })?;

    let (sql, params) = build_room_query(&validated);

    let mut query = sqlx::query_as::<_, Room>(&sql);
    for param in params {
        query = query.bind(param);
    }

    let rooms = query.fetch_all(&state.db).await?;
    Ok(Json(rooms))
}

/// Handler for GET /api/rooms/{id}
/// Retrieves a single room by ID
#[utoipa::path(
    get,
    path = "/api/rooms/{id}",
    params(
        ("id" = Uuid, Path, description = "Room id")
    ),
    responses(
        (status = 200, description = "Room found", body = Room),
        (status = 404, description = "Room not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "rooms"
)]
async fn get_room_by_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Room>, ApiError> {
    let room = state
        .rooms_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            resource: "Room".to_string(),
            id: id.to_string(),
        })?;

    Ok(Json(room))
}

/// Handler for GET /health
async fn health(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    db::ping(&state.db).await?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

/// Build the application router
pub fn create_router(state: AppState) -> Router {
    // Configure CORS to allow all origins, methods, and headers;
    // ingress authentication happens upstream of this service
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Room inventory (read side)
        .route("/api/rooms", get(get_rooms))
        .route("/api/rooms/:id", get(get_room_by_id))
        // Lifecycle commands
        .route("/api/reservations/:id/check-in", post(check_in_handler))
        .route("/api/reservations/:id/check-out", post(check_out_handler))
        .route("/api/walk-ins", post(walk_in_handler))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state)
}

/// Read an environment variable, falling back to a default
fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Command configuration from the environment
fn command_config_from_env() -> CommandConfig {
    let defaults = CommandConfig::default();

    CommandConfig {
        system_actor_id: std::env::var("SYSTEM_ACTOR_ID")
            .ok()
            .and_then(|v| Uuid::parse_str(&v).ok())
            .unwrap_or(defaults.system_actor_id),
        property_utc_offset_minutes: env_or("PROPERTY_UTC_OFFSET_MINUTES", "0")
            .parse()
            .unwrap_or(defaults.property_utc_offset_minutes),
        checkin_cutoff_hour: env_or("CHECKIN_CUTOFF_HOUR", "14")
            .parse()
            .unwrap_or(defaults.checkin_cutoff_hour),
        checkout_cutoff_hour: env_or("CHECKOUT_CUTOFF_HOUR", "12")
            .parse()
            .unwrap_or(defaults.checkout_cutoff_hour),
    }
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stayflow_api=debug,info".into()),
        )
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!("Stayflow API - Starting...");

    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set in environment");
    let redis_url = env_or("REDIS_URL", "redis://127.0.0.1:6379");
    let host = env_or("HOST", "0.0.0.0");
    let port = env_or("PORT", "8080");

    let hold_ttl = Duration::from_secs(env_or("HOLD_TTL_SECONDS", "900").parse().unwrap_or(900));
    let rpc_timeout =
        Duration::from_millis(env_or("RPC_TIMEOUT_MS", "2000").parse().unwrap_or(2000));
    let outbox_channel = env_or("OUTBOX_CHANNEL", "stayflow.reservation.events");

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = db::create_pool(&database_url)
        .await
        .expect("Failed to create database pool");

    // Run SQLx migrations on startup
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations completed successfully");

    // Connect to the availability guard / event channel backend
    tracing::info!("Connecting to Redis...");
    let redis_client = redis::Client::open(redis_url).expect("Invalid REDIS_URL");
    let redis_conn = ConnectionManager::new(redis_client)
        .await
        .expect("Failed to connect to Redis");

    let guard = Arc::new(RedisAvailabilityGuard::new(
        redis_conn.clone(),
        hold_ttl,
        rpc_timeout,
    ));
    let rates = Arc::new(PgRateResolver::new(db_pool.clone(), rpc_timeout));
    let config = command_config_from_env();

    let reservation_commands =
        ReservationCommandService::new(db_pool.clone(), guard, rates, config);

    // Outbox relay delivers committed events in the background
    let relay = OutboxRelay::new(db_pool.clone(), redis_conn, outbox_channel);
    tokio::spawn(relay.run());

    let state = AppState {
        rooms_repo: reservations::RoomsRepository::new(db_pool.clone()),
        reservation_commands,
        db: db_pool,
    };

    let app = create_router(state);

    // Start the Axum server
    let addr = format!("{}:{}", host, port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Stayflow API is running on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, app).await.expect("Server error");
}

#[cfg(test)]
mod tests;
