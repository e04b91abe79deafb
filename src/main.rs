use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;

use trainer_auth::auth::{CredentialHasher, KeyRing, TokenCodec, TokenService};
use trainer_auth::configuration::get_configuration;
use trainer_auth::startup::{run, AppState};
use trainer_auth::store::{PgAccountStore, PgRefreshTokenStore};
use trainer_auth::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    // Secrets are validated here; a weak or shared secret stops startup
    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    tracing::info!("Attempting to connect to database");
    let pool = PgPoolOptions::new()
        .max_connections(configuration.database.max_connections)
        .connect(configuration.database.connection_string().expose_secret())
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "Database connection error",
            )
        })?;
    tracing::info!("Database connection pool created successfully");

    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        tracing::error!("Failed to run database migrations: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, "Migration error")
    })?;

    let hasher = CredentialHasher::new(&configuration.password).map_err(|e| {
        tracing::error!("Invalid password hashing parameters: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;

    let tokens = TokenService::new(
        Arc::new(PgRefreshTokenStore::new(pool.clone())),
        TokenCodec::new(configuration.jwt.issuer.clone()),
        KeyRing::from_settings(&configuration.jwt),
    );
    let state = AppState::new(tokens, Arc::new(PgAccountStore::new(pool)), hasher);

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    run(listener, state)?.await
}
