// src/main.rs

use project_board::config::Config;
use project_board::models::user::{NewUser, User};
use project_board::routes;
use project_board::state::AppState;
use project_board::utils::hash::hash_password;
use project_board::validation::{check_password_length, is_valid_phone};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from environment (and .env, if present)
    let config = Config::from_env()?;

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let connect_options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    // Initialize Database Pool with Retry
    let mut retry_count = 0;
    let pool = loop {
        match SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect_with(connect_options.clone())
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    tracing::error!("Failed to connect to database after 5 retries: {}", e);
                    return Err(e.into());
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };

    tracing::info!("Database connected...");

    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Migrations applied successfully.");

    if let Err(e) = seed_admin_user(&pool, &config).await {
        tracing::error!("Failed to seed admin user: {}", e);
    }

    let addr = config.bind_addr;
    let state = AppState {
        pool: pool.clone(),
        config,
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Creates the configured staff account unless its email is already registered.
async fn seed_admin_user(pool: &SqlitePool, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let Some(admin) = &config.admin else {
        return Ok(());
    };

    if !is_valid_phone(&admin.phone) {
        return Err(format!("ADMIN_PHONE {:?} is not a valid Egyptian mobile number", admin.phone).into());
    }

    if let Err(violation) = check_password_length(&admin.password) {
        return Err(format!("ADMIN_PASSWORD: {}", violation).into());
    }

    if User::email_taken(pool, &admin.email).await? {
        return Ok(());
    }

    tracing::info!("Seeding admin user: {}", admin.email);
    let hashed_password = hash_password(&admin.password)?;

    User::create(
        pool,
        NewUser {
            email: &admin.email,
            first_name: "Admin",
            last_name: "",
            phone: &admin.phone,
            password_hash: &hashed_password,
            is_staff: true,
        },
    )
    .await?;
    tracing::info!("Admin user created successfully.");

    Ok(())
}
