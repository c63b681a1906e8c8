use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use sqlx::{postgres::PgPoolOptions, PgPool};

use fieldscan_auth::handlers;
use fieldscan_auth::services::{GoogleVerifier, SecurityService};
use fieldscan_config::AppConfig;
use fieldscan_middleware::auth::AuthMiddlewareFactory;

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config = AppConfig::from_env();

    tracing::info!("[Auth Service] Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;
    tracing::info!("[Auth Service] Database connection established");

    sqlx::migrate!().run(&pool).await?;

    let security = web::Data::new(SecurityService::new(&config.jwt_secret, config.token_ttl_hours));
    let verifier = web::Data::new(GoogleVerifier::new(
        config.google_client_id.clone(),
        config.google_tokeninfo_url.clone(),
    ));
    let auth_middleware = AuthMiddlewareFactory::new(&config.jwt_secret);

    let port = config.port;
    let cors_origins = config.cors_allowed_origins.clone();

    tracing::info!("[Auth Service] Starting on port {}", port);

    HttpServer::new(move || {
        let mut cors = Cors::default()
            .allow_any_method()
            .allow_any_header()
            .supports_credentials()
            .max_age(86400);
        for origin in &cors_origins {
            cors = cors.allowed_origin(origin);
        }

        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(security.clone())
            .app_data(verifier.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .route("/health", web::get().to(health_check))
            .configure(|cfg| configure_routes(cfg, auth_middleware.clone()))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await?;

    Ok(())
}

fn configure_routes(cfg: &mut web::ServiceConfig, auth_middleware: AuthMiddlewareFactory) {
    cfg.route("/login/", web::post().to(handlers::auth::login))
        .route("/signup/", web::post().to(handlers::auth::signup))
        .route("/logout/", web::post().to(handlers::auth::logout))
        .route("/google/signup/", web::post().to(handlers::google::google_auth))
        .route("/google/login/", web::post().to(handlers::google::google_auth))
        .route("/getUser/{id}/", web::get().to(handlers::auth::get_user))
        .service(
            web::scope("")
                .wrap(auth_middleware)
                .route("/get_user_info/", web::get().to(handlers::auth::get_user_info))
                .route("/change_password/", web::post().to(handlers::auth::change_password)),
        );
}

async fn health_check(pool: web::Data<PgPool>) -> actix_web::Result<web::Json<serde_json::Value>> {
    let db_status = match sqlx::query("SELECT 1 as test").fetch_one(pool.get_ref()).await {
        Ok(_) => "connected",
        Err(e) => {
            tracing::error!("[Auth Service] Database health check failed: {}", e);
            "disconnected"
        }
    };

    Ok(web::Json(serde_json::json!({
        "status": "healthy",
        "service": "auth-service",
        "database": db_status,
        "timestamp": chrono::Utc::now()
    })))
}
