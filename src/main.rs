mod api;
mod config;
mod database;
mod jobs;
mod middleware;
mod models;
mod services;
mod utils;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use services::{
    arxiv_service::ArxivClient,
    digest_service::{DigestDispatcher, UserStore},
    mail_service::GmailMailer,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = config::AppConfig::from_env()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    log::info!("🚀 Starting Scholar Weekly...");
    log::info!("📊 Database: {}", config.database_url);

    // Initialize MongoDB connection
    let db = database::MongoDB::new(&config.database_url)
        .await
        .map_err(|e| std::io::Error::other(format!("Failed to connect to MongoDB: {}", e)))?;

    log::info!("✅ MongoDB connected successfully");

    let store: Arc<dyn UserStore> = Arc::new(db.clone());
    let dispatcher = Arc::new(DigestDispatcher::new(
        store,
        Arc::new(ArxivClient::new(&config.digest)),
        Arc::new(GmailMailer::new(config.mail.clone())),
        config.digest.keywords_per_query,
    ));

    // 📅 Weekly digest
    if config.mail.is_configured() {
        log::info!("📅 Starting background jobs...");
        jobs::digest_scheduler::start_weekly_digest_scheduler(dispatcher.clone(), &config.digest).await;
    } else {
        log::warn!("⚠️  Mail credentials missing, weekly digest scheduler not started");
    }

    let host = config.host.clone();
    let port = config.port.clone();

    log::info!("🌐 Server starting on {}:{}", host, port);
    log::info!("📚 Swagger UI available at: http://{}:{}/swagger-ui/", host, port);
    log::info!("📄 OpenAPI spec at: http://{}:{}/api-docs/openapi.json", host, port);

    let db_data = web::Data::new(db);
    let config_data = web::Data::new(config);
    let dispatcher_data = web::Data::from(dispatcher);

    // Start HTTP server
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin("http://localhost:3000")
            .allowed_origin("http://127.0.0.1:3000")
            .allowed_methods(vec!["GET", "POST", "PATCH", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::CONTENT_TYPE,
                actix_web::http::header::ACCEPT,
            ])
            .expose_headers(vec![actix_web::http::header::CONTENT_TYPE])
            .supports_credentials()
            .max_age(3600);

        let openapi = api::swagger::ApiDoc::openapi();

        App::new()
            .app_data(db_data.clone())
            .app_data(config_data.clone())
            .app_data(dispatcher_data.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone())
            )
            // Health check
            .route("/health", web::get().to(api::health::health_check))
            .service(
                web::scope("/api/v1/user")
                    .route("/signup", web::post().to(api::users::signup))
                    .route("/login", web::post().to(api::users::login))
                    // Rotas protegidas: o token precisa ser do próprio usuário
                    .service(
                        web::resource("/{id}/subscribe")
                            .wrap(middleware::AuthMiddleware)
                            .route(web::patch().to(api::users::subscribe))
                    )
                    .service(
                        web::resource("/{id}/unsubscribe")
                            .wrap(middleware::AuthMiddleware)
                            .route(web::patch().to(api::users::unsubscribe))
                    )
                    .service(
                        web::resource("/{id}/digest")
                            .wrap(middleware::AuthMiddleware)
                            .route(web::post().to(api::users::send_digest_now))
                    )
                    .service(
                        web::resource("/{id}")
                            .wrap(middleware::AuthMiddleware)
                            .route(web::get().to(api::users::get_user))
                            .route(web::patch().to(api::users::update_user))
                            .route(web::delete().to(api::users::delete_user))
                    )
            )
    })
    .bind(format!("{}:{}", host, port))?
    .run()
    .await
}
