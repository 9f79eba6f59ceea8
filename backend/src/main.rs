use axum::{
    http::{header::{AUTHORIZATION, CONTENT_TYPE}, HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use diesel::prelude::*;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

mod account;
mod admin;
mod auth;
mod builder;
mod config;
mod db;
mod error;
mod favorite;
mod lead;
mod mailer;
mod models;
mod property;
mod registration;
mod schema;
mod state;
mod superadmin;

use state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::AppConfig::load()?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    let pool = db::init_pool(&config.database_url)?;
    {
        let mut conn = pool.get()?;
        let test_query: i32 = diesel::select(diesel::dsl::sql::<diesel::sql_types::Integer>("1"))
            .get_result(&mut conn)?;
        info!("Database test query result: {}", test_query);
    }

    let state = AppState {
        config: config.clone(),
        pool,
        mailer: Arc::new(mailer::LogMailer),
    };

    let cors = CorsLayer::new()
        .allow_origin(config.cors_origin.parse::<HeaderValue>()?)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true);

    let public_routes = Router::new()
        .route("/api/auth/register-step1", post(registration::register_step1))
        .route("/api/auth/verify-otp", post(registration::verify_otp))
        .route("/api/auth/resend-otp", post(registration::resend_otp))
        .route("/api/auth/forgot-password", post(registration::forgot_password))
        .route("/api/auth/reset-password", post(registration::reset_password))
        .route("/api/auth/login", post(account::login))
        .route("/api/auth/logout", post(account::logout))
        .route("/api/properties", get(property::list_properties))
        .route("/api/properties/:id", get(property::get_property))
        .route("/api/properties/:id/inquiry", post(property::create_inquiry));

    let protected_routes = Router::new()
        .route(
            "/api/profile",
            get(account::get_profile).put(account::update_profile),
        )
        .route("/api/profile/change-password", post(account::change_password))
        .route("/api/favorites", get(favorite::list_favorites))
        .route(
            "/api/favorites/:property_id",
            post(favorite::add_favorite).delete(favorite::remove_favorite),
        )
        .route(
            "/api/builder/properties",
            post(builder::create_property).get(builder::list_own_properties),
        )
        .route(
            "/api/builder/properties/:id",
            get(builder::get_own_property)
                .put(builder::update_property)
                .delete(builder::delete_property),
        )
        .route("/api/builder/leads", get(builder::list_property_leads))
        .route("/api/admin/properties", get(admin::list_submissions))
        .route("/api/admin/properties/:id/approve", put(admin::approve_property))
        .route("/api/admin/properties/:id/reject", put(admin::reject_property))
        .route("/api/admin/leads", get(admin::list_leads))
        .route("/api/admin/leads/:id/assign", put(admin::assign_lead))
        .route("/api/admin/users", get(admin::list_users))
        .route("/api/leads", get(lead::list_assigned))
        .route("/api/leads/:id/status", put(lead::update_status))
        .route("/api/superadmin/staff", post(superadmin::create_staff))
        .route("/api/superadmin/users/:id/status", put(superadmin::set_user_status))
        .route(
            "/api/superadmin/transactions",
            get(superadmin::list_transactions).post(superadmin::create_transaction),
        )
        .route(
            "/api/superadmin/transactions/export",
            get(superadmin::export_transactions),
        )
        .route("/api/superadmin/stats", get(superadmin::stats))
        .layer(middleware::from_fn_with_state(state.clone(), auth::authenticate));

    let app = Router::new()
        .route("/", get(|| async { "Estate Marketplace API" }))
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(state);

    info!("Starting server on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
