mod api_docs;
mod config;
mod controllers;
mod db_config;
mod init;
mod models;
mod routes;

use api_docs::ApiDoc;
use config::AppState;
use routes::api_routes::get_routes;

use axum::{http::StatusCode, response::IntoResponse, response::Response, Router};
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;
use utoipa_redoc::{Redoc, Servable};
use utoipa_swagger_ui::SwaggerUi;

async fn handler_404() -> Response {
    (StatusCode::NOT_FOUND, "404 Not Found").into_response()
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Setup formatting and environment for trace
    let fmt_layer = fmt::layer().with_file(true).with_line_number(true).pretty();
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    let trace_layer = trace::TraceLayer::new_for_http()
        .make_span_with(trace::DefaultMakeSpan::new())
        .on_response(trace::DefaultOnResponse::new());

    // Connect to database
    let app_state = match AppState::new().await {
        Ok(state) => Arc::new(RwLock::new(state)),
        Err(e) => {
            tracing::error!("failed to initialize application state: {e}");
            std::process::exit(1);
        }
    };

    {
        let state = app_state.read().await;
        let db_pool = &state.timetable_data.read().await.timetable_db;
        if let Err(e) = init::initialize_defaults(db_pool).await {
            tracing::error!("startup checks failed: {e}");
        }
    }

    let swagger_ui = SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi());
    let redoc_ui = Redoc::with_url("/redoc", ApiDoc::openapi());
    let rapidoc_ui = RapiDoc::new("/api-docs/openapi.json").path("/rapidoc");

    let app = Router::new()
        .nest("/api/v1", get_routes())
        .merge(swagger_ui)
        .merge(redoc_ui)
        .merge(rapidoc_ui)
        .with_state(app_state)
        .fallback(handler_404)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
        .layer(ServiceBuilder::new().layer(trace_layer));

    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let ip: SocketAddr = match bind_addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!("invalid BIND_ADDR {bind_addr:?}: {e}");
            std::process::exit(1);
        }
    };
    let listener = match tokio::net::TcpListener::bind(ip).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("failed to bind {ip}: {e}");
            std::process::exit(1);
        }
    };
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("serving {}", addr);
    }
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server exited with error: {e}");
    }
}
